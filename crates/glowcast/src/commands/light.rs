//! One-shot light requests.

use tracing::info;

use glowcast_core::orchestrator::device_facade;
use glowcast_core::{LightRequest, Normalized, Router};

use crate::cli::{GlobalOpts, LightArgs};
use crate::error::CliError;

pub async fn handle(args: &LightArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::load(global)?;
    let mut router_config = cfg.router_config()?;
    // Leave the lights as they are apart from this one request.
    router_config.initial_scene = None;

    // Reject bad input before any device is touched.
    let request: LightRequest = args.request.parse()?;
    let label = request.to_string();
    let normalized = request.normalize(&router_config.timings)?;

    let facade = device_facade(&cfg.device_config()?)?;
    let router = Router::spawn(router_config, facade, None);
    let result = match normalized {
        Normalized::Command(command) => router.route(command).await,
        Normalized::Prize(update) => router.adjust_prize(update).await,
    };
    if result.is_ok() {
        router.idle().await?;
        info!(request = %label, "request applied");
    }
    router.stop().await;
    result.map_err(CliError::from)
}
