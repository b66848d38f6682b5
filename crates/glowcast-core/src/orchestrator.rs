// ── Orchestrator ──
//
// Wires real device drivers, the optional prize ledger, the router and
// one source adapter per enabled feed. Owns the root cancellation token
// every adapter token is derived from.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use glowcast_api::{ConnectionState, LedgerClient, PanelClient, StripClient};

use crate::adapter::SourceAdapter;
use crate::config::{DeviceConfig, LedgerConfig, OrchestratorConfig};
use crate::device::{DeviceFacade, PanelLight, StripLight};
use crate::error::CoreError;
use crate::ledger::PrizeLedger;
use crate::router::Router;

/// The running system.
pub struct Orchestrator {
    router: Router,
    adapters: Vec<SourceAdapter>,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Connect the real devices and start every configured feed.
    pub fn start(config: &OrchestratorConfig) -> Result<Self, CoreError> {
        let facade = device_facade(&config.devices)?;
        let ledger = config.ledger.as_ref().map(prize_ledger).transpose()?;
        let router = Router::spawn(config.router.clone(), facade, ledger);
        Ok(Self::with_router(router, config))
    }

    /// Start the configured feeds against an already running router.
    pub fn with_router(router: Router, config: &OrchestratorConfig) -> Self {
        let cancel = CancellationToken::new();
        let adapters = start_adapters(&router, config, &cancel);
        info!(feeds = adapters.len(), "orchestrator started");
        Self {
            router,
            adapters,
            cancel,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn adapters(&self) -> &[SourceAdapter] {
        &self.adapters
    }

    /// Connection state of every running feed, by feed name.
    pub fn feed_states(&self) -> Vec<(&'static str, watch::Receiver<ConnectionState>)> {
        self.adapters.iter().map(|a| (a.name(), a.state())).collect()
    }

    /// Stop the feeds first so nothing new is queued, then the router.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for adapter in self.adapters {
            adapter.shutdown().await;
        }
        self.router.stop().await;
        info!("orchestrator stopped");
    }
}

fn start_adapters(
    router: &Router,
    config: &OrchestratorConfig,
    cancel: &CancellationToken,
) -> Vec<SourceAdapter> {
    let sources = &config.sources;
    let mut adapters = Vec::new();
    if let Some(url) = &sources.telemetry {
        adapters.push(SourceAdapter::start_telemetry(
            url.clone(),
            sources.reconnect.clone(),
            router.clone(),
            cancel,
        ));
    }
    if let Some(pubsub) = &sources.pubsub {
        adapters.push(SourceAdapter::start_pubsub(
            pubsub,
            sources.reconnect.clone(),
            config.router.timings.strobe,
            router.clone(),
            cancel,
        ));
    }
    if let Some(donation) = &sources.donation {
        adapters.push(SourceAdapter::start_donation(
            donation,
            sources.reconnect.clone(),
            router.clone(),
            cancel,
        ));
    }
    if adapters.is_empty() {
        warn!("no event feeds configured; only inbound requests will drive the lights");
    }
    adapters
}

/// Build the facade over the strip and panel drivers.
pub fn device_facade(devices: &DeviceConfig) -> Result<DeviceFacade, CoreError> {
    let strip = StripClient::new(devices.strip_addr.clone());
    let panel = PanelClient::new(&devices.panel_url, &devices.transport)?;
    Ok(DeviceFacade::new(
        Arc::new(StripLight::new(strip)),
        Arc::new(PanelLight::new(panel)),
    ))
}

fn prize_ledger(config: &LedgerConfig) -> Result<Arc<dyn PrizeLedger>, CoreError> {
    let client = LedgerClient::new(
        &config.url,
        config.auth.clone(),
        &glowcast_api::transport::TransportConfig::default(),
    )?;
    Ok(Arc::new(client))
}
