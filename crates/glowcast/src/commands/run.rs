//! `glowcast run`: the long-running orchestrator.

use tokio::sync::watch;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use glowcast_core::{ConnectionState, DashboardEvent, Orchestrator};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::load(global)?;
    let orchestrator = Orchestrator::start(&cfg.orchestrator_config()?)?;

    for (feed, state) in orchestrator.feed_states() {
        tokio::spawn(log_feed_state(feed, state));
    }

    let mut events = std::pin::pin!(orchestrator.router().dashboard_stream());
    info!("running, press Ctrl-C to stop");
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "could not listen for Ctrl-C, stopping");
                }
                break;
            }
            Some(event) = events.next() => log_event(&event),
        }
    }

    info!("shutting down");
    orchestrator.shutdown().await;
    Ok(())
}

async fn log_feed_state(feed: &'static str, mut state: watch::Receiver<ConnectionState>) {
    loop {
        let current = *state.borrow_and_update();
        match current {
            ConnectionState::Connected => info!(feed, "feed connected"),
            ConnectionState::Errored => warn!(feed, "feed dropped, reconnecting"),
            other => debug!(feed, state = ?other, "feed state"),
        }
        if state.changed().await.is_err() {
            break;
        }
    }
}

fn log_event(event: &DashboardEvent) {
    match event {
        DashboardEvent::Score(score) => info!(
            blue = score.team_a_score,
            orange = score.team_b_score,
            "score"
        ),
        DashboardEvent::Ambient { device, state, .. } => {
            debug!(%device, ?state, "ambient changed");
        }
        DashboardEvent::Donation(update) => info!(
            from = %update.from,
            slot = %update.slot,
            amount = update.amount,
            "donation"
        ),
        DashboardEvent::PrizeAdjustment(update) => info!(
            slot = %update.slot,
            amount = update.amount,
            "prize adjusted"
        ),
    }
}
