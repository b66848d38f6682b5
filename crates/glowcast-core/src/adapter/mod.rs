// ── Source adapters ──
//
// One adapter per external feed. The feed transport in `glowcast-api`
// owns the connection and its reconnect loop; the adapter subscribes to
// the feed's decoded frames, normalizes them, and forwards the result
// into the router queue. Frames of one feed are forwarded in arrival
// order. Adapters never touch device state.

pub mod donation;
pub mod pubsub;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use glowcast_api::donation::{DonationConfig, DonationFeed};
use glowcast_api::pubsub::{PubSubConfig, PubSubFeed};
use glowcast_api::telemetry::{TelemetryConfig, TelemetryFeed};
use glowcast_api::{ConnectionState, FeedHandle, ReconnectConfig};

use crate::config::{DonationSource, PubSubSource};
use crate::model::{GameSignal, ScoreState};
use crate::router::{Dispatch, Router};

pub use pubsub::Topics;

/// A running feed plus the task pumping its frames into the router.
pub struct SourceAdapter {
    name: &'static str,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    pump: JoinHandle<()>,
}

impl SourceAdapter {
    /// Follow the game telemetry socket.
    ///
    /// The telemetry source repeats `update_state` many times a second;
    /// only score changes are forwarded.
    pub fn start_telemetry(
        url: Url,
        reconnect: ReconnectConfig,
        router: Router,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let feed = TelemetryFeed::start(TelemetryConfig { url, reconnect }, cancel.clone());

        let mut last_score: Option<ScoreState> = None;
        Self::spawn(feed, cancel, router, move |frame| {
            let signal = telemetry::normalize(frame)?;
            if let GameSignal::Score(score) = &signal {
                if last_score.as_ref() == Some(score) {
                    return None;
                }
                last_score = Some(score.clone());
            }
            Some(Dispatch::Game(signal))
        })
    }

    /// Follow the channel's points, bits and subscription topics.
    pub fn start_pubsub(
        source: &PubSubSource,
        reconnect: ReconnectConfig,
        strobe: Duration,
        router: Router,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let topics = Topics::for_channel(&source.channel_id);
        let mut config =
            PubSubConfig::new(source.url.clone(), topics.all(), source.auth_token.clone());
        config.heartbeat_interval = source.heartbeat_interval;
        config.settle_delay = source.settle_delay;
        config.reconnect = reconnect;
        let feed = PubSubFeed::start(config, cancel.clone());

        Self::spawn(feed, cancel, router, move |message| {
            pubsub::normalize(message, &topics, strobe).map(Dispatch::Command)
        })
    }

    /// Follow the donation feed; tips go to the prize pool.
    pub fn start_donation(
        source: &DonationSource,
        reconnect: ReconnectConfig,
        router: Router,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let config = DonationConfig {
            url: source.url.clone(),
            jwt: source.jwt.clone(),
            reconnect,
        };
        let feed = DonationFeed::start(config, cancel.clone());

        Self::spawn(feed, cancel, router, |event| {
            donation::normalize(event).map(Dispatch::Donation)
        })
    }

    fn spawn<T, F>(feed: FeedHandle<T>, cancel: CancellationToken, router: Router, forward: F) -> Self
    where
        T: std::fmt::Debug + Send + Sync + 'static,
        F: FnMut(&T) -> Option<Dispatch> + Send + 'static,
    {
        let name = feed.name();
        info!(feed = name, "source adapter starting");
        let pump = tokio::spawn(pump(name, feed.subscribe(), router, cancel.clone(), forward));
        Self {
            name,
            state: feed.state(),
            cancel,
            pump,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Watch the feed's connection state.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Close the feed and cancel any pending reconnect. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stop and wait for the pump task to finish.
    pub async fn shutdown(self) {
        self.stop();
        let _ = self.pump.await;
        debug!(feed = self.name, "source adapter stopped");
    }
}

async fn pump<T, F>(
    name: &'static str,
    mut frames: broadcast::Receiver<Arc<T>>,
    router: Router,
    cancel: CancellationToken,
    mut forward: F,
) where
    T: std::fmt::Debug,
    F: FnMut(&T) -> Option<Dispatch>,
{
    loop {
        let frame = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            frame = frames.recv() => frame,
        };

        match frame {
            Ok(frame) => {
                trace!(feed = name, ?frame, "frame received");
                let Some(dispatch) = forward(&frame) else {
                    continue;
                };
                debug!(feed = name, ?dispatch, "forwarding to router");
                if router.dispatch(dispatch).await.is_err() {
                    debug!(feed = name, "router closed, adapter pump exiting");
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(feed = name, skipped, "adapter fell behind its feed");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
