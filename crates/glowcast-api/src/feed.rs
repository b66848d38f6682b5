//! Shared lifecycle for long-lived event feeds.
//!
//! Every feed (telemetry, pub/sub, donations) runs one background task
//! that connects, reads until the session ends, and reconnects after a
//! fixed delay for as long as the feed is wanted. Parsed events are
//! fanned out through a [`tokio::sync::broadcast`] channel and the
//! connection state is observable through a [`tokio::sync::watch`].
//!
//! ```text
//! Disconnected → Connecting → Connected → (Closing | Errored) → Disconnected
//!      ▲                                                            │
//!      └──────────────── reconnect timer (while wanted) ───────────┘
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::error::Error;

// ── Broadcast channel capacity ───────────────────────────────────────

pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 1024;

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state of a single feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// The session ended cleanly or on the server's request.
    Closing,
    /// The session ended on a transport or protocol error.
    Errored,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Fixed-interval reconnection policy.
///
/// Feeds retry forever while wanted; there is no attempt limit.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay between a disconnect and the next attempt. Default: 3s.
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(3),
        }
    }
}

// ── FeedHandle ───────────────────────────────────────────────────────

/// Handle to a running feed.
///
/// Dropping the handle does not stop the feed; call [`stop`](Self::stop).
pub struct FeedHandle<T> {
    name: &'static str,
    event_rx: broadcast::Receiver<Arc<T>>,
    state_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl<T: Send + Sync + 'static> FeedHandle<T> {
    /// Spawn the supervision loop for a feed and return its handle.
    ///
    /// `session` is invoked once per connection attempt and must run
    /// one full session: connect, mark [`ConnectionState::Connected`]
    /// via the provided [`StateCell`], read until the session ends.
    pub(crate) fn spawn<F, Fut>(
        name: &'static str,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
        session: F,
    ) -> Self
    where
        F: FnMut(StateCell, broadcast::Sender<Arc<T>>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<SessionEnd, Error>> + Send,
    {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let state = StateCell(Arc::new(state_tx));

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            supervise(name, reconnect, task_cancel, state, event_tx, session).await;
        });

        Self {
            name,
            event_rx,
            state_rx,
            cancel,
        }
    }

    /// Feed name used in logs (`"telemetry"`, `"pubsub"`, `"donation"`).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Get a new broadcast receiver for the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<T>> {
        self.event_rx.resubscribe()
    }

    /// Watch the connection state.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Tear down the connection and suppress any pending reconnect.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

// ── Session plumbing ─────────────────────────────────────────────────

/// How a single session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// Server closed the socket or the stream ended.
    Closed,
    /// Server sent an explicit reconnect directive.
    ReconnectRequested,
    /// The feed was stopped.
    Cancelled,
}

/// Shared writer for a feed's connection state.
#[derive(Clone)]
pub(crate) struct StateCell(Arc<watch::Sender<ConnectionState>>);

impl StateCell {
    pub(crate) fn set(&self, state: ConnectionState) {
        self.0.send_replace(state);
    }
}

/// Main loop: connect → read → on end, wait → reconnect.
async fn supervise<T, F, Fut>(
    name: &'static str,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
    state: StateCell,
    event_tx: broadcast::Sender<Arc<T>>,
    mut session: F,
) where
    F: FnMut(StateCell, broadcast::Sender<Arc<T>>) -> Fut,
    Fut: Future<Output = Result<SessionEnd, Error>>,
{
    loop {
        state.set(ConnectionState::Connecting);

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = session(state.clone(), event_tx.clone()) => result,
        };

        let immediate = match result {
            Ok(SessionEnd::Cancelled) => break,
            Ok(SessionEnd::ReconnectRequested) => {
                tracing::info!(feed = name, "Server requested reconnect");
                state.set(ConnectionState::Closing);
                true
            }
            Ok(SessionEnd::Closed) => {
                tracing::info!(feed = name, "Feed disconnected");
                state.set(ConnectionState::Closing);
                false
            }
            Err(e) => {
                tracing::warn!(feed = name, error = %e, "Feed error");
                state.set(ConnectionState::Errored);
                false
            }
        };

        state.set(ConnectionState::Disconnected);

        if !immediate {
            tracing::info!(
                feed = name,
                delay_ms = u64::try_from(reconnect.delay.as_millis()).unwrap_or(u64::MAX),
                "Waiting before reconnect"
            );
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(reconnect.delay) => {}
            }
        }
    }

    state.set(ConnectionState::Disconnected);
    tracing::debug!(feed = name, "Feed loop exiting");
}

// ── Tests ────────────────────────────────────────────────────────────
