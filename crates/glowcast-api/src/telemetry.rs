//! Live-game telemetry feed.
//!
//! The game plugin serves a websocket that emits one JSON envelope per
//! frame: `{"event": "game:goal_scored", "data": {...}}`. Depending on
//! plugin settings the frame is either plain JSON text or the same JSON
//! base64-encoded, so every frame is sniffed by its first character.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::feed::{ConnectionState, FeedHandle, ReconnectConfig, SessionEnd, StateCell};

const FEED: &str = "telemetry";

// ── TelemetryFrame ───────────────────────────────────────────────────

/// One decoded telemetry envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    /// Event discriminator, e.g. `"game:update_state"`.
    pub event: String,

    /// Event payload; shape depends on `event`.
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Telemetry connection settings.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub url: Url,
    pub reconnect: ReconnectConfig,
}

// ── Feed ─────────────────────────────────────────────────────────────

pub struct TelemetryFeed;

impl TelemetryFeed {
    /// Start the telemetry feed. Returns immediately; the first
    /// connection attempt happens on the background task.
    pub fn start(config: TelemetryConfig, cancel: CancellationToken) -> FeedHandle<TelemetryFrame> {
        let url = config.url;
        let session_cancel = cancel.clone();

        FeedHandle::spawn(FEED, config.reconnect, cancel, move |state, event_tx| {
            let url = url.clone();
            let cancel = session_cancel.clone();
            async move { connect_and_read(&url, &event_tx, &cancel, &state).await }
        })
    }
}

/// Establish a single connection and read frames until it drops.
async fn connect_and_read(
    url: &Url,
    event_tx: &broadcast::Sender<Arc<TelemetryFrame>>,
    cancel: &CancellationToken,
    state: &StateCell,
) -> Result<SessionEnd, Error> {
    tracing::info!(feed = FEED, url = %url, "Connecting");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
    state.set(ConnectionState::Connected);
    tracing::info!(feed = FEED, "Connected");

    let (_write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => decode_and_broadcast(text.as_str(), event_tx),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => decode_and_broadcast(text, event_tx),
                        Err(e) => tracing::debug!(feed = FEED, error = %e, "Dropping non-UTF-8 frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(cf) = frame {
                            tracing::info!(feed = FEED, code = %cf.code, reason = %cf.reason, "Close frame received");
                        }
                        return Ok(SessionEnd::Closed);
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(SessionEnd::Closed),
                    _ => {}
                }
            }
        }
    }
}

fn decode_and_broadcast(text: &str, event_tx: &broadcast::Sender<Arc<TelemetryFrame>>) {
    match decode_frame(text) {
        Ok(frame) => {
            tracing::trace!(feed = FEED, event = %frame.event, "Frame received");
            let _ = event_tx.send(Arc::new(frame));
        }
        Err(e) => tracing::debug!(feed = FEED, error = %e, "Dropping undecodable frame"),
    }
}

// ── Frame decoding ───────────────────────────────────────────────────

/// Decode a telemetry frame that is either JSON or base64-encoded JSON.
pub fn decode_frame(text: &str) -> Result<TelemetryFrame, Error> {
    let trimmed = text.trim();

    let json = if trimmed.starts_with('{') {
        trimmed.to_owned()
    } else {
        let bytes = STANDARD
            .decode(trimmed)
            .map_err(|e| Error::Decode(format!("invalid base64: {e}")))?;
        String::from_utf8(bytes).map_err(|e| Error::Decode(format!("invalid UTF-8: {e}")))?
    };

    serde_json::from_str(&json).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: json,
    })
}

// ── Tests ────────────────────────────────────────────────────────────

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const GOAL: &str = r#"{"event":"game:goal_scored","data":{"scorer":{"name":"Kaydop","teamnum":1}}}"#;

    #[test]
    fn decodes_plain_json() {
        let frame = decode_frame(GOAL).unwrap();
        assert_eq!(frame.event, "game:goal_scored");
        assert_eq!(frame.data["scorer"]["teamnum"], 1);
    }

    #[test]
    fn decodes_base64_json() {
        let encoded = STANDARD.encode(GOAL);
        let frame = decode_frame(&encoded).unwrap();
        assert_eq!(frame.event, "game:goal_scored");
        assert_eq!(frame.data["scorer"]["name"], "Kaydop");
    }

    #[test]
    fn missing_data_defaults_to_null() {
        let frame = decode_frame(r#"{"event":"game:match_created"}"#).unwrap();
        assert!(frame.data.is_null());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(decode_frame("%%% not base64"), Err(Error::Decode(_))));
    }

    #[test]
    fn rejects_base64_of_non_json() {
        let encoded = STANDARD.encode("hello");
        assert!(matches!(
            decode_frame(&encoded),
            Err(Error::Deserialization { .. })
        ));
    }

    #[test]
    fn broadcast_skips_malformed_frames() {
        let (tx, mut rx) = broadcast::channel(4);
        decode_and_broadcast("{not json", &tx);
        assert!(rx.try_recv().is_err());

        decode_and_broadcast(GOAL, &tx);
        assert_eq!(rx.try_recv().unwrap().event, "game:goal_scored");
    }
}
