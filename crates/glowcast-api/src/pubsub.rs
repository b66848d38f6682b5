//! Stream-platform pub/sub feed.
//!
//! Speaks the PING / PONG / LISTEN / RESPONSE / MESSAGE / RECONNECT
//! frame protocol. On open the client pings immediately and then on a
//! fixed heartbeat interval. The topic subscription is sent after a
//! settle delay rather than on an acknowledgement, because the server
//! does not accept LISTEN frames immediately after the socket opens.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::feed::{ConnectionState, FeedHandle, ReconnectConfig, SessionEnd, StateCell};

const FEED: &str = "pubsub";
const NONCE_LEN: usize = 15;

// ── Configuration ────────────────────────────────────────────────────

/// Pub/sub connection settings.
#[derive(Debug, Clone)]
pub struct PubSubConfig {
    pub url: Url,
    /// Fully qualified topics, e.g. `channel-bits-events-v1.12345`.
    pub topics: Vec<String>,
    pub auth_token: SecretString,
    /// Interval between client PINGs. Default: 60s.
    pub heartbeat_interval: Duration,
    /// Wait between socket open and LISTEN. Default: 3s.
    pub settle_delay: Duration,
    pub reconnect: ReconnectConfig,
}

impl PubSubConfig {
    pub fn new(url: Url, topics: Vec<String>, auth_token: SecretString) -> Self {
        Self {
            url,
            topics,
            auth_token,
            heartbeat_interval: Duration::from_secs(60),
            settle_delay: Duration::from_secs(3),
            reconnect: ReconnectConfig::default(),
        }
    }
}

// ── Wire frames ──────────────────────────────────────────────────────

/// A MESSAGE frame delivered on a subscribed topic.
#[derive(Debug, Clone, PartialEq)]
pub struct PubSubMessage {
    pub topic: String,
    /// The topic payload, already parsed from its embedded JSON string.
    pub payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum Inbound {
    Pong,
    Reconnect,
    Response {
        #[serde(default)]
        nonce: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
    Message {
        data: MessageData,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct MessageData {
    topic: String,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum Outbound<'a> {
    Ping,
    Listen { nonce: String, data: ListenData<'a> },
}

#[derive(Debug, Serialize)]
struct ListenData<'a> {
    topics: &'a [String],
    auth_token: &'a str,
}

/// What the session loop should do after handling one inbound frame.
#[derive(Debug, PartialEq)]
enum Reaction {
    Continue,
    Deliver(PubSubMessage),
    Reconnect,
}

// ── Feed ─────────────────────────────────────────────────────────────

pub struct PubSubFeed;

impl PubSubFeed {
    /// Start the pub/sub feed on a background task.
    pub fn start(config: PubSubConfig, cancel: CancellationToken) -> FeedHandle<PubSubMessage> {
        let config = Arc::new(config);
        let session_cancel = cancel.clone();

        FeedHandle::spawn(FEED, config.reconnect.clone(), cancel, move |state, event_tx| {
            let config = Arc::clone(&config);
            let cancel = session_cancel.clone();
            async move { run_session(&config, &event_tx, &cancel, &state).await }
        })
    }
}

async fn run_session(
    config: &PubSubConfig,
    event_tx: &broadcast::Sender<Arc<PubSubMessage>>,
    cancel: &CancellationToken,
    state: &StateCell,
) -> Result<SessionEnd, Error> {
    tracing::info!(feed = FEED, url = %config.url, "Connecting");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(config.url.as_str()).await?;
    state.set(ConnectionState::Connected);
    tracing::info!(feed = FEED, "Connected");

    let (mut write, mut read) = ws_stream.split();

    write.send(Message::text(encode(&Outbound::Ping)?)).await?;
    tracing::debug!(feed = FEED, "Sent PING");

    let mut heartbeat = tokio::time::interval_at(
        Instant::now() + config.heartbeat_interval,
        config.heartbeat_interval,
    );
    let settle = tokio::time::sleep(config.settle_delay);
    tokio::pin!(settle);
    let mut listening = false;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(SessionEnd::Cancelled);
            }
            () = &mut settle, if !listening => {
                listening = true;
                let frame = listen_frame(&config.topics, config.auth_token.expose_secret())?;
                write.send(Message::text(frame)).await?;
                tracing::info!(feed = FEED, topics = ?config.topics, "Sent LISTEN");
            }
            _ = heartbeat.tick() => {
                write.send(Message::text(encode(&Outbound::Ping)?)).await?;
                tracing::debug!(feed = FEED, "Sent PING");
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => match handle_frame(text.as_str()) {
                        Reaction::Continue => {}
                        Reaction::Deliver(message) => {
                            let _ = event_tx.send(Arc::new(message));
                        }
                        Reaction::Reconnect => {
                            let _ = write.send(Message::Close(None)).await;
                            return Ok(SessionEnd::ReconnectRequested);
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Closed),
                    Some(Err(e)) => return Err(e.into()),
                    _ => {}
                }
            }
        }
    }
}

fn encode(frame: &Outbound<'_>) -> Result<String, Error> {
    serde_json::to_string(frame).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: String::new(),
    })
}

fn listen_frame(topics: &[String], auth_token: &str) -> Result<String, Error> {
    encode(&Outbound::Listen {
        nonce: nonce(),
        data: ListenData { topics, auth_token },
    })
}

const NONCE_ALPHABET: &[u8; 62] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Random alphanumeric nonce for LISTEN requests.
///
/// Drawn from v4 UUID bytes, skipping bytes 6 and 8 where the version
/// and variant bits live.
fn nonce() -> String {
    std::iter::repeat_with(uuid::Uuid::new_v4)
        .flat_map(|id| {
            id.into_bytes()
                .into_iter()
                .enumerate()
                .filter(|(i, _)| *i != 6 && *i != 8)
                .map(|(_, b)| b)
        })
        .take(NONCE_LEN)
        .map(|b| char::from(NONCE_ALPHABET[usize::from(b) % NONCE_ALPHABET.len()]))
        .collect()
}

fn handle_frame(text: &str) -> Reaction {
    tracing::trace!(feed = FEED, frame = text, "Frame received");

    let inbound: Inbound = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(feed = FEED, error = %e, "Dropping malformed frame");
            return Reaction::Continue;
        }
    };

    match inbound {
        Inbound::Pong => Reaction::Continue,
        Inbound::Reconnect => Reaction::Reconnect,
        Inbound::Response { nonce, error } => {
            match error.as_deref() {
                Some(err) if !err.is_empty() => {
                    tracing::warn!(feed = FEED, nonce = ?nonce, error = err, "LISTEN rejected");
                }
                _ => tracing::info!(feed = FEED, nonce = ?nonce, "LISTEN accepted"),
            }
            Reaction::Continue
        }
        Inbound::Message { data } => match serde_json::from_str(&data.message) {
            Ok(payload) => Reaction::Deliver(PubSubMessage {
                topic: data.topic,
                payload,
            }),
            Err(e) => {
                tracing::debug!(feed = FEED, topic = %data.topic, error = %e, "Dropping message with malformed payload");
                Reaction::Continue
            }
        },
        Inbound::Unknown => {
            tracing::debug!(feed = FEED, "Dropping frame of unknown type");
            Reaction::Continue
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_frame_shape() {
        assert_eq!(encode(&Outbound::Ping).unwrap(), r#"{"type":"PING"}"#);
    }

    #[test]
    fn listen_frame_carries_topics_token_and_nonce() {
        let topics = vec!["channel-bits-events-v1.42".to_owned()];
        let raw = listen_frame(&topics, "oauth-token").unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(value["type"], "LISTEN");
        assert_eq!(value["data"]["topics"][0], "channel-bits-events-v1.42");
        assert_eq!(value["data"]["auth_token"], "oauth-token");
        let nonce = value["nonce"].as_str().unwrap();
        assert_eq!(nonce.len(), NONCE_LEN);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn nonces_use_the_full_alphanumeric_alphabet() {
        let nonces: Vec<String> = (0..200).map(|_| nonce()).collect();
        for n in &nonces {
            assert_eq!(n.len(), NONCE_LEN);
            assert!(n.chars().all(|c| c.is_ascii_alphanumeric()));
        }
        let all: String = nonces.concat();
        assert!(all.chars().any(|c| c.is_ascii_uppercase()));
        assert!(all.chars().any(|c| ('g'..='z').contains(&c)));
        assert!(nonces.iter().any(|n| n.as_bytes()[12] != b'4'));
        assert_ne!(nonces[0], nonces[1]);
    }

    #[test]
    fn message_payload_is_unwrapped() {
        let raw = serde_json::json!({
            "type": "MESSAGE",
            "data": {
                "topic": "channel-points-channel-v1.42",
                "message": "{\"data\":{\"redemption\":{\"user_input\":\"Blue\"}}}"
            }
        });

        let Reaction::Deliver(message) = handle_frame(&raw.to_string()) else {
            panic!("expected a delivered message");
        };
        assert_eq!(message.topic, "channel-points-channel-v1.42");
        assert_eq!(message.payload["data"]["redemption"]["user_input"], "Blue");
    }

    #[test]
    fn reconnect_directive() {
        assert_eq!(handle_frame(r#"{"type":"RECONNECT"}"#), Reaction::Reconnect);
    }

    #[test]
    fn pong_response_and_unknown_are_ignored() {
        assert_eq!(handle_frame(r#"{"type":"PONG"}"#), Reaction::Continue);
        assert_eq!(
            handle_frame(r#"{"type":"RESPONSE","nonce":"abc","error":"ERR_BADAUTH"}"#),
            Reaction::Continue
        );
        assert_eq!(handle_frame(r#"{"type":"SOMETHING_NEW"}"#), Reaction::Continue);
        assert_eq!(handle_frame("garbage"), Reaction::Continue);
    }

    #[test]
    fn malformed_inner_payload_is_dropped() {
        let raw = serde_json::json!({
            "type": "MESSAGE",
            "data": { "topic": "t", "message": "{oops" }
        });
        assert_eq!(handle_frame(&raw.to_string()), Reaction::Continue);
    }
}
