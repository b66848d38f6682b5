//! Donation/alert feed over socket.io.
//!
//! Implements just enough of engine.io (v3 and v4) and socket.io framing
//! to authenticate with a JWT and receive named events:
//!
//! | Frame      | Meaning                              |
//! |------------|--------------------------------------|
//! | `0{...}`   | engine.io open, carries `pingInterval` |
//! | `2` / `3`  | engine.io ping / pong                |
//! | `40`       | socket.io namespace connected        |
//! | `42[...]`  | socket.io event `["name", payload]`  |
//! | `41`, `1`  | disconnect / close                   |

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::feed::{ConnectionState, FeedHandle, ReconnectConfig, SessionEnd, StateCell};

const FEED: &str = "donation";

// ── Configuration ────────────────────────────────────────────────────

/// Donation feed connection settings.
#[derive(Debug, Clone)]
pub struct DonationConfig {
    /// Full socket.io websocket URL, including `EIO` and `transport` query params.
    pub url: Url,
    pub jwt: SecretString,
    pub reconnect: ReconnectConfig,
}

/// A named socket.io event from the donation service.
#[derive(Debug, Clone, PartialEq)]
pub struct DonationEvent {
    /// Event name, e.g. `"event"`, `"event:test"`, `"event:update"`.
    pub name: String,
    pub payload: serde_json::Value,
}

// ── Packet codec ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenInfo {
    #[serde(default)]
    sid: String,
    #[serde(default = "default_ping_interval")]
    ping_interval: u64,
}

fn default_ping_interval() -> u64 {
    25_000
}

impl OpenInfo {
    /// Client ping period. A zero interval from the server falls back
    /// to the engine.io default.
    fn ping_every(&self) -> Duration {
        let millis = if self.ping_interval == 0 {
            default_ping_interval()
        } else {
            self.ping_interval
        };
        Duration::from_millis(millis)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Packet {
    Open(OpenInfo),
    Close,
    Ping,
    Pong,
    Connected,
    Disconnected,
    Event(DonationEvent),
    ConnectError(String),
    Other,
}

fn parse_packet(text: &str) -> Packet {
    let mut chars = text.chars();
    match chars.next() {
        Some('0') => serde_json::from_str(chars.as_str()).map_or(Packet::Other, Packet::Open),
        Some('1') => Packet::Close,
        Some('2') => Packet::Ping,
        Some('3') => Packet::Pong,
        Some('4') => parse_socket_packet(chars.as_str()),
        _ => Packet::Other,
    }
}

fn parse_socket_packet(body: &str) -> Packet {
    let mut chars = body.chars();
    match chars.next() {
        Some('0') => Packet::Connected,
        Some('1') => Packet::Disconnected,
        Some('2') => parse_event(chars.as_str()).map_or(Packet::Other, Packet::Event),
        Some('4') => Packet::ConnectError(chars.as_str().to_owned()),
        _ => Packet::Other,
    }
}

/// Parse `[/namespace,][ackId]["name", payload]`.
fn parse_event(body: &str) -> Option<DonationEvent> {
    let start = body.find('[')?;
    let args: Vec<serde_json::Value> = serde_json::from_str(body.get(start..)?).ok()?;
    let mut args = args.into_iter();
    let name = args.next()?.as_str()?.to_owned();
    let payload = args.next().unwrap_or(serde_json::Value::Null);
    Some(DonationEvent { name, payload })
}

fn emit(name: &str, payload: &serde_json::Value) -> String {
    format!("42{}", serde_json::json!([name, payload]))
}

/// Engine.io v3 expects the client to ping; v4 has the server ping.
fn client_pings(url: &Url) -> bool {
    url.query_pairs().any(|(k, v)| k == "EIO" && v == "3")
}

// ── Feed ─────────────────────────────────────────────────────────────

pub struct DonationFeed;

impl DonationFeed {
    /// Start the donation feed on a background task.
    pub fn start(config: DonationConfig, cancel: CancellationToken) -> FeedHandle<DonationEvent> {
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
    config: &DonationConfig,
    event_tx: &broadcast::Sender<Arc<DonationEvent>>,
    cancel: &CancellationToken,
    state: &StateCell,
) -> Result<SessionEnd, Error> {
    tracing::info!(feed = FEED, "Connecting");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(config.url.as_str()).await?;
    state.set(ConnectionState::Connected);
    tracing::info!(feed = FEED, "Connected");

    let (mut write, mut read) = ws_stream.split();

    let v3 = client_pings(&config.url);
    let mut ping = tokio::time::interval(Duration::from_millis(default_ping_interval()));
    let mut pinging = false;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(Message::text("41")).await;
                let _ = write.send(Message::Close(None)).await;
                return Ok(SessionEnd::Cancelled);
            }
            _ = ping.tick(), if pinging => {
                write.send(Message::text("2")).await?;
            }
            frame = read.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Closed),
                    Some(Err(e)) => return Err(e.into()),
                    _ => continue,
                };
                tracing::trace!(feed = FEED, frame = text.as_str(), "Frame received");

                match parse_packet(text.as_str()) {
                    Packet::Open(info) => {
                        tracing::debug!(feed = FEED, sid = %info.sid, ping_interval = info.ping_interval, "Session opened");
                        if v3 {
                            let every = info.ping_every();
                            ping = tokio::time::interval_at(Instant::now() + every, every);
                            pinging = true;
                        } else {
                            write.send(Message::text("40")).await?;
                        }
                    }
                    Packet::Ping => write.send(Message::text("3")).await?,
                    Packet::Connected => {
                        let auth = serde_json::json!({
                            "method": "jwt",
                            "token": config.jwt.expose_secret(),
                        });
                        write.send(Message::text(emit("authenticate", &auth))).await?;
                        tracing::debug!(feed = FEED, "Sent authenticate");
                    }
                    Packet::Event(event) => match event.name.as_str() {
                        "authenticated" => {
                            let channel = event.payload["channelId"].as_str().unwrap_or("<unknown>");
                            tracing::info!(feed = FEED, channel, "Authenticated");
                        }
                        "unauthorized" => {
                            tracing::warn!(feed = FEED, payload = %event.payload, "Authentication rejected");
                        }
                        _ => {
                            let _ = event_tx.send(Arc::new(event));
                        }
                    },
                    Packet::ConnectError(reason) => {
                        return Err(Error::WebSocketConnect(format!("socket.io connect error: {reason}")));
                    }
                    Packet::Close | Packet::Disconnected => return Ok(SessionEnd::Closed),
                    Packet::Pong | Packet::Other => {}
                }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_open_packet() {
        let packet = parse_packet(r#"0{"sid":"abc","pingInterval":20000,"pingTimeout":5000}"#);
        assert_eq!(
            packet,
            Packet::Open(OpenInfo {
                sid: "abc".into(),
                ping_interval: 20_000
            })
        );
    }

    #[test]
    fn zero_ping_interval_uses_the_default() {
        let Packet::Open(info) = parse_packet(r#"0{"sid":"abc","pingInterval":0}"#) else {
            panic!("expected open packet");
        };
        assert_eq!(info.ping_every(), Duration::from_millis(25_000));

        let Packet::Open(info) = parse_packet(r#"0{"sid":"abc","pingInterval":1500}"#) else {
            panic!("expected open packet");
        };
        assert_eq!(info.ping_every(), Duration::from_millis(1500));
    }

    #[test]
    fn parses_control_packets() {
        assert_eq!(parse_packet("2"), Packet::Ping);
        assert_eq!(parse_packet("3"), Packet::Pong);
        assert_eq!(parse_packet("40"), Packet::Connected);
        assert_eq!(parse_packet("41"), Packet::Disconnected);
        assert_eq!(parse_packet("1"), Packet::Close);
        assert_eq!(parse_packet(""), Packet::Other);
    }

    #[test]
    fn parses_event_packet() {
        let packet = parse_packet(
            r#"42["event",{"type":"tip","data":{"username":"ana","amount":5,"message":"1st"}}]"#,
        );
        let Packet::Event(event) = packet else {
            panic!("expected event, got {packet:?}");
        };
        assert_eq!(event.name, "event");
        assert_eq!(event.payload["type"], "tip");
        assert_eq!(event.payload["data"]["amount"], 5);
    }

    #[test]
    fn parses_event_with_namespace_and_ack_id() {
        let Packet::Event(event) = parse_packet(r#"42/feed,17["authenticated",{"channelId":"c1"}]"#)
        else {
            panic!("expected event");
        };
        assert_eq!(event.name, "authenticated");
        assert_eq!(event.payload["channelId"], "c1");
    }

    #[test]
    fn event_without_payload_is_null() {
        let Packet::Event(event) = parse_packet(r#"42["event:reset"]"#) else {
            panic!("expected event");
        };
        assert!(event.payload.is_null());
    }

    #[test]
    fn emit_frames_authenticate() {
        let frame = emit("authenticate", &serde_json::json!({"method": "jwt", "token": "t"}));
        assert_eq!(frame, r#"42["authenticate",{"method":"jwt","token":"t"}]"#);
    }

    #[test]
    fn engine_io_version_detection() {
        let v3 = Url::parse("wss://realtime.example.com/socket.io/?EIO=3&transport=websocket").unwrap();
        let v4 = Url::parse("wss://realtime.example.com/socket.io/?EIO=4&transport=websocket").unwrap();
        assert!(client_pings(&v3));
        assert!(!client_pings(&v4));
    }
}
