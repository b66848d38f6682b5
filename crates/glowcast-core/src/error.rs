// ── Core error types ──
//
// Errors surfaced by the orchestrator. Wire-level failures from
// `glowcast-api` are translated through `From<glowcast_api::Error>` so
// callers never match on HTTP or websocket details.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Validation errors ────────────────────────────────────────────
    #[error("Unknown scene or command: {name:?}")]
    UnknownRequest { name: String },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    // ── Device errors ────────────────────────────────────────────────
    #[error("{device} does not support {operation}")]
    Unsupported {
        device: &'static str,
        operation: &'static str,
    },

    #[error("Device unreachable: {reason}")]
    DeviceUnreachable { reason: String },

    #[error("Device call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Device rejected command: {message}")]
    DeviceRejected { message: String },

    // ── Orchestration errors ─────────────────────────────────────────
    #[error("Command router is not running")]
    RouterClosed,

    #[error("Prize ledger error: {message}")]
    Ledger { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<glowcast_api::Error> for CoreError {
    fn from(err: glowcast_api::Error) -> Self {
        use glowcast_api::Error as Api;

        match err {
            Api::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_ms: 0 }
                } else if e.is_connect() {
                    CoreError::DeviceUnreachable {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::DeviceRejected {
                        message: e.to_string(),
                    }
                }
            }
            Api::Io(e) => CoreError::DeviceUnreachable {
                reason: e.to_string(),
            },
            Api::Timeout { timeout_ms } => CoreError::Timeout { timeout_ms },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::WebSocketConnect(reason) => CoreError::DeviceUnreachable { reason },
            Api::WebSocketClosed { code, reason } => CoreError::DeviceUnreachable {
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            Api::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            Api::Decode(message) => CoreError::Internal(format!("Decode error: {message}")),
            Api::Unsupported(operation) => CoreError::Unsupported {
                device: "device",
                operation,
            },
            Api::Ledger { message } => CoreError::Ledger { message },
        }
    }
}
