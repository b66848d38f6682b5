use thiserror::Error;

/// Top-level error type for the `glowcast-api` crate.
///
/// Covers every failure mode of the wire layer: feed websockets, the
/// strip's TCP protocol, the panel and ledger HTTP APIs, and payload
/// decoding. `glowcast-core` maps these into orchestrator errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, non-2xx, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Raw socket I/O failure (strip controller).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation timed out.
    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed or broke mid-stream.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed with an error close code.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Frame was neither JSON nor valid base64-encoded JSON.
    #[error("Frame decode error: {0}")]
    Decode(String),

    // ── Devices ─────────────────────────────────────────────────────
    /// The device does not implement this capability.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The prize ledger answered with a payload we cannot use.
    #[error("Prize ledger error: {message}")]
    Ledger { message: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth reconnecting over.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Io(_) | Self::Timeout { .. } | Self::WebSocketConnect(_) => true,
            _ => false,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocketConnect(err.to_string())
    }
}
