//! LAN driver for the multi-zone color strip controller.
//!
//! The controller listens on TCP 5577 and accepts short binary frames,
//! each terminated by an 8-bit additive checksum. Every command opens
//! its own connection; only power transitions wait for an
//! acknowledgement, and a short or missing acknowledgement is tolerated
//! because the controller is known to truncate replies.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::Error;

pub const DEFAULT_PORT: u16 = 5577;

const MAX_PATTERN_COLORS: usize = 16;
const PATTERN_PADDING: [u8; 4] = [0x01, 0x02, 0x03, 0x00];

// ── Protocol ─────────────────────────────────────────────────────────

/// Transition used by a custom pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Fade,
    Jump,
    Strobe,
}

impl Transition {
    fn code(self) -> u8 {
        match self {
            Self::Fade => 0x3a,
            Self::Jump => 0x3b,
            Self::Strobe => 0x3c,
        }
    }
}

/// Append the additive checksum to a frame body.
pub fn with_checksum(mut body: Vec<u8>) -> Vec<u8> {
    let sum = body.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    body.push(sum);
    body
}

pub fn power_frame(on: bool) -> Vec<u8> {
    with_checksum(vec![0x71, if on { 0x23 } else { 0x24 }, 0x0f])
}

/// Color frame with RGB pre-scaled by `brightness` percent (clamped to 100).
pub fn color_frame(rgb: [u8; 3], brightness: u8) -> Vec<u8> {
    let pct = u16::from(brightness.min(100));
    let scale = |c: u8| u8::try_from(u16::from(c) * pct / 100).unwrap_or(u8::MAX);
    with_checksum(vec![
        0x31,
        scale(rgb[0]),
        scale(rgb[1]),
        scale(rgb[2]),
        0x00,
        0x00,
        0x0f,
    ])
}

/// Map a 0-100 speed onto the controller's 1-31 delay byte.
pub fn speed_to_delay(speed: u8) -> u8 {
    let speed = u16::from(speed.min(100));
    u8::try_from(1 + 30 * (100 - speed) / 100).unwrap_or(1)
}

/// Custom pattern frame: up to 16 colors, padded, plus speed and transition.
pub fn custom_pattern_frame(colors: &[[u8; 3]], transition: Transition, speed: u8) -> Vec<u8> {
    let mut body = Vec::with_capacity(1 + MAX_PATTERN_COLORS * 4 + 4);
    body.push(0x51);
    for slot in 0..MAX_PATTERN_COLORS {
        match colors.get(slot) {
            Some([r, g, b]) => body.extend_from_slice(&[*r, *g, *b, 0x00]),
            None => body.extend_from_slice(&PATTERN_PADDING),
        }
    }
    body.extend_from_slice(&[speed_to_delay(speed), transition.code(), 0xff, 0x0f]);
    with_checksum(body)
}

// ── Client ───────────────────────────────────────────────────────────

/// Strip controller client.
#[derive(Debug, Clone)]
pub struct StripClient {
    addr: String,
    connect_timeout: Duration,
    ack_timeout: Duration,
}

impl StripClient {
    /// `addr` is `host:port`; use [`DEFAULT_PORT`] when the port is not configured.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: Duration::from_secs(5),
            ack_timeout: Duration::from_millis(500),
        }
    }

    pub fn with_timeouts(mut self, connect: Duration, ack: Duration) -> Self {
        self.connect_timeout = connect;
        self.ack_timeout = ack;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn set_power(&self, on: bool) -> Result<(), Error> {
        self.send(&power_frame(on), true).await
    }

    pub async fn set_color(&self, rgb: [u8; 3], brightness: u8) -> Result<(), Error> {
        self.send(&color_frame(rgb, brightness), false).await
    }

    pub async fn set_custom_pattern(
        &self,
        colors: &[[u8; 3]],
        transition: Transition,
        speed: u8,
    ) -> Result<(), Error> {
        self.send(&custom_pattern_frame(colors, transition, speed), false)
            .await
    }

    async fn send(&self, frame: &[u8], expect_ack: bool) -> Result<(), Error> {
        let mut stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| Error::Timeout {
                timeout_ms: millis(self.connect_timeout),
            })??;

        stream.write_all(frame).await?;
        stream.flush().await?;
        tracing::trace!(addr = %self.addr, frame = ?frame, "Strip frame sent");

        if expect_ack {
            let mut buf = [0u8; 4];
            match tokio::time::timeout(self.ack_timeout, stream.read(&mut buf)).await {
                Ok(Ok(n)) if n == buf.len() => tracing::trace!(addr = %self.addr, "Strip ack received"),
                Ok(Ok(n)) => tracing::debug!(addr = %self.addr, bytes = n, "Short strip ack"),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => tracing::debug!(addr = %self.addr, "No strip ack before timeout"),
            }
        }

        Ok(())
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ── Tests ────────────────────────────────────────────────────────────
