// ── Internal command vocabulary ──
//
// Everything that wants to change a light becomes a `Command` before it
// reaches the router. Commands are immutable once built.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use tokio::time::Instant;

use super::scene::{AmbientState, PatternId, Rgba};
use crate::error::CoreError;

// ── Devices ──────────────────────────────────────────────────────────

/// One physical output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Strip,
    Panel,
}

/// Which outputs a command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum DeviceSelector {
    Strip,
    Panel,
    Both,
}

impl DeviceSelector {
    pub fn devices(self) -> &'static [Device] {
        match self {
            Self::Strip => &[Device::Strip],
            Self::Panel => &[Device::Panel],
            Self::Both => &[Device::Strip, Device::Panel],
        }
    }
}

/// Who issued a command. Breaks ties between ambient commands issued at
/// the same instant; later variants win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SourcePriority {
    Request,
    Redemption,
    Alert,
    Game,
}

// ── Validated device values ──────────────────────────────────────────

/// Panel brightness in percent, 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Brightness(u8);

impl Brightness {
    pub const MAX: u8 = 100;

    pub fn new(value: i64) -> Result<Self, CoreError> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= Self::MAX)
            .map(Self)
            .ok_or(CoreError::OutOfRange {
                field: "brightness",
                value,
                min: 0,
                max: i64::from(Self::MAX),
            })
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// Panel color temperature in device units, 143 (warm) to 344 (cold).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Temperature(u16);

impl Temperature {
    pub const MIN: u16 = 143;
    pub const MAX: u16 = 344;

    pub fn new(value: i64) -> Result<Self, CoreError> {
        u16::try_from(value)
            .ok()
            .filter(|v| (Self::MIN..=Self::MAX).contains(v))
            .map(Self)
            .ok_or(CoreError::OutOfRange {
                field: "temperature",
                value,
                min: i64::from(Self::MIN),
                max: i64::from(Self::MAX),
            })
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

// ── Transient effects ────────────────────────────────────────────────

/// What a device shows while a transient effect runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Run a catalog pattern. On the strip this is power off, settle, pattern.
    Pattern(PatternId),
    /// Hold a single color.
    Solid(Rgba),
    /// Switch the light off.
    Blackout,
}

/// Where a device goes when its transient effect expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revert {
    /// The device's ambient at the moment the effect starts playing.
    CurrentAmbient,
    To(AmbientState),
}

/// A time-boxed effect that reverts on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct TransientEffect {
    pub effect: Effect,
    pub duration: Duration,
    pub revert: Revert,
    /// Re-dispatched through the router after the revert.
    pub chained: Option<Box<Command>>,
    /// Played instead when the device rejects `effect`.
    pub fallback: Option<Box<TransientEffect>>,
}

impl TransientEffect {
    pub fn new(effect: Effect, duration: Duration) -> Self {
        Self {
            effect,
            duration,
            revert: Revert::CurrentAmbient,
            chained: None,
            fallback: None,
        }
    }

    pub fn revert_to(mut self, target: AmbientState) -> Self {
        self.revert = Revert::To(target);
        self
    }

    pub fn then(mut self, command: Command) -> Self {
        self.chained = Some(Box::new(command));
        self
    }

    pub fn or_else(mut self, fallback: TransientEffect) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }
}

// ── Command ──────────────────────────────────────────────────────────

/// The payload of a [`Command`].
#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    AmbientColor(AmbientState),
    TransientEffect(TransientEffect),
    Power(bool),
    Brightness(Brightness),
    Temperature(Temperature),
}

/// A normalized instruction for the router.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub target: DeviceSelector,
    pub priority: SourcePriority,
    pub issued_at: Instant,
}

impl Command {
    /// Build a command stamped with the current instant.
    pub fn new(kind: CommandKind, target: DeviceSelector, priority: SourcePriority) -> Self {
        Self {
            kind,
            target,
            priority,
            issued_at: Instant::now(),
        }
    }

    pub fn ambient(state: AmbientState, target: DeviceSelector, priority: SourcePriority) -> Self {
        Self::new(CommandKind::AmbientColor(state), target, priority)
    }

    pub fn transient(
        effect: TransientEffect,
        target: DeviceSelector,
        priority: SourcePriority,
    ) -> Self {
        Self::new(CommandKind::TransientEffect(effect), target, priority)
    }
}
