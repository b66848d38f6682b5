// ── Prize pool and dashboard events ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::command::Device;
use super::game::ScoreState;
use super::scene::AmbientState;

/// One of the three prize buckets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum PrizeSlot {
    First,
    Second,
    Third,
}

impl PrizeSlot {
    /// Bucket a donation by its free-text message.
    pub fn from_message(message: &str) -> Option<Self> {
        match message.trim().to_ascii_lowercase().as_str() {
            "1" | "1st" | "first" => Some(Self::First),
            "2" | "2nd" | "second" => Some(Self::Second),
            "3" | "3rd" | "third" => Some(Self::Third),
            _ => None,
        }
    }
}

/// Money moving into a prize slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizeUpdate {
    pub from: String,
    #[serde(rename = "place")]
    pub slot: PrizeSlot,
    pub amount: f64,
}

/// Pushed to dashboard observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DashboardEvent {
    Score(ScoreState),
    Ambient {
        device: Device,
        state: AmbientState,
        at: DateTime<Utc>,
    },
    Donation(PrizeUpdate),
    PrizeAdjustment(PrizeUpdate),
}
