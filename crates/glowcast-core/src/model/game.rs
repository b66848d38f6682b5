// ── Live game signals ──

use serde::{Deserialize, Serialize};
use strum::Display;

/// One side of a match. Telemetry numbers them 0 and 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Blue,
    Orange,
}

impl Team {
    pub fn from_number(n: u64) -> Option<Self> {
        match n {
            0 => Some(Self::Blue),
            1 => Some(Self::Orange),
            _ => None,
        }
    }
}

/// Tracked names and scores of both teams.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreState {
    pub team_a_name: Option<String>,
    pub team_a_score: u32,
    pub team_b_name: Option<String>,
    pub team_b_score: u32,
}

impl ScoreState {
    /// The leading team, or `None` when tied.
    pub fn leader(&self) -> Option<Team> {
        match self.team_a_score.cmp(&self.team_b_score) {
            std::cmp::Ordering::Greater => Some(Team::Blue),
            std::cmp::Ordering::Less => Some(Team::Orange),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Lifecycle events that reset the lights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum MatchPhase {
    Created,
    Ended,
    Destroyed,
}

/// A normalized telemetry event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameSignal {
    Score(ScoreState),
    Goal {
        scorer: Team,
        player: Option<String>,
    },
    Match(MatchPhase),
    Demolition {
        attacker: Option<String>,
        victim: Option<String>,
    },
}
