// Game telemetry frames → game signals.

use serde_json::Value;
use tracing::{debug, trace, warn};

use glowcast_api::telemetry::TelemetryFrame;

use crate::model::{GameSignal, MatchPhase, ScoreState, Team};

/// Map a telemetry frame onto a [`GameSignal`]. Unrecognized events
/// yield `None`.
pub fn normalize(frame: &TelemetryFrame) -> Option<GameSignal> {
    let data = &frame.data;
    match frame.event.as_str() {
        "game:update_state" => score(data).map(GameSignal::Score),
        "game:goal_scored" => {
            let scorer = &data["scorer"];
            let Some(team) = scorer["teamnum"].as_u64().and_then(Team::from_number) else {
                warn!(scorer = %scorer, "goal without a valid team number");
                return None;
            };
            Some(GameSignal::Goal {
                scorer: team,
                player: name(&scorer["name"]),
            })
        }
        "game:match_created" => Some(GameSignal::Match(MatchPhase::Created)),
        "game:match_ended" => Some(GameSignal::Match(MatchPhase::Ended)),
        "game:match_destroyed" => Some(GameSignal::Match(MatchPhase::Destroyed)),
        "game:statfeed_event" => {
            if data["type"].as_str() == Some("Demolition") {
                Some(GameSignal::Demolition {
                    attacker: name(&data["main_target"]["name"]),
                    victim: name(&data["secondary_target"]["name"]),
                })
            } else {
                trace!(kind = %data["type"], "stat feed event ignored");
                None
            }
        }
        other => {
            trace!(event = other, "telemetry event ignored");
            None
        }
    }
}

fn score(data: &Value) -> Option<ScoreState> {
    let teams = data["game"]["teams"].as_array()?;
    let (Some(a), Some(b)) = (teams.first(), teams.get(1)) else {
        debug!(teams = teams.len(), "score update without two teams");
        return None;
    };
    Some(ScoreState {
        team_a_name: name(&a["name"]),
        team_a_score: points(&a["score"]),
        team_b_name: name(&b["name"]),
        team_b_score: points(&b["score"]),
    })
}

fn name(value: &Value) -> Option<String> {
    value.as_str().map(str::to_owned)
}

fn points(value: &Value) -> u32 {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or_default()
}
