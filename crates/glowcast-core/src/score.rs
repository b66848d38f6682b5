// ── Score tracker ──
//
// Process-wide team names and scores. Written only by the router when a
// telemetry score update arrives; everyone else reads a watch snapshot.

use tokio::sync::watch;

use crate::model::ScoreState;

pub(crate) struct ScoreTracker {
    tx: watch::Sender<ScoreState>,
}

impl ScoreTracker {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(ScoreState::default());
        Self { tx }
    }

    /// Store `next`. Returns `true` if anything changed.
    pub(crate) fn update(&self, next: ScoreState) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        })
    }

    pub(crate) fn snapshot(&self) -> ScoreState {
        self.tx.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ScoreState> {
        self.tx.subscribe()
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_real_changes_notify() {
        let tracker = ScoreTracker::new();
        let rx = tracker.subscribe();

        let score = ScoreState {
            team_a_name: Some("Blue".into()),
            team_a_score: 1,
            ..ScoreState::default()
        };
        assert!(tracker.update(score.clone()));
        assert!(rx.has_changed().unwrap());
        assert!(!tracker.update(score.clone()));
        assert_eq!(tracker.snapshot(), score);
    }
}
