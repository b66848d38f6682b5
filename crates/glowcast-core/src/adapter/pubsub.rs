// Stream-platform pub/sub messages → commands.

use std::time::Duration;

use tracing::{debug, warn};

use glowcast_api::pubsub::PubSubMessage;

use crate::inbound;
use crate::model::Command;

/// The three topics followed for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub points: String,
    pub bits: String,
    pub subscriptions: String,
}

impl Topics {
    pub fn for_channel(channel_id: &str) -> Self {
        Self {
            points: format!("channel-points-channel-v1.{channel_id}"),
            bits: format!("channel-bits-events-v1.{channel_id}"),
            subscriptions: format!("channel-subscribe-events-v1.{channel_id}"),
        }
    }

    /// Topics in LISTEN order.
    pub fn all(&self) -> Vec<String> {
        vec![
            self.points.clone(),
            self.bits.clone(),
            self.subscriptions.clone(),
        ]
    }
}

/// Turn a topic message into a command.
///
/// Channel-point redemptions set the strip ambient from the viewer's
/// text, which must name a redeemable scene. Bits and subscriptions
/// play the alert strobe.
pub fn normalize(message: &PubSubMessage, topics: &Topics, strobe: Duration) -> Option<Command> {
    if message.topic == topics.points {
        let redemption = &message.payload["data"]["redemption"];
        let Some(input) = redemption["user_input"].as_str() else {
            debug!(reward = %redemption["reward"]["title"], "redemption without user input");
            return None;
        };
        let command = inbound::redemption(input);
        if command.is_none() {
            warn!(
                input,
                user = %redemption["user"]["display_name"],
                "redemption does not name a color, ignored"
            );
        }
        command
    } else if message.topic == topics.bits || message.topic == topics.subscriptions {
        Some(inbound::alert_strobe(strobe))
    } else {
        debug!(topic = %message.topic, "message on unfollowed topic dropped");
        None
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::{
        AmbientState, CommandKind, DeviceSelector, Effect, PatternId, Rgba, SourcePriority,
    };

    const STROBE: Duration = Duration::from_secs(3);

    fn message(topic: &str, payload: serde_json::Value) -> PubSubMessage {
        PubSubMessage {
            topic: topic.into(),
            payload,
        }
    }

    fn redemption(input: &str) -> serde_json::Value {
        json!({"type": "reward-redeemed", "data": {"redemption": {
            "user": {"display_name": "viewer"},
            "user_input": input
        }}})
    }

    #[test]
    fn topics_carry_the_channel_id() {
        assert_eq!(
            Topics::for_channel("42").all(),
            vec![
                "channel-points-channel-v1.42".to_owned(),
                "channel-bits-events-v1.42".to_owned(),
                "channel-subscribe-events-v1.42".to_owned(),
            ]
        );
    }

    #[test]
    fn redemption_sets_strip_ambient() {
        let topics = Topics::for_channel("42");
        let command = normalize(&message(&topics.points, redemption(" Cyan ")), &topics, STROBE)
            .expect("command");
        assert_eq!(
            command.kind,
            CommandKind::AmbientColor(AmbientState::solid(Rgba::CYAN))
        );
        assert_eq!(command.target, DeviceSelector::Strip);
        assert_eq!(command.priority, SourcePriority::Redemption);
    }

    #[test]
    fn invalid_redemption_input_is_dropped() {
        let topics = Topics::for_channel("42");
        for input in ["chartreuse", "sloworange", ""] {
            assert_eq!(
                normalize(&message(&topics.points, redemption(input)), &topics, STROBE),
                None,
                "{input}"
            );
        }
        assert_eq!(
            normalize(&message(&topics.points, json!({"data": {}})), &topics, STROBE),
            None
        );
    }

    #[test]
    fn bits_and_subscriptions_strobe_purple() {
        let topics = Topics::for_channel("42");
        for topic in [&topics.bits, &topics.subscriptions] {
            let command =
                normalize(&message(topic, json!({})), &topics, STROBE).expect("command");
            assert_eq!(command.target, DeviceSelector::Both);
            let CommandKind::TransientEffect(effect) = command.kind else {
                panic!("expected a transient");
            };
            assert_eq!(effect.effect, Effect::Pattern(PatternId::PurpleStrobe));
            assert_eq!(effect.duration, STROBE);
        }
    }

    #[test]
    fn unknown_topics_are_dropped() {
        let topics = Topics::for_channel("42");
        assert_eq!(
            normalize(&message("video-playback.42", json!({})), &topics, STROBE),
            None
        );
    }
}
