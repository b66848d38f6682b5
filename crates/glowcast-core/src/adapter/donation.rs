// Donation feed events → prize pool updates.

use tracing::{debug, info, warn};

use glowcast_api::donation::DonationEvent;

use crate::model::{PrizeSlot, PrizeUpdate};

/// Turn a tip into a prize update. Tips whose message does not name a
/// slot are dropped.
pub fn normalize(event: &DonationEvent) -> Option<PrizeUpdate> {
    if event.name != "event" {
        debug!(event = %event.name, "donation feed event ignored");
        return None;
    }

    let payload = &event.payload;
    if payload["type"].as_str() != Some("tip") {
        debug!(kind = %payload["type"], "non-tip donation event ignored");
        return None;
    }

    let data = &payload["data"];
    let from = data["username"].as_str().unwrap_or("anonymous").to_owned();
    let message = data["message"].as_str().unwrap_or_default();
    let Some(slot) = PrizeSlot::from_message(message) else {
        info!(from = %from, message, "tip without a prize slot");
        return None;
    };
    let Some(amount) = amount(&data["amount"]) else {
        warn!(from = %from, amount = %data["amount"], "tip with unreadable amount");
        return None;
    };

    Some(PrizeUpdate { from, slot, amount })
}

/// Amounts arrive as numbers or numeric strings.
fn amount(value: &serde_json::Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .filter(|a| a.is_finite())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn tip(message: &str, amount: serde_json::Value) -> DonationEvent {
        DonationEvent {
            name: "event".into(),
            payload: json!({"type": "tip", "data": {
                "username": "ana",
                "amount": amount,
                "message": message
            }}),
        }
    }

    #[test]
    fn tips_bucket_by_message() {
        assert_eq!(
            normalize(&tip("2nd", json!(5.5))),
            Some(PrizeUpdate {
                from: "ana".into(),
                slot: PrizeSlot::Second,
                amount: 5.5,
            })
        );
        assert_eq!(
            normalize(&tip("first", json!("12"))).map(|u| (u.slot, u.amount)),
            Some((PrizeSlot::First, 12.0))
        );
    }

    #[test]
    fn tips_without_slot_are_dropped() {
        assert_eq!(normalize(&tip("great stream", json!(3))), None);
    }

    #[test]
    fn other_events_are_dropped() {
        let follow = DonationEvent {
            name: "event".into(),
            payload: json!({"type": "follow", "data": {}}),
        };
        let test = DonationEvent {
            name: "event:test".into(),
            payload: json!({}),
        };
        assert_eq!(normalize(&follow), None);
        assert_eq!(normalize(&test), None);
    }
}
