// ── Inbound request vocabulary ──
//
// Named strip and panel requests, as issued by an operator or a chat
// command, and their translation into router commands. Unknown names
// are rejected here, before anything reaches the router.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use crate::config::EffectTimings;
use crate::error::CoreError;
use crate::model::{
    Brightness, Command, CommandKind, DeviceSelector, Effect, PatternId, PrizeUpdate, Scene,
    SourcePriority, Temperature, TransientEffect,
};

/// A request addressed to the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelRequest {
    On,
    Off,
    Brightness(i64),
    Temperature(i64),
}

/// One inbound request, parsed but not yet validated against device
/// ranges.
#[derive(Debug, Clone, PartialEq)]
pub enum LightRequest {
    /// A strip scene, strobe or power keyword, e.g. `!blue`, `greenstrobe`.
    Strip(String),
    Panel(PanelRequest),
    NewFollower,
    Prize(PrizeUpdate),
}

/// What a request becomes once normalized.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Command(Command),
    Prize(PrizeUpdate),
}

impl FromStr for LightRequest {
    type Err = CoreError;

    /// Parse the textual form: `light_on`, `light_off`,
    /// `brightness=N`, `temperature=N`, `newfollow`, or a strip name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CoreError::InvalidRequest {
                message: "empty request".into(),
            });
        }
        let lower = s.to_ascii_lowercase();

        if let Some((key, value)) = lower.split_once('=') {
            let number = |field: &str| {
                value.trim().parse::<i64>().map_err(|_| CoreError::InvalidRequest {
                    message: format!("{field} expects a whole number, got {value:?}"),
                })
            };
            return match key.trim() {
                "brightness" => Ok(Self::Panel(PanelRequest::Brightness(number("brightness")?))),
                "temperature" => Ok(Self::Panel(PanelRequest::Temperature(number("temperature")?))),
                _ => Err(CoreError::UnknownRequest { name: s.to_owned() }),
            };
        }

        Ok(match lower.as_str() {
            "light_on" => Self::Panel(PanelRequest::On),
            "light_off" => Self::Panel(PanelRequest::Off),
            "newfollow" | "newfollower" => Self::NewFollower,
            _ => Self::Strip(lower),
        })
    }
}

impl fmt::Display for LightRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strip(name) => f.write_str(name),
            Self::Panel(PanelRequest::On) => f.write_str("light_on"),
            Self::Panel(PanelRequest::Off) => f.write_str("light_off"),
            Self::Panel(PanelRequest::Brightness(v)) => write!(f, "brightness={v}"),
            Self::Panel(PanelRequest::Temperature(v)) => write!(f, "temperature={v}"),
            Self::NewFollower => f.write_str("newfollow"),
            Self::Prize(update) => write!(f, "prize {}={:.2}", update.slot, update.amount),
        }
    }
}

impl LightRequest {
    /// Validate the request and turn it into something the router
    /// accepts.
    pub fn normalize(self, timings: &EffectTimings) -> Result<Normalized, CoreError> {
        let command = match self {
            Self::Strip(name) => strip_command(&name, timings.strobe)?,
            Self::Panel(request) => panel_command(request)?,
            Self::NewFollower => alert_strobe(timings.strobe),
            Self::Prize(update) => {
                if !update.amount.is_finite() {
                    return Err(CoreError::InvalidRequest {
                        message: format!("prize amount must be a number, got {}", update.amount),
                    });
                }
                return Ok(Normalized::Prize(update));
            }
        };
        debug!(kind = ?command.kind, target = %command.target, "inbound request normalized");
        Ok(Normalized::Command(command))
    }
}

fn strip_command(name: &str, strobe: Duration) -> Result<Command, CoreError> {
    let name = name.trim().to_ascii_lowercase();
    let request = |kind| Command::new(kind, DeviceSelector::Strip, SourcePriority::Request);
    let show = |pattern| {
        Command::transient(
            TransientEffect::new(Effect::Pattern(pattern), strobe),
            DeviceSelector::Both,
            SourcePriority::Request,
        )
    };

    match name.as_str() {
        "seton" => return Ok(request(CommandKind::Power(true))),
        "setoff" => return Ok(request(CommandKind::Power(false))),
        "!disco" => return Ok(show(PatternId::WhiteStrobe)),
        "purplestrobe" => return Ok(show(PatternId::PurpleStrobe)),
        "greenstrobe" => return Ok(show(PatternId::GreenStrobe)),
        _ => {}
    }

    let (bang, bare) = match name.strip_prefix('!') {
        Some(bare) => (true, bare),
        None => (false, name.as_str()),
    };
    match bare.parse::<Scene>() {
        // The slow fades only exist under their bare names.
        Ok(scene) if !bang || scene.is_redeemable() => {
            Ok(request(CommandKind::AmbientColor(scene.ambient())))
        }
        _ => Err(CoreError::UnknownRequest { name }),
    }
}

fn panel_command(request: PanelRequest) -> Result<Command, CoreError> {
    let kind = match request {
        PanelRequest::On => CommandKind::Power(true),
        PanelRequest::Off => CommandKind::Power(false),
        PanelRequest::Brightness(value) => CommandKind::Brightness(Brightness::new(value)?),
        PanelRequest::Temperature(value) => CommandKind::Temperature(Temperature::new(value)?),
    };
    Ok(Command::new(kind, DeviceSelector::Panel, SourcePriority::Request))
}

/// A viewer redemption. Only the redeemable scenes are accepted;
/// anything else yields `None`.
pub fn redemption(input: &str) -> Option<Command> {
    let scene = input.trim().parse::<Scene>().ok()?;
    scene.is_redeemable().then(|| {
        Command::ambient(scene.ambient(), DeviceSelector::Strip, SourcePriority::Redemption)
    })
}

/// Purple strobe on both lights, used for follows, bits and
/// subscriptions.
pub fn alert_strobe(strobe: Duration) -> Command {
    Command::transient(
        TransientEffect::new(Effect::Pattern(PatternId::PurpleStrobe), strobe),
        DeviceSelector::Both,
        SourcePriority::Alert,
    )
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{AmbientState, PrizeSlot, Revert, Rgba};

    fn command(request: &str) -> Result<Command, CoreError> {
        match request.parse::<LightRequest>()?.normalize(&EffectTimings::default())? {
            Normalized::Command(command) => Ok(command),
            Normalized::Prize(_) => panic!("unexpected prize for {request}"),
        }
    }

    #[test]
    fn colors_accept_optional_bang() {
        for request in ["blue", "!blue", "  BLUE "] {
            let cmd = command(request).unwrap();
            assert_eq!(cmd.kind, CommandKind::AmbientColor(AmbientState::solid(Rgba::BLUE)));
            assert_eq!(cmd.target, DeviceSelector::Strip);
            assert_eq!(cmd.priority, SourcePriority::Request);
        }
    }

    #[test]
    fn slow_fades_have_no_bang_form() {
        assert_eq!(
            command("sloworange").unwrap().kind,
            CommandKind::AmbientColor(AmbientState::pattern(PatternId::SlowOrange))
        );
        assert!(matches!(
            command("!sloworange"),
            Err(CoreError::UnknownRequest { .. })
        ));
        assert!(command("!synthwave").is_ok());
    }

    #[test]
    fn strobes_hit_both_devices_and_revert_to_ambient() {
        for (request, pattern) in [
            ("!disco", PatternId::WhiteStrobe),
            ("purplestrobe", PatternId::PurpleStrobe),
            ("greenstrobe", PatternId::GreenStrobe),
        ] {
            let cmd = command(request).unwrap();
            assert_eq!(cmd.target, DeviceSelector::Both);
            let CommandKind::TransientEffect(effect) = cmd.kind else {
                panic!("{request} is not a transient");
            };
            assert_eq!(effect.effect, Effect::Pattern(pattern));
            assert_eq!(effect.revert, Revert::CurrentAmbient);
            assert_eq!(effect.duration, Duration::from_secs(3));
        }
    }

    #[test]
    fn strip_power_keywords() {
        assert_eq!(command("seton").unwrap().kind, CommandKind::Power(true));
        assert_eq!(command("setoff").unwrap().kind, CommandKind::Power(false));
    }

    #[test]
    fn panel_requests_are_range_checked() {
        let cmd = command("brightness=40").unwrap();
        assert_eq!(cmd.target, DeviceSelector::Panel);
        assert_eq!(cmd.kind, CommandKind::Brightness(Brightness::new(40).unwrap()));
        assert!(matches!(
            command("brightness=101"),
            Err(CoreError::OutOfRange { field: "brightness", .. })
        ));
        assert!(matches!(
            command("temperature=100"),
            Err(CoreError::OutOfRange { field: "temperature", .. })
        ));
        assert!(matches!(
            command("brightness=lots"),
            Err(CoreError::InvalidRequest { .. })
        ));
        assert_eq!(command("light_off").unwrap().kind, CommandKind::Power(false));
    }

    #[test]
    fn new_follower_is_an_alert_strobe() {
        let cmd = command("newfollow").unwrap();
        assert_eq!(cmd.priority, SourcePriority::Alert);
        assert_eq!(cmd.target, DeviceSelector::Both);
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(matches!(command("mauve"), Err(CoreError::UnknownRequest { .. })));
        assert!(matches!(command("volume=3"), Err(CoreError::UnknownRequest { .. })));
        assert!("".parse::<LightRequest>().is_err());
    }

    #[test]
    fn prize_adjustments_pass_through() {
        let update = PrizeUpdate {
            from: "host".into(),
            slot: PrizeSlot::Second,
            amount: 5.0,
        };
        let normalized = LightRequest::Prize(update.clone())
            .normalize(&EffectTimings::default())
            .unwrap();
        assert_eq!(normalized, Normalized::Prize(update));
    }

    #[test]
    fn redemptions_use_the_fixed_enumeration() {
        let cmd = redemption("Aquatic").unwrap();
        assert_eq!(cmd.priority, SourcePriority::Redemption);
        assert_eq!(
            cmd.kind,
            CommandKind::AmbientColor(AmbientState::pattern(PatternId::Aquatic))
        );
        assert!(redemption("slowpurple").is_none());
        assert!(redemption("!red").is_none());
        assert!(redemption("make it pink").is_none());
    }
}
