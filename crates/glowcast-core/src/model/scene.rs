// ── Colors, patterns and the named scene catalog ──

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// An RGB color plus a brightness channel (`a`, 0-255).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Self = Self::opaque(255, 255, 255);
    pub const RED: Self = Self::opaque(255, 0, 0);
    pub const GREEN: Self = Self::opaque(0, 255, 0);
    pub const BLUE: Self = Self::opaque(0, 0, 255);
    pub const ORANGE: Self = Self::opaque(255, 35, 0);
    pub const CYAN: Self = Self::opaque(0, 255, 255);
    pub const PURPLE: Self = Self::opaque(255, 0, 255);

    /// Full-brightness color.
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgb(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Brightness channel mapped onto 0-100.
    pub fn brightness_percent(self) -> u8 {
        u8::try_from(u16::from(self.a) * 100 / 255).unwrap_or(100)
    }
}

// ── Patterns ─────────────────────────────────────────────────────────

/// How a pattern moves between its colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Fade,
    Jump,
    Strobe,
}

/// A fixed multi-color pattern the strip can run on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    pub colors: &'static [Rgba],
    pub transition: Transition,
    /// 0-100, higher is faster.
    pub speed: u8,
}

static SLOW_ORANGE: [Rgba; 2] = [Rgba::ORANGE, Rgba::opaque(128, 16, 0)];
static SLOW_PURPLE: [Rgba; 2] = [Rgba::PURPLE, Rgba::opaque(128, 0, 72)];
static SYNTHWAVE: [Rgba; 2] = [Rgba::ORANGE, Rgba::PURPLE];
static AQUATIC: [Rgba; 2] = [Rgba::opaque(0, 255, 75), Rgba::opaque(0, 75, 255)];
static WHITE: [Rgba; 1] = [Rgba::WHITE];
static PURPLE: [Rgba; 1] = [Rgba::PURPLE];
static GREEN: [Rgba; 1] = [Rgba::GREEN];
static ORANGE: [Rgba; 1] = [Rgba::ORANGE];
static BLUE: [Rgba; 1] = [Rgba::BLUE];

/// Identifier of a catalog pattern.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PatternId {
    SlowOrange,
    SlowPurple,
    Synthwave,
    Aquatic,
    WhiteStrobe,
    PurpleStrobe,
    GreenStrobe,
    OrangeStrobe,
    BlueStrobe,
}

impl PatternId {
    pub fn pattern(self) -> Pattern {
        let (colors, transition, speed) = match self {
            Self::SlowOrange => (&SLOW_ORANGE[..], Transition::Fade, 50),
            Self::SlowPurple => (&SLOW_PURPLE[..], Transition::Fade, 50),
            Self::Synthwave => (&SYNTHWAVE[..], Transition::Fade, 70),
            Self::Aquatic => (&AQUATIC[..], Transition::Fade, 70),
            Self::WhiteStrobe => (&WHITE[..], Transition::Strobe, 100),
            Self::PurpleStrobe => (&PURPLE[..], Transition::Strobe, 100),
            Self::GreenStrobe => (&GREEN[..], Transition::Strobe, 100),
            Self::OrangeStrobe => (&ORANGE[..], Transition::Strobe, 100),
            Self::BlueStrobe => (&BLUE[..], Transition::Strobe, 100),
        };
        Pattern {
            colors,
            transition,
            speed,
        }
    }

    pub fn speed(self) -> u8 {
        self.pattern().speed
    }

    /// Color a device shows for this pattern when it cannot run patterns.
    pub fn first_color(self) -> Rgba {
        self.pattern().colors.first().copied().unwrap_or(Rgba::WHITE)
    }
}

// ── Ambient state ────────────────────────────────────────────────────

/// The resting color or pattern of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbientState {
    pub color: Rgba,
    pub pattern: Option<PatternId>,
}

impl AmbientState {
    pub const fn solid(color: Rgba) -> Self {
        Self {
            color,
            pattern: None,
        }
    }

    pub fn pattern(pattern: PatternId) -> Self {
        Self {
            color: pattern.first_color(),
            pattern: Some(pattern),
        }
    }
}

impl Default for AmbientState {
    fn default() -> Self {
        Self::solid(Rgba::WHITE)
    }
}

// ── Scenes ───────────────────────────────────────────────────────────

/// A named ambient scene. Names parse case-insensitively.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Scene {
    White,
    Red,
    Green,
    Blue,
    Cyan,
    Orange,
    Purple,
    SlowOrange,
    SlowPurple,
    Synthwave,
    Aquatic,
}

impl Scene {
    pub fn ambient(self) -> AmbientState {
        match self {
            Self::White => AmbientState::solid(Rgba::WHITE),
            Self::Red => AmbientState::solid(Rgba::RED),
            Self::Green => AmbientState::solid(Rgba::GREEN),
            Self::Blue => AmbientState::solid(Rgba::BLUE),
            Self::Cyan => AmbientState::solid(Rgba::CYAN),
            Self::Orange => AmbientState::solid(Rgba::ORANGE),
            Self::Purple => AmbientState::solid(Rgba::PURPLE),
            Self::SlowOrange => AmbientState::pattern(PatternId::SlowOrange),
            Self::SlowPurple => AmbientState::pattern(PatternId::SlowPurple),
            Self::Synthwave => AmbientState::pattern(PatternId::Synthwave),
            Self::Aquatic => AmbientState::pattern(PatternId::Aquatic),
        }
    }

    /// Whether viewers may pick this scene through a redemption.
    pub fn is_redeemable(self) -> bool {
        !matches!(self, Self::SlowOrange | Self::SlowPurple)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn scene_names_parse_case_insensitively() {
        assert_eq!(Scene::from_str("Purple").ok(), Some(Scene::Purple));
        assert_eq!(Scene::from_str("SYNTHWAVE").ok(), Some(Scene::Synthwave));
        assert_eq!(Scene::from_str("sloworange").ok(), Some(Scene::SlowOrange));
        assert!(Scene::from_str("magenta").is_err());
    }

    #[test]
    fn redeemable_scenes_are_the_viewer_list() {
        let names: Vec<String> = Scene::iter()
            .filter(|s| s.is_redeemable())
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            names,
            [
                "white",
                "red",
                "green",
                "blue",
                "cyan",
                "orange",
                "purple",
                "synthwave",
                "aquatic"
            ]
        );
    }

    #[test]
    fn pattern_scenes_carry_their_first_color() {
        let ambient = Scene::Aquatic.ambient();
        assert_eq!(ambient.pattern, Some(PatternId::Aquatic));
        assert_eq!(ambient.color, Rgba::opaque(0, 255, 75));
    }

    #[test]
    fn strobes_run_at_full_speed() {
        for id in PatternId::iter() {
            let pattern = id.pattern();
            if pattern.transition == Transition::Strobe {
                assert_eq!(pattern.speed, 100, "{id}");
                assert_eq!(pattern.colors.len(), 1, "{id}");
            }
        }
    }

    #[test]
    fn brightness_channel_maps_to_percent() {
        assert_eq!(Rgba::WHITE.brightness_percent(), 100);
        assert_eq!(Rgba { a: 0, ..Rgba::RED }.brightness_percent(), 0);
        assert_eq!(Rgba { a: 128, ..Rgba::RED }.brightness_percent(), 50);
    }
}
