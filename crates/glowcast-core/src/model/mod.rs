// ── Domain model ──
//
// Colors and scenes, the command vocabulary, game signals and the
// prize pool. Nothing here performs I/O.

pub mod command;
pub mod game;
pub mod prize;
pub mod scene;

pub use command::{
    Brightness, Command, CommandKind, Device, DeviceSelector, Effect, Revert, SourcePriority,
    Temperature, TransientEffect,
};
pub use game::{GameSignal, MatchPhase, ScoreState, Team};
pub use prize::{DashboardEvent, PrizeSlot, PrizeUpdate};
pub use scene::{AmbientState, Pattern, PatternId, Rgba, Scene, Transition};
