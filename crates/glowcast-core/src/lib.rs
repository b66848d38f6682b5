// glowcast-core: event-driven effect orchestration between the feeds and the lights.

pub mod adapter;
pub mod config;
pub mod device;
pub mod error;
pub mod inbound;
pub mod ledger;
pub mod model;
pub mod orchestrator;
pub mod router;

mod score;
mod sequencer;

// ── Primary re-exports ──────────────────────────────────────────────
pub use adapter::SourceAdapter;
pub use config::{
    DeviceConfig, DonationSource, EffectTimings, LedgerConfig, OrchestratorConfig, PubSubSource,
    RouterConfig, SourcesConfig,
};
pub use device::{DeviceFacade, Light, PanelLight, StripLight};
pub use error::CoreError;
pub use inbound::{LightRequest, Normalized, PanelRequest};
pub use ledger::PrizeLedger;
pub use orchestrator::Orchestrator;
pub use router::Router;

// Model types at the crate root for ergonomics.
pub use model::{
    AmbientState, Brightness, Command, CommandKind, DashboardEvent, Device, DeviceSelector, Effect,
    GameSignal, MatchPhase, PatternId, PrizeSlot, PrizeUpdate, Revert, Rgba, Scene, ScoreState,
    SourcePriority, Team, Temperature, TransientEffect,
};

// Feed state comes straight from the wire layer.
pub use glowcast_api::{ConnectionState, ReconnectConfig};
