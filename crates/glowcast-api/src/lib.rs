// glowcast-api: wire protocols for the event feeds and the two light devices.

pub mod donation;
pub mod error;
pub mod feed;
pub mod ledger;
pub mod panel;
pub mod pubsub;
pub mod strip;
pub mod telemetry;
pub mod transport;

pub use error::Error;
pub use feed::{ConnectionState, FeedHandle, ReconnectConfig};
pub use ledger::LedgerClient;
pub use panel::PanelClient;
pub use strip::StripClient;
