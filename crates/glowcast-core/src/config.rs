// ── Runtime orchestrator configuration ──
//
// These types describe how the orchestrator behaves and where its
// devices and feeds live. They never touch disk; `glowcast-config`
// builds them from files and the environment.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use glowcast_api::ReconnectConfig;
use glowcast_api::transport::TransportConfig;

use crate::model::Scene;

/// Durations of the built-in effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectTimings {
    /// How long a strobe runs before reverting. Default: 3s.
    pub strobe: Duration,
    /// How long the demolition flash holds red. Default: 1s.
    pub demolition: Duration,
    /// Wait after a goal before reading the score, so the score update
    /// that usually trails the goal event lands first. Default: 100ms.
    pub goal_settle: Duration,
    /// Gap between the score ambient and the goal strobe. Default: 100ms.
    pub strobe_delay: Duration,
    /// Compensating delay after a power transition; the strip controller
    /// sometimes truncates its reply. Default: 100ms.
    pub power_settle: Duration,
}

impl Default for EffectTimings {
    fn default() -> Self {
        Self {
            strobe: Duration::from_secs(3),
            demolition: Duration::from_secs(1),
            goal_settle: Duration::from_millis(100),
            strobe_delay: Duration::from_millis(100),
            power_settle: Duration::from_millis(100),
        }
    }
}

/// Router behavior.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub timings: EffectTimings,
    /// Strip ambient applied at startup, with the panel switched on.
    /// `None` leaves both lights as they are.
    pub initial_scene: Option<Scene>,
    /// Capacity of the inbound command queue.
    pub queue_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            timings: EffectTimings::default(),
            initial_scene: Some(Scene::Purple),
            queue_capacity: 64,
        }
    }
}

/// Where the two lights live.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Strip controller `host:port`.
    pub strip_addr: String,
    /// Panel base URL, e.g. `http://10.0.0.19:9123`.
    pub panel_url: Url,
    pub transport: TransportConfig,
}

/// Pub/sub feed settings plus the channel whose topics to follow.
#[derive(Debug, Clone)]
pub struct PubSubSource {
    pub url: Url,
    pub channel_id: String,
    pub auth_token: SecretString,
    pub heartbeat_interval: Duration,
    pub settle_delay: Duration,
}

/// Donation feed socket.io URL and its JWT.
#[derive(Debug, Clone)]
pub struct DonationSource {
    pub url: Url,
    pub jwt: SecretString,
}

/// Prize ledger endpoint.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub url: Url,
    pub auth: SecretString,
}

/// Which feeds to run. `None` disables a feed.
#[derive(Debug, Clone, Default)]
pub struct SourcesConfig {
    pub telemetry: Option<Url>,
    pub pubsub: Option<PubSubSource>,
    pub donation: Option<DonationSource>,
    pub reconnect: ReconnectConfig,
}

/// Everything needed to start the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub router: RouterConfig,
    pub devices: DeviceConfig,
    pub sources: SourcesConfig,
    pub ledger: Option<LedgerConfig>,
}
