//! Configuration for glowcast.
//!
//! TOML file plus `GLOWCAST_` environment overrides, secret resolution
//! (env var, then keyring, then plaintext), and translation into
//! `glowcast_core::OrchestratorConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use glowcast_api::transport::TransportConfig;
use glowcast_core::{
    DeviceConfig, DonationSource, EffectTimings, LedgerConfig, OrchestratorConfig, PubSubSource,
    ReconnectConfig, RouterConfig, Scene, SourcesConfig,
};

const KEYRING_SERVICE: &str = "glowcast";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no {secret} configured (set {env}, store it in the keyring, or add it to the config file)")]
    MissingSecret { secret: &'static str, env: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Delay before a dropped feed reconnects, in milliseconds.
    #[serde(default = "default_reconnect_ms")]
    pub reconnect_ms: u64,

    #[serde(default)]
    pub strip: StripSection,

    #[serde(default)]
    pub panel: PanelSection,

    #[serde(default)]
    pub effects: EffectsSection,

    #[serde(default)]
    pub telemetry: TelemetrySection,

    /// Absent disables the pub/sub feed.
    pub pubsub: Option<PubSubSection>,

    /// Absent disables the donation feed.
    pub donation: Option<DonationSection>,

    /// Absent disables prize ledger updates.
    pub ledger: Option<LedgerSection>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reconnect_ms: default_reconnect_ms(),
            strip: StripSection::default(),
            panel: PanelSection::default(),
            effects: EffectsSection::default(),
            telemetry: TelemetrySection::default(),
            pubsub: None,
            donation: None,
            ledger: None,
        }
    }
}

fn default_reconnect_ms() -> u64 {
    3000
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StripSection {
    /// Controller `host:port`.
    #[serde(default = "default_strip_addr")]
    pub addr: String,
}

impl Default for StripSection {
    fn default() -> Self {
        Self {
            addr: default_strip_addr(),
        }
    }
}

fn default_strip_addr() -> String {
    "10.0.0.21:5577".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PanelSection {
    #[serde(default = "default_panel_url")]
    pub url: String,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for PanelSection {
    fn default() -> Self {
        Self {
            url: default_panel_url(),
            timeout: default_timeout(),
        }
    }
}

fn default_panel_url() -> String {
    "http://10.0.0.19:9123".into()
}
fn default_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EffectsSection {
    #[serde(default = "default_strobe_ms")]
    pub strobe_ms: u64,
    #[serde(default = "default_demolition_ms")]
    pub demolition_ms: u64,
    #[serde(default = "default_short_ms")]
    pub goal_settle_ms: u64,
    #[serde(default = "default_short_ms")]
    pub strobe_delay_ms: u64,
    #[serde(default = "default_short_ms")]
    pub power_settle_ms: u64,

    /// Strip scene at startup, or `"none"` to leave the lights alone.
    #[serde(default = "default_initial_scene")]
    pub initial_scene: String,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for EffectsSection {
    fn default() -> Self {
        Self {
            strobe_ms: default_strobe_ms(),
            demolition_ms: default_demolition_ms(),
            goal_settle_ms: default_short_ms(),
            strobe_delay_ms: default_short_ms(),
            power_settle_ms: default_short_ms(),
            initial_scene: default_initial_scene(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_strobe_ms() -> u64 {
    3000
}
fn default_demolition_ms() -> u64 {
    1000
}
fn default_short_ms() -> u64 {
    100
}
fn default_initial_scene() -> String {
    "purple".into()
}
fn default_queue_capacity() -> usize {
    64
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TelemetrySection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_telemetry_url")]
    pub url: String,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_telemetry_url(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_telemetry_url() -> String {
    "ws://localhost:49122".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PubSubSection {
    #[serde(default = "default_pubsub_url")]
    pub url: String,

    /// Numeric channel id the topics are built from.
    pub channel_id: String,

    /// OAuth token (plaintext; prefer keyring or env var).
    pub auth_token: Option<String>,

    /// Environment variable holding the OAuth token.
    pub auth_token_env: Option<String>,

    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_pubsub_url() -> String {
    "wss://pubsub-edge.twitch.tv".into()
}
fn default_heartbeat_secs() -> u64 {
    60
}
fn default_settle_ms() -> u64 {
    3000
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DonationSection {
    #[serde(default = "default_donation_url")]
    pub url: String,

    /// JWT (plaintext; prefer keyring or env var).
    pub jwt: Option<String>,

    /// Environment variable holding the JWT.
    pub jwt_env: Option<String>,
}

fn default_donation_url() -> String {
    "wss://realtime.streamelements.com/socket.io/?EIO=4&transport=websocket".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LedgerSection {
    /// Base URL; `/prizepool` is appended.
    pub url: String,

    /// Shared secret sent as `Authorization` (plaintext; prefer keyring or env var).
    pub secret: Option<String>,

    /// Environment variable holding the shared secret.
    pub secret_env: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "glowcast", "glowcast").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("glowcast");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load defaults, then `path` (or the platform config file), then
/// `GLOWCAST_*` environment variables. `__` separates nested keys, e.g.
/// `GLOWCAST_PANEL__URL`. A missing file is not an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    debug!(path = %path.display(), "loading config");

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("GLOWCAST_").split("__"));

    Ok(figment.extract()?)
}

/// Serialize config to TOML with every plaintext secret masked.
pub fn render_redacted(cfg: &Config) -> Result<String, ConfigError> {
    let mut cfg = cfg.clone();
    let mask = |s: &mut Option<String>| {
        if s.is_some() {
            *s = Some("********".into());
        }
    };
    if let Some(pubsub) = cfg.pubsub.as_mut() {
        mask(&mut pubsub.auth_token);
    }
    if let Some(donation) = cfg.donation.as_mut() {
        mask(&mut donation.jwt);
    }
    if let Some(ledger) = cfg.ledger.as_mut() {
        mask(&mut ledger.secret);
    }
    Ok(toml::to_string_pretty(&cfg)?)
}

// ── Secret resolution ───────────────────────────────────────────────

/// Where a secret may live.
struct SecretSource<'a> {
    /// Human name, used in errors.
    name: &'static str,
    /// Keyring account under the `glowcast` service.
    keyring_account: &'static str,
    env: Option<&'a str>,
    default_env: &'static str,
    plaintext: Option<&'a str>,
}

fn resolve_secret(source: &SecretSource<'_>) -> Result<SecretString, ConfigError> {
    let env_name = source.env.unwrap_or(source.default_env);

    // 1. Environment variable
    if let Ok(value) = std::env::var(env_name) {
        debug!(secret = source.name, env = env_name, "secret from environment");
        return Ok(SecretString::from(value));
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, source.keyring_account) {
        if let Ok(secret) = entry.get_password() {
            debug!(secret = source.name, "secret from keyring");
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(value) = source.plaintext {
        return Ok(SecretString::from(value.to_owned()));
    }

    Err(ConfigError::MissingSecret {
        secret: source.name,
        env: env_name.to_owned(),
    })
}

// ── Translation to runtime config ───────────────────────────────────

fn parse_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    value.parse().map_err(|e: url::ParseError| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL {value:?}: {e}"),
    })
}

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

impl Config {
    /// Router settings and device addresses only; no feeds, no ledger,
    /// no secrets needed.
    pub fn router_config(&self) -> Result<RouterConfig, ConfigError> {
        let fx = &self.effects;
        let initial_scene = match fx.initial_scene.trim().to_ascii_lowercase().as_str() {
            "none" | "" => None,
            name => Some(name.parse::<Scene>().map_err(|_| ConfigError::Validation {
                field: "effects.initial_scene".into(),
                reason: format!("unknown scene {name:?}"),
            })?),
        };
        if fx.queue_capacity == 0 {
            return Err(ConfigError::Validation {
                field: "effects.queue_capacity".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(RouterConfig {
            timings: EffectTimings {
                strobe: millis(fx.strobe_ms),
                demolition: millis(fx.demolition_ms),
                goal_settle: millis(fx.goal_settle_ms),
                strobe_delay: millis(fx.strobe_delay_ms),
                power_settle: millis(fx.power_settle_ms),
            },
            initial_scene,
            queue_capacity: fx.queue_capacity,
        })
    }

    pub fn device_config(&self) -> Result<DeviceConfig, ConfigError> {
        if self.strip.addr.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "strip.addr".into(),
                reason: "must be host:port".into(),
            });
        }
        Ok(DeviceConfig {
            strip_addr: self.strip.addr.trim().to_owned(),
            panel_url: parse_url("panel.url", &self.panel.url)?,
            transport: TransportConfig {
                timeout: Duration::from_secs(self.panel.timeout),
                ..TransportConfig::default()
            },
        })
    }

    /// Every enabled feed, with its secrets resolved.
    pub fn sources_config(&self) -> Result<SourcesConfig, ConfigError> {
        let telemetry = if self.telemetry.enabled {
            Some(parse_url("telemetry.url", &self.telemetry.url)?)
        } else {
            None
        };

        let pubsub = self
            .pubsub
            .as_ref()
            .map(|section| -> Result<PubSubSource, ConfigError> {
                if section.heartbeat_secs == 0 {
                    return Err(ConfigError::Validation {
                        field: "pubsub.heartbeat_secs".into(),
                        reason: "must be at least 1".into(),
                    });
                }
                Ok(PubSubSource {
                    url: parse_url("pubsub.url", &section.url)?,
                    channel_id: section.channel_id.clone(),
                    auth_token: resolve_secret(&SecretSource {
                        name: "pub/sub OAuth token",
                        keyring_account: "pubsub/auth-token",
                        env: section.auth_token_env.as_deref(),
                        default_env: "GLOWCAST_PUBSUB_TOKEN",
                        plaintext: section.auth_token.as_deref(),
                    })?,
                    heartbeat_interval: Duration::from_secs(section.heartbeat_secs),
                    settle_delay: millis(section.settle_ms),
                })
            })
            .transpose()?;

        let donation = self
            .donation
            .as_ref()
            .map(|section| -> Result<DonationSource, ConfigError> {
                Ok(DonationSource {
                    url: parse_url("donation.url", &section.url)?,
                    jwt: resolve_secret(&SecretSource {
                        name: "donation JWT",
                        keyring_account: "donation/jwt",
                        env: section.jwt_env.as_deref(),
                        default_env: "GLOWCAST_DONATION_JWT",
                        plaintext: section.jwt.as_deref(),
                    })?,
                })
            })
            .transpose()?;

        Ok(SourcesConfig {
            telemetry,
            pubsub,
            donation,
            reconnect: ReconnectConfig {
                delay: millis(self.reconnect_ms),
            },
        })
    }

    pub fn ledger_config(&self) -> Result<Option<LedgerConfig>, ConfigError> {
        self.ledger
            .as_ref()
            .map(|section| -> Result<LedgerConfig, ConfigError> {
                Ok(LedgerConfig {
                    url: parse_url("ledger.url", &section.url)?,
                    auth: resolve_secret(&SecretSource {
                        name: "ledger secret",
                        keyring_account: "ledger/secret",
                        env: section.secret_env.as_deref(),
                        default_env: "GLOWCAST_LEDGER_SECRET",
                        plaintext: section.secret.as_deref(),
                    })?,
                })
            })
            .transpose()
    }

    /// The full runtime configuration.
    pub fn orchestrator_config(&self) -> Result<OrchestratorConfig, ConfigError> {
        Ok(OrchestratorConfig {
            router: self.router_config()?,
            devices: self.device_config()?,
            sources: self.sources_config()?,
            ledger: self.ledger_config()?,
        })
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn defaults_match_the_documented_timings() {
        let router = Config::default().router_config().unwrap();
        assert_eq!(router.timings, EffectTimings::default());
        assert_eq!(router.initial_scene, Some(Scene::Purple));
        assert_eq!(router.queue_capacity, 64);
    }

    #[test]
    fn initial_scene_can_be_disabled_or_rejected() {
        let mut cfg = Config::default();
        cfg.effects.initial_scene = "None".into();
        assert_eq!(cfg.router_config().unwrap().initial_scene, None);

        cfg.effects.initial_scene = "Aquatic".into();
        assert_eq!(cfg.router_config().unwrap().initial_scene, Some(Scene::Aquatic));

        cfg.effects.initial_scene = "plaid".into();
        assert!(matches!(
            cfg.router_config(),
            Err(ConfigError::Validation { field, .. }) if field == "effects.initial_scene"
        ));
    }

    #[test]
    fn bad_urls_name_their_field() {
        let mut cfg = Config::default();
        cfg.panel.url = "not a url".into();
        assert!(matches!(
            cfg.device_config(),
            Err(ConfigError::Validation { field, .. }) if field == "panel.url"
        ));
    }

    #[test]
    fn plaintext_secret_is_the_last_resort() {
        let secret = resolve_secret(&SecretSource {
            name: "test secret",
            keyring_account: "test/unused-account",
            env: Some("GLOWCAST_TEST_SECRET_THAT_IS_NEVER_SET"),
            default_env: "GLOWCAST_TEST_SECRET_THAT_IS_NEVER_SET",
            plaintext: Some("from-file"),
        })
        .unwrap();
        assert_eq!(secret.expose_secret(), "from-file");
    }

    #[test]
    fn missing_secret_names_the_env_var() {
        let err = resolve_secret(&SecretSource {
            name: "test secret",
            keyring_account: "test/unused-account",
            env: None,
            default_env: "GLOWCAST_TEST_SECRET_THAT_IS_NEVER_SET",
            plaintext: None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("GLOWCAST_TEST_SECRET_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn redaction_masks_every_secret() {
        let cfg = Config {
            ledger: Some(LedgerSection {
                url: "https://ledger.example".into(),
                secret: Some("hunter2".into()),
                secret_env: None,
            }),
            ..Config::default()
        };
        let rendered = render_redacted(&cfg).unwrap();
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("********"));
    }
}
