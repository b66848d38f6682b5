//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use glowcast_config::ConfigError;
use glowcast_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Requests ─────────────────────────────────────────────────────
    #[error("Unknown light request '{name}'")]
    #[diagnostic(
        code(glowcast::unknown_request),
        help(
            "Use a scene name (blue, purple, synthwave, ...), a strobe \
             (purplestrobe, greenstrobe, !disco), seton/setoff, light_on/light_off,\n\
             brightness=N or temperature=N.\n\
             Run: glowcast light --help"
        )
    )]
    UnknownRequest { name: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(glowcast::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No {secret} configured")]
    #[diagnostic(
        code(glowcast::missing_secret),
        help(
            "Set {env}, store it in the system keyring under service 'glowcast',\n\
             or add it to the config file (see: glowcast config path)."
        )
    )]
    MissingSecret { secret: &'static str, env: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(glowcast::config),
        help("Check the config file. Run: glowcast config show")
    )]
    Config { message: String },

    // ── Devices ──────────────────────────────────────────────────────
    #[error("Could not reach light: {reason}")]
    #[diagnostic(
        code(glowcast::device_unreachable),
        help("Check that the strip and panel are powered and that [strip] addr and [panel] url are right.")
    )]
    DeviceUnreachable { reason: String },

    #[error("Light did not answer within {timeout_ms}ms")]
    #[diagnostic(
        code(glowcast::timeout),
        help("Raise [panel] timeout in the config file or check the device.")
    )]
    Timeout { timeout_ms: u64 },

    // ── Everything else ──────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(glowcast::core))]
    Core(CoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownRequest { name } => Self::UnknownRequest { name },
            CoreError::OutOfRange { field, .. } => Self::Validation {
                field: field.into(),
                reason: err.to_string(),
            },
            CoreError::InvalidRequest { message } => Self::Validation {
                field: "request".into(),
                reason: message,
            },
            CoreError::Config { message } => Self::Config { message },
            CoreError::DeviceUnreachable { reason } => Self::DeviceUnreachable { reason },
            CoreError::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
            other => Self::Core(other),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Config {
                message: format!("invalid {field}: {reason}"),
            },
            ConfigError::MissingSecret { secret, env } => Self::MissingSecret { secret, env },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config {
                message: other.to_string(),
            },
        }
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnknownRequest { .. } | Self::Validation { .. } => exit_code::USAGE,
            Self::MissingSecret { .. } | Self::Config { .. } => exit_code::CONFIG,
            Self::DeviceUnreachable { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Core(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_errors_are_usage_errors() {
        let unknown = CliError::from(CoreError::UnknownRequest {
            name: "mauve".into(),
        });
        assert_eq!(unknown.exit_code(), exit_code::USAGE);

        let range = CliError::from(CoreError::OutOfRange {
            field: "brightness",
            value: 150,
            min: 0,
            max: 100,
        });
        assert!(matches!(&range, CliError::Validation { field, .. } if field == "brightness"));
        assert_eq!(range.exit_code(), exit_code::USAGE);
    }

    #[test]
    fn missing_secrets_keep_the_env_hint() {
        let err = CliError::from(ConfigError::MissingSecret {
            secret: "pub/sub token",
            env: "GLOWCAST_PUBSUB_TOKEN".into(),
        });
        assert_eq!(err.exit_code(), exit_code::CONFIG);
        assert!(matches!(err, CliError::MissingSecret { env, .. } if env == "GLOWCAST_PUBSUB_TOKEN"));
    }

    #[test]
    fn device_failures_map_to_connection_and_timeout() {
        let unreachable = CliError::from(CoreError::DeviceUnreachable {
            reason: "refused".into(),
        });
        assert_eq!(unreachable.exit_code(), exit_code::CONNECTION);
        let slow = CliError::from(CoreError::Timeout { timeout_ms: 10 });
        assert_eq!(slow.exit_code(), exit_code::TIMEOUT);
        assert_eq!(CliError::from(CoreError::RouterClosed).exit_code(), exit_code::GENERAL);
    }
}
