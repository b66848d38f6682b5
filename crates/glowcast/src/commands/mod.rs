//! Subcommand handlers.

pub mod config_cmd;
pub mod light;
pub mod run;

use glowcast_config::Config;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load the config named by `--config` (or the platform default).
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(glowcast_config::load_config(global.config.as_deref())?)
}
