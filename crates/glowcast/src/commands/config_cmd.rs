//! `glowcast config` subcommands.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = super::load(global)?;
            let rendered = glowcast_config::render_redacted(&cfg)?;
            print!("{rendered}");
            Ok(())
        }
        ConfigCommand::Path => {
            let path = global
                .config
                .clone()
                .unwrap_or_else(glowcast_config::config_path);
            println!("{}", path.display());
            Ok(())
        }
    }
}
