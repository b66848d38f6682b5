//! Clap derive structures for the `glowcast` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// glowcast -- event-driven stream lighting
#[derive(Debug, Parser)]
#[command(
    name = "glowcast",
    version,
    about = "Drive stream lights from game telemetry, viewer events and donations",
    long_about = "Follows a live game telemetry socket, a stream-platform pub/sub feed and a\n\
        donation feed, and turns their events into effects on a LAN color strip\n\
        and an HTTP panel light.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file to load instead of the platform default
    #[arg(long, env = "GLOWCAST_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the orchestrator and every configured feed until Ctrl-C
    Run,

    /// Send one request to the lights, wait for it to settle, and exit
    #[command(
        after_help = "Examples:\n  \
            glowcast light blue\n  \
            glowcast light '!synthwave'\n  \
            glowcast light greenstrobe\n  \
            glowcast light brightness=40\n  \
            glowcast light light_off"
    )]
    Light(LightArgs),

    /// Inspect configuration
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct LightArgs {
    /// Scene name, strobe, seton/setoff, light_on/light_off,
    /// brightness=N (0-100), temperature=N (143-344) or newfollow
    pub request: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the resolved configuration, secrets masked
    Show,

    /// Print the config file path
    Path,
}
