use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Flags for the supervisor daemon.
#[derive(Parser, Debug)]
#[command(name = "procsupervisord", about = "Process supervisor daemon")]
pub struct DaemonArgs {
    /// Path to the main TOML configuration file.
    #[arg(short, long, default_value = "/etc/procsupervisor/supervisor.toml")]
    pub config: PathBuf,

    /// Control API bind host.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Control API bind port.
    #[arg(long, default_value_t = 9001)]
    pub port: u16,
}

/// Flags and subcommands for the operator CLI client.
#[derive(Parser, Debug)]
#[command(name = "procsupervisorctl", about = "Process supervisor control client")]
pub struct CtlArgs {
    /// Base URL of a running supervisor's control API.
    #[arg(short = 'u', long = "url", default_value = "http://127.0.0.1:9001")]
    pub url: String,

    #[command(subcommand)]
    pub command: CtlCommand,
}

#[derive(Subcommand, Debug)]
pub enum CtlCommand {
    /// List program statuses.
    Status,
    /// Re-parse config and show the pending diff.
    Reread,
    /// Re-parse config and apply the diff.
    Update,
    /// Start a program.
    Start { name: String },
    /// Stop a program.
    Stop { name: String },
    /// Hot-restart a program.
    Restart { name: String },
}
