//! Clap derive structures for the `phimon` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// phimon -- watch and manage sensors on a Phidget sensor server
#[derive(Debug, Parser)]
#[command(
    name = "phimon",
    version,
    about = "Monitor Phidget sensors from the command line",
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
    /// Output format (defaults to the config file's `output`, then table)
    #[arg(long, short = 'o', env = "PHIMON_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// Path to the config file
    #[arg(long, env = "PHIMON_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Follow live sensor readings until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Connect the server to its hardware and remember the session
    Connect(ConnectArgs),

    /// Close the server's hardware link and forget the session
    Disconnect,

    /// Show the saved session and connection state
    Status,

    /// Inspect and manage registered sensors
    #[command(alias = "s")]
    Sensors(SensorsArgs),
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Server address to connect to instead of restoring the saved session
    #[arg(long, short = 'a')]
    pub address: Option<String>,

    /// Server port (defaults to the config file's `[server] port`)
    #[arg(long, short = 'P', requires = "address")]
    pub port: Option<u16>,

    /// Password for the server's hardware link
    #[arg(long, env = "PHIMON_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, Args)]
pub struct ConnectArgs {
    /// Server address (host name or IP); falls back to `[server] address`
    pub address: Option<String>,

    /// Server port (defaults to the config file's `[server] port`)
    #[arg(long, short = 'P')]
    pub port: Option<u16>,

    /// Password for the server's hardware link
    #[arg(long, env = "PHIMON_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, Args)]
pub struct SensorsArgs {
    #[command(subcommand)]
    pub command: SensorsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SensorsCommand {
    /// List sensors with their latest readings
    #[command(alias = "ls")]
    List,

    /// Fetch one sensor's current reading
    Read {
        /// Sensor id
        id: String,
    },

    /// Register a sensor channel with the server
    Register(RegisterArgs),

    /// Remove a sensor from the server
    #[command(alias = "rm")]
    Unregister {
        /// Sensor id
        id: String,
    },
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    /// Sensor type (TEMPERATURE, HUMIDITY, DIGITALINPUT, ...)
    #[arg(long = "type", short = 't')]
    pub sensor_type: String,

    /// VINT hub port
    #[arg(long)]
    pub hub_port: u32,

    /// Channel on the hub port
    #[arg(long, default_value_t = 0)]
    pub channel: u32,

    /// Device serial number
    #[arg(long)]
    pub serial: Option<i32>,

    /// Display name
    #[arg(long)]
    pub name: Option<String>,
}
