//! Clap derive structures for the `esmart` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// esmart -- bridge myESmart nodes to a local accessory host
#[derive(Debug, Parser)]
#[command(
    name = "esmart",
    version,
    about = "Bridge myESmart home automation nodes over XMPP and MQTT",
    long_about = "Synchronizes myESmart nodes with a local accessory registry.\n\n\
        State reports arrive as JSON in an XMPP group chat; commands are sent\n\
        back as operation envelopes. An optional MQTT subscription on\n\
        esmart/set/node/+ forwards externally issued set-commands.",
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
    /// Config file (default: platform config dir)
    #[arg(long, short = 'c', env = "ESMART_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bridge until interrupted
    Run(RunArgs),

    /// Send one operation to a node and exit
    Send(SendArgs),

    /// Print the operation envelope a send would produce
    Encode(EncodeArgs),

    /// Inspect and manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Run ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Seconds to wait for the first XMPP login before warning
    #[arg(long, default_value = "30")]
    pub online_timeout: u64,
}

// ── Node fields ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Power {
    On,
    Off,
}

impl Power {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

/// Writable node fields shared by `send` and `encode`.
#[derive(Debug, Args)]
pub struct FieldArgs {
    /// Power state
    #[arg(long)]
    pub onoff: Option<Power>,

    /// Brightness percentage (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub dimming: Option<u8>,

    /// Shade position (JSON value)
    #[arg(long, value_name = "JSON")]
    pub position: Option<String>,

    /// Thermostat setpoint (JSON value)
    #[arg(long, value_name = "JSON")]
    pub setpoint: Option<String>,

    /// Device power field (JSON value)
    #[arg(long, value_name = "JSON")]
    pub device_on_off: Option<String>,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Node id (integer or string)
    pub node: String,

    #[command(flatten)]
    pub fields: FieldArgs,

    /// Seconds to wait for the XMPP session
    #[arg(long, default_value = "15")]
    pub timeout: u64,
}

#[derive(Debug, Args)]
pub struct EncodeArgs {
    /// Node id (integer or string)
    pub node: String,

    #[command(flatten)]
    pub fields: FieldArgs,

    /// Sender JID (default: xmpp.jid from config)
    #[arg(long)]
    pub from: Option<String>,

    /// Single-line output
    #[arg(long)]
    pub compact: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the loaded configuration (password masked)
    Show,

    /// Print the config file path
    Path,

    /// Store the XMPP password in the system keyring
    SetPassword {
        /// Account JID (default: xmpp.jid from config)
        #[arg(long)]
        jid: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
