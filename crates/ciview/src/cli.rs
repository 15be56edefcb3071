//! Clap derive structures for the `ciview` CLI.
//!
//! Defines the command tree, global flags, and shared value types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ciview -- inspect and drive MIDI-CI devices from the command line
#[derive(Debug, Parser)]
#[command(
    name = "ciview",
    version,
    about = "Inspect and control MIDI-CI devices from the command line",
    long_about = "Discover MIDI-CI responders, toggle profiles, subscribe to properties\n\
        and follow the transport log.\n\n\
        Runs against the built-in mock protocol engine.",
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
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "CIVIEW_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CIVIEW_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Delay before the mock engine confirms a request (overrides config)
    #[arg(long, env = "CIVIEW_DELAY_MS", global = true)]
    pub delay_ms: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a discovery inquiry and list responders
    #[command(alias = "disc")]
    Discover,

    /// List discovered connections, or show one in detail
    #[command(alias = "conn", alias = "c")]
    Connections(ConnectionsArgs),

    /// List profiles across all connections
    #[command(alias = "prof")]
    Profiles,

    /// List property values across all connections
    #[command(alias = "props")]
    Properties,

    /// Enable or disable a profile
    SetProfile(SetProfileArgs),

    /// Subscribe to a property and wait for confirmation
    #[command(alias = "sub")]
    Subscribe(SubscribeArgs),

    /// Cancel a property subscription
    #[command(alias = "unsub")]
    Unsubscribe(UnsubscribeArgs),

    /// Show or clear the transport log
    Logs(LogsArgs),

    /// List and select MIDI endpoints
    #[command(alias = "dev")]
    Devices(DevicesArgs),

    /// Stream change notifications for a while
    Watch(WatchArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Connections ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConnectionsArgs {
    /// Target MUID (hex `0x87654321` or decimal); omit to list all
    pub target: Option<String>,
}

// ── Profiles ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SetProfileArgs {
    /// Profile id as 5 hex bytes, e.g. "7E 00 01 02 03" or 7E00010203
    pub profile_id: String,

    /// UMP group (0-255) or '*' for any
    #[arg(long, short = 'g', default_value = "0")]
    pub group: String,

    /// Address: 0x00-0x7D channel, 0x7E group, 0x7F function block
    #[arg(long, short = 'a', default_value = "0x7F")]
    pub address: String,

    /// Number of channels requested (0-16)
    #[arg(long, default_value_t = 0)]
    pub channels: u16,

    /// Disable the profile instead of enabling it
    #[arg(long)]
    pub disable: bool,
}

// ── Properties ───────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SubscribeArgs {
    /// Property resource id
    pub property_id: String,

    /// Mutual encoding to request (e.g. "Mcoded7")
    #[arg(long, short = 'e')]
    pub encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct UnsubscribeArgs {
    /// Property resource id
    pub property_id: String,
}

// ── Logs ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LogsArgs {
    /// Clear the log instead of printing it
    #[arg(long)]
    pub clear: bool,

    /// Only show the newest N entries
    #[arg(long, short = 'n')]
    pub tail: Option<usize>,
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List available input and output endpoints
    #[command(alias = "ls")]
    List,

    /// Select input and/or output endpoints
    Select {
        /// Input endpoint id
        #[arg(long = "in", short = 'i')]
        input: Option<String>,

        /// Output endpoint id
        #[arg(long = "out", short = 'O')]
        output_device: Option<String>,
    },
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// How long to stream notifications
    #[arg(long, default_value_t = 1000)]
    pub duration_ms: u64,

    /// Also subscribe to this property after discovery
    #[arg(long, short = 's')]
    pub subscribe: Option<String>,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
