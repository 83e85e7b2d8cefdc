//! Clap derive structures for the `maasly` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.
//! Model names stay plain strings here and are resolved at dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// maasly -- live collections from a MAAS-style server
#[derive(Debug, Parser)]
#[command(
    name = "maasly",
    version,
    about = "Manage MAAS-style infrastructure servers from the command line",
    long_about = "A CLI for administering MAAS-style infrastructure servers.\n\n\
        Talks to the server over its WebSocket request/notification protocol,\n\
        so `watch` sees changes made by any client as they happen.",
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
    /// Server profile to use
    #[arg(long, short = 'p', env = "MAASLY_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Server URL including its path, e.g. http://maas:5240/MAAS (overrides profile)
    #[arg(long, short = 's', env = "MAASLY_SERVER", global = true)]
    pub server: Option<String>,

    /// Username for password login (overrides profile)
    #[arg(long, short = 'u', env = "MAASLY_USERNAME", global = true)]
    pub username: Option<String>,

    /// Existing session cookie header (skips login)
    #[arg(long, env = "MAASLY_COOKIE", global = true, hide_env_values = true)]
    pub cookie: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "MAASLY_OUTPUT",
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

    /// Log line format on stderr
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "MAASLY_INSECURE", global = true)]
    pub insecure: bool,

    /// Login and connect timeout in seconds
    #[arg(long, env = "MAASLY_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long, env = "MAASLY_REQUEST_TIMEOUT", global = true)]
    pub request_timeout: Option<u64>,
}

// ── Output, Color & Log Enums ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the models this client synchronizes
    Models,

    /// Fetch a model's collection
    #[command(alias = "ls")]
    List(ListArgs),

    /// Fetch one entity by primary key
    Get {
        /// Model name (e.g. machine, zone, tag)
        model: String,

        /// Primary key (id, system_id or name, depending on the model)
        key: String,
    },

    /// Create an entity
    Create {
        /// Model name
        model: String,

        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// Update an entity
    Update {
        /// Model name
        model: String,

        /// Primary key of the entity to update
        key: String,

        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// Delete an entity
    #[command(alias = "rm")]
    Delete {
        /// Model name
        model: String,

        /// Primary key of the entity to delete
        key: String,
    },

    /// Call a model-specific method (e.g. `action machine action`)
    Action {
        /// Model name
        model: String,

        /// Method name (see `maasly models`)
        method: String,

        /// Primary key of the target entity, merged into the parameters
        #[arg(long, short = 'K')]
        key: Option<String>,

        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// Stream a collection as the server pushes changes
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Arguments ─────────────────────────────────────────────────

/// Snapshot filtering shared by `list` and `watch`.
#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Keep entities whose field equals a value (`field=value`, repeatable)
    #[arg(long = "filter", short = 'f', value_name = "FIELD=VALUE")]
    pub filters: Vec<String>,

    /// Case-insensitive substring search over string and number fields
    #[arg(long, short = 'S')]
    pub search: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Model name
    pub model: String,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Max entities to print
    #[arg(long, short = 'l')]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Model name
    pub model: String,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Exit after this many changes
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

/// Request parameters, from inline JSON, a file, or `key=value` pairs.
#[derive(Debug, Args)]
pub struct PayloadArgs {
    /// Parameters as a JSON object
    #[arg(long, short = 'd', conflicts_with = "from_file")]
    pub data: Option<String>,

    /// Read parameters from a JSON file
    #[arg(long, short = 'F')]
    pub from_file: Option<PathBuf>,

    /// Set one parameter (`key=value`, repeatable; applied last)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (secrets masked)
    Show,

    /// Set a value on the active profile
    Set {
        /// Profile key (server, auth_mode, username, password_env, ca_cert, insecure, timeout, request_timeout)
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a password (or session cookie) in the system keyring
    SetPassword {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
