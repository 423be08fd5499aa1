//! Clap derive structures for the `nicsync` CLI.
//!
//! Defines the command tree, global flags, and shared value enums. Also
//! compiled by `build.rs` for man page generation, so it may only depend
//! on clap and clap_complete.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// nicsync -- keep a host's stored network interfaces in line with discovery
#[derive(Debug, Parser)]
#[command(
    name = "nicsync",
    version,
    about = "Reconcile stored host network interfaces with discovered facts",
    long_about = "Matches discovered interface facts (NICs, bonds, bridges, aliases, BMC)\n\
        against a host's stored interfaces, follows renames, and keeps exactly\n\
        one primary and one provisioning interface.",
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
    #[arg(long, env = "NICSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format [default: from config, else table]
    #[arg(long, short = 'o', env = "NICSYNC_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output [default: from config, else auto]
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

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

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply discovered facts to a host's stored interfaces
    #[command(alias = "sync")]
    Reconcile(ReconcileArgs),

    /// Inspect discovered facts
    Facts(FactsArgs),

    /// Inspect stored interfaces
    #[command(alias = "if")]
    Interfaces(InterfacesArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  RECONCILE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Host state file (`{"interfaces": [...]}`); a missing file is an empty host
    #[arg(long, short = 's')]
    pub state: PathBuf,

    /// Fact file (JSON, or YAML by extension)
    #[arg(long, short = 'f')]
    pub facts: PathBuf,

    /// Facts are a flat agent payload (`interfaces`, `macaddress_<n>`, ...)
    #[arg(long)]
    pub flat: bool,

    /// Save the reconciled interfaces back to the state file
    #[arg(long, short = 'w')]
    pub write: bool,

    /// Extra identifier glob to ignore (repeatable)
    #[arg(long = "ignore", value_name = "GLOB")]
    pub ignore: Vec<String>,

    /// Leave the primary and provisioning interfaces untouched
    #[arg(long)]
    pub protect_provisioning: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  FACTS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct FactsArgs {
    #[command(subcommand)]
    pub command: FactsCommand,
}

#[derive(Debug, Subcommand)]
pub enum FactsCommand {
    /// Parse and normalize a fact file
    Parse {
        /// Fact file (JSON, or YAML by extension)
        file: PathBuf,

        /// Facts are a flat agent payload
        #[arg(long)]
        flat: bool,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  INTERFACES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct InterfacesArgs {
    #[command(subcommand)]
    pub command: InterfacesCommand,
}

#[derive(Debug, Subcommand)]
pub enum InterfacesCommand {
    /// List stored interfaces
    #[command(alias = "ls")]
    List {
        /// Host state file
        #[arg(long, short = 's')]
        state: PathBuf,
    },

    /// Show one interface
    Show {
        /// Interface id, identifier, or MAC address
        interface: String,

        /// Host state file
        #[arg(long, short = 's')]
        state: PathBuf,
    },
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
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display current resolved configuration
    Show,

    /// Print the config file location
    Path,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
