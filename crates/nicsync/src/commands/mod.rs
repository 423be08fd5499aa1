//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod config_cmd;
pub mod facts;
pub mod interfaces;
pub mod reconcile;
pub mod util;

use nicsync_config::Config;

use crate::cli::Command;
use crate::error::CliError;
use crate::output::Render;

/// Dispatch a command that works on state or fact files.
pub fn dispatch(cmd: &Command, cfg: &Config, render: &Render) -> Result<(), CliError> {
    match cmd {
        Command::Reconcile(args) => reconcile::handle(args, cfg, render),
        Command::Facts(args) => facts::handle(args, render),
        Command::Interfaces(args) => interfaces::handle(args, render),
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
