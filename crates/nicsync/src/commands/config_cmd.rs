//! Config subcommand handlers.

use nicsync_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output::{self, Render};

fn format_config(cfg: &Config) -> String {
    let ignored = if cfg.reconcile.ignored_identifiers.is_empty() {
        "-".to_owned()
    } else {
        cfg.reconcile.ignored_identifiers.join(", ")
    };
    [
        format!("Output:                {}", cfg.defaults.output),
        format!("Color:                 {}", cfg.defaults.color),
        format!("Ignored identifiers:   {ignored}"),
        format!(
            "Protect provisioning:  {}",
            cfg.reconcile.ignore_facts_for_provisioning
        ),
    ]
    .join("\n")
}

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init ────────────────────────────────────────────────────
        ConfigCommand::Init { force } => {
            let path = config::config_path(global);
            if path.exists() && !force {
                return Err(CliError::Validation {
                    field: "config".into(),
                    reason: format!(
                        "{} already exists; pass --force to overwrite it",
                        path.display()
                    ),
                });
            }
            let written = nicsync_config::save_config(&Config::default(), Some(&path))?;
            if !global.quiet {
                eprintln!("✓ Configuration written to {}", written.display());
            }
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let render = Render::resolve(global, &cfg)?;
            let out = output::render_single(render.format, &cfg, format_config, |_| {
                config::config_path(global).display().to_string()
            })?;
            output::print_output(&out, render.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            output::print_output(
                &config::config_path(global).display().to_string(),
                global.quiet,
            );
            Ok(())
        }
    }
}
