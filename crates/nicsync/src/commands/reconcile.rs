//! Reconcile command handler.

use tabled::Tabled;
use tracing::info;

use nicsync_config::Config;
use nicsync_core::{Change, InterfaceId, MemoryStore, ReconciliationResult, Reconciler};

use crate::cli::ReconcileArgs;
use crate::config;
use crate::error::CliError;
use crate::output::{self, Render};

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Identifier")]
    identifier: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Fields")]
    fields: String,
    #[tabled(rename = "Fact")]
    fact: String,
}

fn row(change: &Change, color: bool) -> ChangeRow {
    ChangeRow {
        id: change.id.to_string(),
        identifier: change.identifier.clone(),
        action: output::paint_action(change.action, color),
        fields: change.fields.join(", "),
        fact: change.fact.clone().unwrap_or_else(|| "-".into()),
    }
}

fn detail(result: &ReconciliationResult, color: bool) -> String {
    if result.is_noop() {
        return "No changes.".into();
    }
    let rows: Vec<ChangeRow> = result.changes.iter().map(|c| row(c, color)).collect();
    let flag = |id: Option<InterfaceId>| id.map_or_else(|| "-".into(), |id| id.to_string());
    format!(
        "{}\nPrimary:   {}\nProvision: {}",
        output::render_table(&rows),
        flag(result.primary),
        flag(result.provision)
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &ReconcileArgs, cfg: &Config, render: &Render) -> Result<(), CliError> {
    let reconciler = Reconciler::new(config::reconcile_options(cfg, args))?;
    let state = util::read_state(&args.state, true)?;
    let facts = util::read_facts(&args.facts, args.flat)?;

    let store = MemoryStore::from_interfaces(state.interfaces);
    let result = reconciler.reconcile(&store, &facts)?;

    report_dropped(&result, render);

    let out = output::render_single(
        render.format,
        &result,
        |r| detail(r, render.color),
        |r| {
            r.changes
                .iter()
                .map(|c| format!("{} {}", c.id, c.action))
                .collect::<Vec<_>>()
                .join("\n")
        },
    )?;
    output::print_output(&out, render.quiet);

    if result.is_noop() {
        return Ok(());
    }
    if args.write {
        let written = util::write_state(&args.state, &store)?;
        info!(path = %args.state.display(), interfaces = written, "state saved");
        if !render.quiet {
            eprintln!("✓ Wrote {written} interfaces to {}", args.state.display());
        }
    } else if !render.quiet {
        eprintln!("Preview only; pass --write to save these changes.");
    }
    Ok(())
}

/// Rejected and skipped facts go to stderr so stdout stays parseable.
fn report_dropped(result: &ReconciliationResult, render: &Render) {
    if render.quiet {
        return;
    }
    for rejected in &result.rejected {
        let line = format!(
            "! rejected fact '{}' ({}): {}",
            rejected.name, rejected.field, rejected.reason
        );
        eprintln!("{}", output::paint_warning(&line, render.color));
    }
    if !result.skipped.is_empty() {
        eprintln!("Skipped: {}", result.skipped.join(", "));
    }
}
