//! Fact inspection handlers.

use serde::Serialize;
use tabled::Tabled;

use nicsync_core::{Fact, FactSet};

use crate::cli::{FactsArgs, FactsCommand};
use crate::error::CliError;
use crate::output::{self, Render};

use super::util;

/// Normalized view of a fact file.
#[derive(Serialize)]
struct Normalized {
    interfaces: Vec<Fact>,
    ipmi: Option<Fact>,
    suggested_primary: Option<String>,
    invalid: Vec<Invalid>,
}

#[derive(Serialize)]
struct Invalid {
    name: String,
    error: String,
}

#[derive(Tabled)]
struct FactRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Identifier")]
    identifier: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "IPv6")]
    ip6: String,
    #[tabled(rename = "Attached To")]
    attached_to: String,
}

impl FactRow {
    fn new(fact: &Fact, suggested: Option<&str>) -> Self {
        let marker = if suggested == Some(fact.name.as_str()) { " *" } else { "" };
        Self {
            name: format!("{}{marker}", fact.name),
            identifier: fact.identifier.clone(),
            kind: fact.kind.to_string(),
            mac: fact.mac.as_ref().map(ToString::to_string).unwrap_or_default(),
            ip: fact.ip.map(|ip| ip.to_string()).unwrap_or_default(),
            ip6: fact.ip6.map(|ip| ip.to_string()).unwrap_or_default(),
            attached_to: fact.attached_to.clone().unwrap_or_default(),
        }
    }
}

fn normalize(facts: &FactSet) -> Normalized {
    let mut interfaces = Vec::new();
    let mut invalid = Vec::new();
    for (name, record) in &facts.interfaces {
        match record.normalize(name) {
            Ok(fact) => interfaces.push(fact),
            Err(e) => invalid.push(Invalid {
                name: name.clone(),
                error: e.to_string(),
            }),
        }
    }
    let ipmi = facts.bmc_record().and_then(|r| match r.normalize_bmc() {
        Ok(fact) => Some(fact),
        Err(e) => {
            invalid.push(Invalid {
                name: "ipmi".into(),
                error: e.to_string(),
            });
            None
        }
    });
    Normalized {
        interfaces,
        ipmi,
        suggested_primary: facts.suggested_primary.as_ref().map(|s| s.name.clone()),
        invalid,
    }
}

fn detail(n: &Normalized) -> String {
    let suggested = n.suggested_primary.as_deref();
    let rows: Vec<FactRow> = n
        .interfaces
        .iter()
        .chain(&n.ipmi)
        .map(|f| FactRow::new(f, suggested))
        .collect();
    let mut lines = vec![output::render_table(&rows)];
    if suggested.is_some() {
        lines.push("* suggested primary".into());
    }
    lines.extend(n.invalid.iter().map(|i| format!("invalid {}: {}", i.name, i.error)));
    lines.join("\n")
}

pub fn handle(args: &FactsArgs, render: &Render) -> Result<(), CliError> {
    match &args.command {
        FactsCommand::Parse { file, flat } => {
            let facts = util::read_facts(file, *flat)?;
            let normalized = normalize(&facts);
            let out = output::render_single(render.format, &normalized, detail, |n| {
                n.interfaces
                    .iter()
                    .map(|f| f.identifier.clone())
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
            output::print_output(&out, render.quiet);
            Ok(())
        }
    }
}
