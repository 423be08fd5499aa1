//! Stored interface inspection handlers.

use std::sync::Arc;

use tabled::Tabled;

use nicsync_core::{Interface, MemoryStore};

use crate::cli::{InterfacesArgs, InterfacesCommand};
use crate::error::CliError;
use crate::output::{self, Render};

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct InterfaceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Identifier")]
    identifier: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Attached To")]
    attached_to: String,
    #[tabled(rename = "Flags")]
    flags: String,
}

/// `P` primary, `B` provision (boot), `-` link down.
fn flags(i: &Interface) -> String {
    let mut flags = String::new();
    if i.attrs.primary {
        flags.push('P');
    }
    if i.attrs.provision {
        flags.push('B');
    }
    if !i.attrs.link {
        flags.push('-');
    }
    flags
}

impl From<&Arc<Interface>> for InterfaceRow {
    fn from(i: &Arc<Interface>) -> Self {
        Self {
            id: i.id.to_string(),
            identifier: i.attrs.identifier.clone(),
            kind: i.attrs.kind.to_string(),
            mac: i.attrs.mac.as_ref().map(ToString::to_string).unwrap_or_default(),
            ip: i.attrs.ip.map(|ip| ip.to_string()).unwrap_or_default(),
            attached_to: i.attrs.attached_to.clone().unwrap_or_default(),
            flags: flags(i),
        }
    }
}

fn detail(i: &Arc<Interface>) -> String {
    let or_dash = |s: Option<String>| s.unwrap_or_else(|| "-".into());
    [
        format!("ID:          {}", i.id),
        format!("Identifier:  {}", i.attrs.label()),
        format!("Type:        {}", i.attrs.kind),
        format!("MAC:         {}", or_dash(i.attrs.mac.as_ref().map(ToString::to_string))),
        format!("IP:          {}", or_dash(i.attrs.ip.map(|ip| ip.to_string()))),
        format!("IPv6:        {}", or_dash(i.attrs.ip6.map(|ip| ip.to_string()))),
        format!("Virtual:     {}", i.attrs.is_virtual),
        format!("Attached To: {}", or_dash(i.attrs.attached_to.clone())),
        format!("Primary:     {}", i.attrs.primary),
        format!("Provision:   {}", i.attrs.provision),
        format!("Link:        {}", if i.attrs.link { "up" } else { "down" }),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &InterfacesArgs, render: &Render) -> Result<(), CliError> {
    match &args.command {
        InterfacesCommand::List { state } => {
            let store = MemoryStore::from_interfaces(util::read_state(state, false)?.interfaces);
            let snapshot = store.snapshot();
            let out = output::render_list(
                render.format,
                snapshot.as_slice(),
                |i| InterfaceRow::from(i),
                |i| i.attrs.label(),
            )?;
            output::print_output(&out, render.quiet);
            Ok(())
        }
        InterfacesCommand::Show { interface, state } => {
            let store = MemoryStore::from_interfaces(util::read_state(state, false)?.interfaces);
            let found = util::find_interface(&store, interface)?;
            let out = output::render_single(render.format, &found, detail, |i| i.id.to_string())?;
            output::print_output(&out, render.quiet);
            Ok(())
        }
    }
}
