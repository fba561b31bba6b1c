#![forbid(unsafe_code)]

//! Human readable renderings of the registry, a compiled plan and a run summary.

use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use console::style;
use interop_core::{Registry, ROLE_CLIENT, ROLE_RELAY};
use interop_plan::{Availability, Plan};
use interop_report::{RunStatus, RunSummary, Totals};

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(header);
    table
}

pub fn registry_table(registry: &Registry) -> Table {
    let mut t = table(vec!["ID", "Name", "Organization", "Drafts", "Client", "Relay"]);
    for imp in registry.implementations.values() {
        let drafts: Vec<String> = imp.draft_versions.iter().map(ToString::to_string).collect();
        let relay = imp
            .role(ROLE_RELAY)
            .map(|role| {
                let mut parts: Vec<String> = role.docker.iter().map(|d| format!("docker {}", d.image)).collect();
                parts.extend(
                    role.remote
                        .iter()
                        .map(|ep| format!("{} {} ({})", ep.transport, ep.url, ep.status.as_str())),
                );
                parts.join("\n")
            })
            .unwrap_or_default();
        t.add_row(vec![
            imp.id.clone(),
            imp.name.clone(),
            imp.organization.clone(),
            drafts.join(", "),
            imp.docker_image(ROLE_CLIENT).unwrap_or("-").to_string(),
            relay,
        ]);
    }
    t
}

pub fn plan_table(plan: &Plan) -> Table {
    let mut t = table(vec!["#", "Client", "Relay", "Version", "Class", "Mode", "Target", "State"]);
    for e in plan.entries() {
        let state = match &e.availability {
            Availability::Runnable => Cell::new("runnable").fg(Color::Green),
            Availability::Unavailable { reason } => Cell::new(format!("skip: {reason}")).fg(Color::Yellow),
        };
        t.add_row(vec![
            Cell::new(e.index),
            Cell::new(&e.client),
            Cell::new(&e.relay),
            Cell::new(&e.version),
            Cell::new(e.classification),
            Cell::new(e.mode),
            Cell::new(&e.target),
            state,
        ]);
    }
    t
}

pub fn summary_table(summary: &RunSummary) -> Table {
    let mut t = table(vec!["#", "Client", "Relay", "Mode", "Status", "Tests", "Detail"]);
    for r in &summary.runs {
        let status = match r.status {
            RunStatus::Pass => Cell::new("pass").fg(Color::Green),
            RunStatus::Fail => Cell::new("fail").fg(Color::Red),
            RunStatus::Skip => Cell::new("skip").fg(Color::Yellow),
        };
        let detail = r.reason.as_deref().or(r.skip_reason.as_deref()).unwrap_or_default();
        t.add_row(vec![
            Cell::new(r.index),
            Cell::new(&r.client),
            Cell::new(&r.relay),
            Cell::new(r.mode),
            status,
            Cell::new(format!("{}/{}", r.passed, r.total)),
            Cell::new(detail),
        ]);
    }
    t
}

/// Final one-line tally.
pub fn totals_line(totals: &Totals) -> String {
    let line = totals.to_string();
    if totals.failed > 0 {
        style(line).red().bold().to_string()
    } else {
        style(line).green().bold().to_string()
    }
}
