use crate::output::print_json;
use anyhow::Context;
use ledger_core::config::WarnLevel;
use ledger_core::sprint::{ReconcileReport, Sprint};
use ledger_core::store::Ledger;
use ledger_core::LedgerError;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize, Default)]
struct Report {
    problems: Vec<String>,
    warnings: Vec<String>,
    metrics: Option<ReconcileReport>,
}

/// Check both ledger files, then reconcile metrics.
///
/// Unparseable files and duplicate task ids are failures (non-zero exit).
/// Metric drift is repaired and reported, not a failure.
pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let ledger = Ledger::open(root).context("failed to load .scrum/config.yaml")?;
    let mut report = Report::default();

    for w in ledger.config().validate() {
        match w.level {
            WarnLevel::Error => report.problems.push(format!("config: {}", w.message)),
            WarnLevel::Warning => report.warnings.push(format!("config: {}", w.message)),
        }
    }

    let document_ok = match Sprint::load(&ledger.sprint_path()) {
        Ok(sprint) => {
            for id in sprint.duplicate_ids() {
                report.problems.push(format!("duplicate task id {id}"));
            }
            true
        }
        Err(LedgerError::NotInitialized) => {
            anyhow::bail!("no sprint document at {}: run 'scrum init'", ledger.sprint_path().display())
        }
        Err(e) => {
            report.problems.push(e.to_string());
            false
        }
    };

    let scan = ledger.log().scan().context("failed to read event log")?;
    for line in &scan.malformed {
        report
            .problems
            .push(format!("event log line {line} is not valid JSON"));
    }
    for line in &scan.unrecognized {
        report
            .warnings
            .push(format!("event log line {line} has an unrecognized action"));
    }

    if document_ok {
        report.metrics = Some(ledger.reconcile().context("failed to reconcile metrics")?);
    }

    if json {
        print_json(&report)?;
    } else {
        print_human(&report, ledger.log().path(), scan.entries.len());
    }

    if !report.problems.is_empty() {
        anyhow::bail!("validation failed with {} problem(s)", report.problems.len());
    }
    Ok(())
}

fn print_human(report: &Report, log_path: &Path, log_entries: usize) {
    for p in &report.problems {
        println!("[error] {p}");
    }
    for w in &report.warnings {
        println!("[warning] {w}");
    }
    println!("Event log: {log_entries} entries in {}", log_path.display());

    let Some(metrics) = &report.metrics else {
        return;
    };
    if !metrics.drifted {
        println!("Metrics consistent with tasks.");
        return;
    }
    println!("Metrics repaired:");
    let (b, a) = (&metrics.before, &metrics.after);
    let fields = [
        ("total_points", b.total_points, a.total_points),
        ("completed_points", b.completed_points, a.completed_points),
        ("tasks.total", b.tasks.total, a.tasks.total),
        ("tasks.todo", b.tasks.todo, a.tasks.todo),
        ("tasks.in_progress", b.tasks.in_progress, a.tasks.in_progress),
        ("tasks.done", b.tasks.done, a.tasks.done),
        ("tasks.blocked", b.tasks.blocked, a.tasks.blocked),
    ];
    for (name, before, after) in fields {
        if before != after {
            println!("  {name}: {before} -> {after}");
        }
    }
}
