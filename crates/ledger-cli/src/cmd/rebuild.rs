use crate::cmd::open_ledger;
use crate::output::{print_json, print_table};
use anyhow::Context;
use ledger_core::replay::{diff, replay};
use std::path::Path;

pub fn run(root: &Path, write: bool, json: bool) -> anyhow::Result<()> {
    let ledger = open_ledger(root)?;
    let stored = ledger.load().context("failed to load sprint")?;
    let scan = ledger.log().scan().context("failed to read event log")?;
    if !scan.malformed.is_empty() {
        anyhow::bail!(
            "event log has {} malformed line(s); run 'scrum validate' for details",
            scan.malformed.len()
        );
    }

    let replayed = replay(&scan.entries, &stored);
    let diffs = diff(&stored, &replayed.sprint);
    let written = write && !diffs.is_empty();
    if written {
        ledger
            .replace_tasks(replayed.sprint.clone())
            .context("failed to write rebuilt sprint")?;
    }

    if json {
        print_json(&serde_json::json!({
            "differences": diffs,
            "orphaned": replayed.orphaned,
            "out_of_order": replayed.out_of_order,
            "metrics": replayed.sprint.metrics,
            "written": written,
        }))?;
        return Ok(());
    }

    for id in &replayed.orphaned {
        println!("[warning] log transition for {id}, which was never created this sprint");
    }
    for id in &replayed.out_of_order {
        println!("[warning] {id} has a transition whose old status does not match the log");
    }
    if diffs.is_empty() {
        println!(
            "Document matches the event log ({} task(s)).",
            replayed.sprint.tasks.len()
        );
        return Ok(());
    }

    let rows = diffs
        .iter()
        .map(|d| vec![d.task_id.clone(), d.problem.clone()])
        .collect();
    print_table(&["TASK", "DIFFERENCE"], rows);
    if written {
        println!("Replaced tasks and metrics with the log projection.");
    } else {
        println!("Run 'scrum rebuild --write' to replace the document's tasks with the log projection.");
    }
    Ok(())
}
