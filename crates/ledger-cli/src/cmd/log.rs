use crate::cmd::open_ledger;
use crate::output::{print_json, print_table};
use anyhow::Context;
use ledger_core::log::{LogEntry, LogEvent};
use std::path::Path;

pub fn run(root: &Path, limit: usize, json: bool) -> anyhow::Result<()> {
    let ledger = open_ledger(root)?;
    let entries = ledger
        .log()
        .tail(limit)
        .context("failed to read event log")?;

    if json {
        print_json(&entries)?;
        return Ok(());
    }
    if entries.is_empty() {
        println!("Event log is empty.");
        return Ok(());
    }

    let rows = entries
        .iter()
        .map(|e| {
            vec![
                e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                e.event.action().to_string(),
                e.event.task_id().unwrap_or("-").to_string(),
                detail(e),
            ]
        })
        .collect();
    print_table(&["TIME", "ACTION", "TASK", "DETAIL"], rows);
    Ok(())
}

fn detail(entry: &LogEntry) -> String {
    match &entry.event {
        LogEvent::TaskCreated {
            title,
            agent,
            priority,
            story_points,
            ..
        } => format!("{title} ({agent}, {priority}, {story_points}pt)"),
        LogEvent::SprintStarted { sprint, goal, .. } => format!("sprint {sprint}: {goal}"),
        LogEvent::SprintCompleted {
            sprint,
            completed_points,
            total_points,
            ..
        } => format!("sprint {sprint}: {completed_points}/{total_points} points"),
        LogEvent::MetricsReconciled { before, after } => format!(
            "done {} -> {}, completed_points {} -> {}",
            before.tasks.done, after.tasks.done, before.completed_points, after.completed_points
        ),
        event => match event.transition() {
            Some(t) if t.notes.is_empty() => format!("{} -> {}", t.old_status, t.new_status),
            Some(t) => format!("{} -> {}: {}", t.old_status, t.new_status, t.notes),
            None => String::new(),
        },
    }
}
