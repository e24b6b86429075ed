use crate::cmd::open_ledger;
use crate::output::{print_json, progress_bar};
use anyhow::Context;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let sprint = open_ledger(root)?.load().context("failed to load sprint")?;
    let summary = sprint.summary();

    if json {
        print_json(&summary)?;
        return Ok(());
    }

    let m = &summary.metrics;
    println!("Sprint {} ({})", summary.sprint, summary.period);
    if !summary.goal.is_empty() {
        println!("Goal: {}", summary.goal);
    }
    if !summary.epic.is_empty() {
        println!("Epic: {}", summary.epic);
    }
    println!(
        "Progress: {} {:.1}% ({}/{} points)",
        progress_bar(summary.percent_complete, 20),
        summary.percent_complete,
        m.completed_points,
        m.total_points
    );
    println!(
        "Tasks: {} total | {} todo | {} in progress | {} done | {} blocked",
        m.tasks.total, m.tasks.todo, m.tasks.in_progress, m.tasks.done, m.tasks.blocked
    );
    Ok(())
}
