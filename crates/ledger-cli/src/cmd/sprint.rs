use crate::cmd::open_ledger;
use crate::output::print_json;
use anyhow::Context;
use chrono::NaiveDate;
use clap::Subcommand;
use ledger_core::metrics::Metrics;
use ledger_core::store::SprintPlan;
use std::path::Path;

#[derive(Subcommand)]
pub enum SprintSubcommand {
    /// Replace the current sprint with a new, empty one
    Start {
        /// Sprint number (default: current + 1)
        number: Option<u32>,
        #[arg(long)]
        goal: String,
        #[arg(long, default_value = "")]
        epic: String,
        /// First day, YYYY-MM-DD
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last day, YYYY-MM-DD
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Start even if the current sprint has unfinished tasks
        #[arg(long)]
        force: bool,
    },
    /// Archive the current sprint and record its velocity
    Complete,
}

pub fn run(root: &Path, subcmd: SprintSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        SprintSubcommand::Start {
            number,
            goal,
            epic,
            start,
            end,
            force,
        } => {
            if let (Some(s), Some(e)) = (start, end) {
                if e < s {
                    anyhow::bail!("sprint end {e} is before start {s}");
                }
            }
            let plan = SprintPlan {
                number,
                goal,
                epic,
                start_date: start,
                end_date: end,
            };
            start_sprint(root, plan, force, json)
        }
        SprintSubcommand::Complete => complete(root, json),
    }
}

fn start_sprint(root: &Path, plan: SprintPlan, force: bool, json: bool) -> anyhow::Result<()> {
    let ledger = open_ledger(root)?;
    let sprint = ledger
        .start_sprint(plan, force)
        .context("failed to start sprint")?;

    if json {
        print_json(&sprint.summary())?;
    } else {
        println!("Started sprint {} ({})", sprint.sprint, sprint.period());
        if !sprint.goal.is_empty() {
            println!("Goal: {}", sprint.goal);
        }
    }
    Ok(())
}

fn complete(root: &Path, json: bool) -> anyhow::Result<()> {
    let ledger = open_ledger(root)?;
    let (sprint, archive) = ledger
        .complete_sprint()
        .context("failed to complete sprint")?;
    let metrics = Metrics::compute(&sprint.tasks);

    if json {
        print_json(&serde_json::json!({
            "sprint": sprint.sprint,
            "archive": archive.display().to_string(),
            "completed_points": metrics.completed_points,
            "total_points": metrics.total_points,
            "open_tasks": sprint.open_tasks(),
        }))?;
        return Ok(());
    }

    println!(
        "Completed sprint {}: {}/{} points done",
        sprint.sprint, metrics.completed_points, metrics.total_points
    );
    if sprint.open_tasks() > 0 {
        println!(
            "{} task(s) unfinished; they stay in the document until the next 'scrum sprint start --force'",
            sprint.open_tasks()
        );
    }
    println!("Archived to {}", archive.display());
    Ok(())
}
