use crate::cmd::open_ledger;
use crate::output::{format_time, print_json, print_tasks};
use anyhow::Context;
use ledger_core::task::{NewTask, Task};
use ledger_core::types::{Priority, TaskStatus};
use std::path::Path;

pub struct CreateArgs {
    pub title: String,
    pub agent: String,
    pub priority: Option<Priority>,
    pub points: Option<u32>,
    pub context: Option<String>,
    pub criteria: Vec<String>,
    pub depends: Vec<String>,
}

pub fn create(root: &Path, args: CreateArgs, json: bool) -> anyhow::Result<()> {
    let ledger = open_ledger(root)?;
    let defaults = &ledger.config().defaults;

    let mut spec = NewTask::new(args.title, args.agent)
        .priority(args.priority.unwrap_or(defaults.priority))
        .story_points(args.points.unwrap_or(defaults.story_points));
    spec.context = args.context;
    spec.acceptance_criteria = args.criteria;
    spec.dependencies = args
        .depends
        .into_iter()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect();

    let title = spec.title.clone();
    let id = ledger.create_task(spec).context("failed to create task")?;

    if json {
        let sprint = ledger.load()?;
        print_json(sprint.task(&id)?)?;
    } else {
        println!("Created task [{id}]: {title}");
    }
    Ok(())
}

pub fn update(
    root: &Path,
    task_id: &str,
    status: TaskStatus,
    notes: &str,
    json: bool,
) -> anyhow::Result<()> {
    let ledger = open_ledger(root)?;
    let change = ledger
        .update_status(task_id, status, notes)
        .with_context(|| format!("failed to update task '{task_id}'"))?;

    if json {
        print_json(&serde_json::json!({
            "task_id": task_id,
            "old_status": change.old,
            "new_status": change.new,
            "notes": notes,
        }))?;
    } else if change.is_noop() {
        println!("Task [{task_id}] already {}; notes updated", change.new);
    } else {
        println!("Task [{task_id}]: {} -> {}", change.old, change.new);
    }
    Ok(())
}

pub fn list(root: &Path, status: Option<TaskStatus>, json: bool) -> anyhow::Result<()> {
    let sprint = open_ledger(root)?.load().context("failed to load sprint")?;
    let tasks: Vec<&Task> = sprint.list_tasks(status).collect();

    if json {
        print_json(&tasks)?;
        return Ok(());
    }
    if tasks.is_empty() {
        match status {
            Some(s) => println!("No {s} tasks in sprint {}.", sprint.sprint),
            None => println!("No tasks in sprint {}.", sprint.sprint),
        }
        return Ok(());
    }
    print_tasks(&tasks);
    Ok(())
}

pub fn by_agent(root: &Path, agent: &str, json: bool) -> anyhow::Result<()> {
    let sprint = open_ledger(root)?.load().context("failed to load sprint")?;
    let tasks: Vec<&Task> = sprint.tasks_by_agent(agent).collect();

    if json {
        print_json(&tasks)?;
        return Ok(());
    }
    if tasks.is_empty() {
        println!("No tasks for agent '{agent}'.");
        return Ok(());
    }
    let points: u64 = tasks.iter().map(|t| u64::from(t.story_points)).sum();
    println!("{agent}: {} task(s), {points} point(s)", tasks.len());
    println!();
    print_tasks(&tasks);
    Ok(())
}

pub fn details(root: &Path, task_id: &str, json: bool) -> anyhow::Result<()> {
    let sprint = open_ledger(root)?.load().context("failed to load sprint")?;
    let task = sprint.task(task_id)?;

    if json {
        print_json(task)?;
        return Ok(());
    }

    println!("Task: {}", task.id);
    println!("Title:        {}", task.title);
    println!("Agent:        {}", task.agent);
    println!("Status:       {}", task.status);
    println!("Priority:     {}", task.priority);
    println!("Points:       {}", task.story_points);
    println!("Created:      {}", format_time(Some(task.created_at)));
    println!("Started:      {}", format_time(task.started_at));
    println!("Completed:    {}", format_time(task.completed_at));
    if let Some(context) = task.context.as_deref().filter(|c| !c.is_empty()) {
        println!("Context:      {context}");
    }
    if !task.dependencies.is_empty() {
        println!("Depends on:   {}", task.dependencies.join(", "));
    }
    if !task.acceptance_criteria.is_empty() {
        println!("Acceptance criteria:");
        for criterion in &task.acceptance_criteria {
            println!("  - {criterion}");
        }
    }
    println!(
        "Notes:        {}",
        if task.notes.is_empty() { "(none)" } else { task.notes.as_str() }
    );
    Ok(())
}
