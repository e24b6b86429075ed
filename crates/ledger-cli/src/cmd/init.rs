use crate::output::print_json;
use anyhow::Context;
use ledger_core::store::Ledger;
use std::path::Path;

pub fn run(root: &Path, project: Option<&str>, json: bool) -> anyhow::Result<()> {
    let name = match project {
        Some(p) => p.to_string(),
        None => root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("project")
            .to_string(),
    };

    let (ledger, report) = Ledger::init(root, &name).context("failed to initialize ledger")?;

    if json {
        print_json(&serde_json::json!({
            "root": root.display().to_string(),
            "project": ledger.config().project.name,
            "created_config": report.created_config,
            "created_sprint": report.created_sprint,
        }))?;
        return Ok(());
    }

    if !report.created_config && !report.created_sprint {
        println!("Ledger already initialized at {}", root.display());
        return Ok(());
    }
    println!("Initialized ledger for '{}'", ledger.config().project.name);
    println!("  sprint: {}", ledger.sprint_path().display());
    println!("  log:    {}", ledger.log().path().display());
    Ok(())
}
