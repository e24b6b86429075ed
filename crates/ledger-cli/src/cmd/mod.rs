pub mod config;
pub mod init;
pub mod log;
pub mod rebuild;
pub mod sprint;
pub mod status;
pub mod task;
pub mod validate;

use anyhow::Context;
use ledger_core::store::Ledger;
use std::path::Path;

/// Open the ledger at `root`, failing early with a hint if it was never initialized.
pub fn open_ledger(root: &Path) -> anyhow::Result<Ledger> {
    let ledger = Ledger::open(root).context("failed to load .scrum/config.yaml")?;
    if !ledger.is_initialized() {
        anyhow::bail!(
            "no sprint document at {}: run 'scrum init'",
            ledger.sprint_path().display()
        );
    }
    Ok(ledger)
}
