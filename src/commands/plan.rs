use crate::engine::{Engine, StepStatus};
use crate::fetch::HttpFetcher;
use crate::runner::SystemRunner;
use crate::statefile::StateFile;
use crate::ui;
use anyhow::Result;
use std::path::Path;

pub fn execute(manifest_path: &Path) -> Result<()> {
    let manifest = super::load_valid_manifest(manifest_path)?;

    let runner = SystemRunner::new();
    let fetcher = HttpFetcher::new()?;
    let state_path = StateFile::default_path()?;

    let engine = Engine::new(&manifest, &runner, &fetcher, state_path);
    let entries = engine.plan()?;

    let mut pending = 0usize;
    for entry in &entries {
        match entry.status {
            StepStatus::Satisfied => ui::success("ok", format!("{:12} {}", entry.id, entry.summary)),
            StepStatus::Pending => {
                pending += 1;
                ui::status("pending", format!("{:12} {}", entry.id, entry.summary));
            }
        }
    }

    if pending == 0 {
        ui::info("Nothing to do; every step is satisfied.");
    } else {
        ui::info(format!("{pending} step(s) pending; run `rigup apply`."));
    }
    Ok(())
}
