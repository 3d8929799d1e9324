use crate::engine::Engine;
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
    let report = engine.apply()?;

    ui::success(
        "Done",
        format!(
            "{} step(s) applied, {} already satisfied. Run 'exec $SHELL' to load the environment.",
            report.applied, report.skipped
        ),
    );
    Ok(())
}
