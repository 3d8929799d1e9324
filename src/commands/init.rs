use crate::ui;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

const TEMPLATE: &str = include_str!("../../templates/rigup.toml");

pub fn execute(manifest_path: &Path, force: bool) -> Result<()> {
    if manifest_path.exists() && !force {
        bail!(
            "Manifest {:?} already exists (use --force to overwrite)",
            manifest_path
        );
    }

    fs::write(manifest_path, TEMPLATE)
        .with_context(|| format!("Failed to write template manifest {:?}", manifest_path))?;

    ui::success(
        "Created",
        format!(
            "{} - edit the pins, then run `rigup plan`.",
            manifest_path.display()
        ),
    );
    Ok(())
}
