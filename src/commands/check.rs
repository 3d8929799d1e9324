use crate::ui;
use anyhow::Result;
use std::path::Path;

pub fn execute(manifest_path: &Path) -> Result<()> {
    let manifest = super::load_valid_manifest(manifest_path)?;

    ui::success(
        "Check",
        format!(
            "Manifest {} is valid ({} {}, toolkit {} {}, interpreter {}).",
            manifest_path.display(),
            manifest.base.os,
            manifest.base.release,
            manifest.toolkit.package,
            manifest.toolkit.version,
            manifest.interpreter.version
        ),
    );
    Ok(())
}
