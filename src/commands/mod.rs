use crate::cli::{Cli, Commands};
use crate::manifest::Manifest;
use crate::ui;
use anyhow::{bail, Result};
use std::path::Path;

mod apply;
mod check;
mod env;
mod init;
mod plan;
mod status;
mod verify;

pub fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { force } => init::execute(&cli.manifest, force),

        Commands::Check => check::execute(&cli.manifest),

        Commands::Plan => plan::execute(&cli.manifest),

        Commands::Apply => apply::execute(&cli.manifest),

        Commands::Status => status::execute(),

        Commands::Env { shell } => env::execute(&cli.manifest, &shell),

        Commands::Verify => verify::execute(&cli.manifest),
    }
}

/// Load a manifest and refuse to proceed when validation finds issues.
pub(crate) fn load_valid_manifest(path: &Path) -> Result<Manifest> {
    if !path.exists() {
        bail!(
            "Manifest {:?} not found (run `rigup init` to create one)",
            path
        );
    }

    let manifest = Manifest::load(path)?;

    let issues = manifest.validate();
    if !issues.is_empty() {
        for issue in &issues {
            ui::error(format!("{}: {}", issue.field, issue.message));
        }
        bail!("Manifest validation failed ({} issue(s)).", issues.len());
    }

    Ok(manifest)
}
