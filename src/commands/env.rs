use crate::environment::{Environment, Shell};
use anyhow::Result;
use std::path::Path;

pub fn execute(manifest_path: &Path, shell: &str) -> Result<()> {
    let manifest = super::load_valid_manifest(manifest_path)?;

    let parsed = Shell::from_name(shell);
    let fallback = Shell::Bash;
    if parsed.is_none() {
        eprintln!(
            "Unknown shell '{}'; defaulting to {}.",
            shell,
            fallback.as_str()
        );
    }
    let shell = parsed.unwrap_or(fallback);

    let environment = Environment::from_manifest(&manifest)?;
    println!("{}", environment.format_for_shell(shell));

    Ok(())
}
