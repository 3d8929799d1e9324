use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::engine::{Step, StepContext, StepOutcome};
use crate::fetch::{artifact_name, format_digest};

/// Installs the interpreter version manager from its fixed installer URL.
pub(crate) struct InstallManager;

impl Step for InstallManager {
    fn id(&self) -> &'static str {
        "pyenv"
    }

    fn summary(&self, ctx: &StepContext<'_>) -> String {
        format!(
            "install version manager from {}",
            ctx.manifest.interpreter.installer_url
        )
    }

    fn is_applied(&self, ctx: &StepContext<'_>) -> Result<bool> {
        Ok(ctx.manifest.interpreter.manager_bin()?.exists())
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let url = &ctx.manifest.interpreter.installer_url;
        let script = env::temp_dir().join(artifact_name(url, "install-manager.sh"));

        let digest = ctx
            .fetcher
            .fetch(url, &script)
            .with_context(|| format!("Failed to download version-manager installer from {url}"))?;

        let script_arg = script.display().to_string();
        ctx.runner
            .run("bash", &[&script_arg])
            .context("Failed to run the version-manager installer")?;

        fs::remove_file(&script)
            .with_context(|| format!("Failed to remove installer script {:?}", script))?;

        Ok(StepOutcome::with_digest(
            format!("version manager installed from {url}"),
            format_digest(&digest),
        ))
    }
}

/// Installs the pinned interpreter version and designates it the default.
pub(crate) struct InstallInterpreter;

impl Step for InstallInterpreter {
    fn id(&self) -> &'static str {
        "python"
    }

    fn summary(&self, ctx: &StepContext<'_>) -> String {
        format!("install interpreter {}", ctx.manifest.interpreter.version)
    }

    fn is_applied(&self, ctx: &StepContext<'_>) -> Result<bool> {
        let manager = ctx.manifest.interpreter.manager_bin()?;
        let version = &ctx.manifest.interpreter.version;

        match ctx
            .runner
            .capture(&manager.display().to_string(), &["versions", "--bare"])
        {
            Ok(listing) => Ok(listing.lines().any(|line| line.trim() == version)),
            Err(_) => Ok(false),
        }
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let manager = ctx.manifest.interpreter.manager_bin()?.display().to_string();
        let version = &ctx.manifest.interpreter.version;

        // --skip-existing keeps an already-built version a no-op success
        // instead of an error.
        ctx.runner
            .run(&manager, &["install", "--skip-existing", version])
            .with_context(|| format!("Failed to install interpreter {version}"))?;

        ctx.runner
            .run(&manager, &["global", version])
            .with_context(|| format!("Failed to set interpreter {version} as default"))?;

        Ok(StepOutcome::new(format!(
            "interpreter {version} installed and set as default"
        )))
    }
}

/// Creates the isolated virtual environment and upgrades its installer.
pub(crate) struct CreateVenv;

impl Step for CreateVenv {
    fn id(&self) -> &'static str {
        "venv"
    }

    fn summary(&self, ctx: &StepContext<'_>) -> String {
        format!(
            "create virtual environment {}",
            ctx.manifest.interpreter.venv
        )
    }

    fn is_applied(&self, ctx: &StepContext<'_>) -> Result<bool> {
        Ok(venv_dir(ctx)?.join("bin").join("python").exists())
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let python = ctx.manifest.interpreter.python_bin()?.display().to_string();
        let venv = venv_dir(ctx)?;
        let venv_arg = venv.display().to_string();

        ctx.runner
            .run(&python, &["-m", "venv", &venv_arg])
            .with_context(|| format!("Failed to create virtual environment {:?}", venv))?;

        // Address the venv's own pip by absolute path so the upgrade never
        // touches the global interpreter's package set.
        let pip = venv.join("bin").join("pip").display().to_string();
        ctx.runner
            .run(&pip, &["install", "--upgrade", "pip"])
            .context("Failed to upgrade pip inside the virtual environment")?;

        Ok(StepOutcome::new(format!(
            "virtual environment {} created",
            ctx.manifest.interpreter.venv
        )))
    }
}

/// The virtual environment lives under the working directory, fixed name.
fn venv_dir(ctx: &StepContext<'_>) -> Result<PathBuf> {
    let cwd = env::current_dir().context("Could not determine working directory")?;
    Ok(cwd.join(&ctx.manifest.interpreter.venv))
}
