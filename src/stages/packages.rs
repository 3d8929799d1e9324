use anyhow::{Context, Result};
use std::env;
use std::fs;

use crate::engine::{Step, StepContext, StepOutcome};
use crate::fetch::{artifact_name, format_digest};
use crate::runner::CommandRunner;

/// Refreshes the apt package index.
///
/// Index freshness cannot be probed, so this step relies on its receipt.
pub(crate) struct RefreshIndex;

impl Step for RefreshIndex {
    fn id(&self) -> &'static str {
        "pkg-index"
    }

    fn summary(&self, _ctx: &StepContext<'_>) -> String {
        "refresh package index".to_string()
    }

    fn is_applied(&self, _ctx: &StepContext<'_>) -> Result<bool> {
        Ok(false)
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        ctx.runner
            .run("apt-get", &["update"])
            .context("Failed to refresh the package index")?;

        Ok(StepOutcome::new("package index refreshed"))
    }
}

/// Installs the repository signing keyring from its fixed URL.
///
/// The downloaded package is deleted after installation; only its SHA-256
/// survives, in the step receipt.
pub(crate) struct InstallKeyring;

impl Step for InstallKeyring {
    fn id(&self) -> &'static str {
        "toolkit-keyring"
    }

    fn summary(&self, ctx: &StepContext<'_>) -> String {
        format!(
            "install repository keyring from {}",
            ctx.manifest.toolkit.keyring_url
        )
    }

    fn is_applied(&self, _ctx: &StepContext<'_>) -> Result<bool> {
        Ok(false)
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let url = &ctx.manifest.toolkit.keyring_url;
        let download = env::temp_dir().join(artifact_name(url, "keyring.deb"));

        let digest = ctx
            .fetcher
            .fetch(url, &download)
            .with_context(|| format!("Failed to download repository keyring from {url}"))?;

        let download_arg = download.display().to_string();
        ctx.runner
            .run("dpkg", &["-i", &download_arg])
            .context("Failed to install the repository keyring")?;

        fs::remove_file(&download)
            .with_context(|| format!("Failed to remove downloaded keyring {:?}", download))?;

        Ok(StepOutcome::with_digest(
            format!("keyring installed from {url}"),
            format_digest(&digest),
        ))
    }
}

/// Places the release-channel pin rule so only the intended channel serves
/// the toolkit package.
pub(crate) struct InstallPinRule;

impl Step for InstallPinRule {
    fn id(&self) -> &'static str {
        "toolkit-pin"
    }

    fn summary(&self, ctx: &StepContext<'_>) -> String {
        format!(
            "install channel pin rule at {}",
            ctx.manifest.toolkit.pin_file.display()
        )
    }

    fn is_applied(&self, ctx: &StepContext<'_>) -> Result<bool> {
        Ok(ctx.manifest.toolkit.pin_file.exists())
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let url = &ctx.manifest.toolkit.pin_url;
        let pin_file = &ctx.manifest.toolkit.pin_file;

        let digest = ctx
            .fetcher
            .fetch(url, pin_file)
            .with_context(|| format!("Failed to download channel pin rule from {url}"))?;

        Ok(StepOutcome::with_digest(
            format!("pin rule installed at {}", pin_file.display()),
            format_digest(&digest),
        ))
    }
}

/// Installs the toolkit package at its exact pinned version.
pub(crate) struct InstallToolkit;

impl Step for InstallToolkit {
    fn id(&self) -> &'static str {
        "toolkit"
    }

    fn summary(&self, ctx: &StepContext<'_>) -> String {
        format!(
            "install {} {}",
            ctx.manifest.toolkit.package, ctx.manifest.toolkit.version
        )
    }

    fn is_applied(&self, ctx: &StepContext<'_>) -> Result<bool> {
        let toolkit = &ctx.manifest.toolkit;
        Ok(installed_version(ctx.runner, &toolkit.package).as_deref()
            == Some(toolkit.version.as_str()))
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let toolkit = &ctx.manifest.toolkit;
        let pinned = format!("{}={}", toolkit.package, toolkit.version);

        ctx.runner
            .run("apt-get", &["install", "-y", &pinned])
            .with_context(|| format!("Failed to install {pinned}"))?;

        Ok(StepOutcome::new(format!(
            "{} {} installed",
            toolkit.package, toolkit.version
        )))
    }
}

/// Installs the OS package list alongside the toolkit.
pub(crate) struct InstallOsPackages;

impl Step for InstallOsPackages {
    fn id(&self) -> &'static str {
        "os-packages"
    }

    fn summary(&self, ctx: &StepContext<'_>) -> String {
        format!("install {} OS packages", ctx.manifest.packages.install.len())
    }

    fn is_applied(&self, ctx: &StepContext<'_>) -> Result<bool> {
        Ok(ctx
            .manifest
            .packages
            .install
            .iter()
            .all(|package| package_installed(ctx.runner, package)))
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let packages = &ctx.manifest.packages.install;

        let mut args = vec!["install", "-y"];
        args.extend(packages.iter().map(String::as_str));

        ctx.runner
            .run("apt-get", &args)
            .context("Failed to install OS packages")?;

        Ok(StepOutcome::new(format!(
            "{} OS packages installed",
            packages.len()
        )))
    }
}

/// Installed version of a package, or None when it is absent.
///
/// Query failures read as "not installed" so preconditions stay usable on
/// machines where the query tool itself is missing.
fn installed_version(runner: &dyn CommandRunner, package: &str) -> Option<String> {
    runner
        .capture("dpkg-query", &["-W", "-f", "${Version}", package])
        .ok()
        .map(|output| output.trim().to_string())
        .filter(|version| !version.is_empty())
}

fn package_installed(runner: &dyn CommandRunner, package: &str) -> bool {
    runner
        .capture("dpkg-query", &["-W", "-f", "${Status}", package])
        .map(|status| status.contains("install ok installed"))
        .unwrap_or(false)
}
