use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::{Step, StepContext, StepOutcome};

const OS_RELEASE_PATH: &str = "/etc/os-release";
const OS_RELEASE_ENV: &str = "RIGUP_OS_RELEASE";

/// Asserts the machine matches the pinned OS base before anything mutates.
///
/// The base cannot be selected at apply time; a mismatch means the manifest
/// was written for a different image and the run must not continue.
pub(crate) struct BaseCheck;

impl Step for BaseCheck {
    fn id(&self) -> &'static str {
        "base"
    }

    fn summary(&self, ctx: &StepContext<'_>) -> String {
        format!(
            "verify OS base {} {}",
            ctx.manifest.base.os, ctx.manifest.base.release
        )
    }

    fn is_applied(&self, ctx: &StepContext<'_>) -> Result<bool> {
        Ok(read_os_release(&os_release_path())
            .map(|release| release.matches(&ctx.manifest.base.os, &ctx.manifest.base.release))
            .unwrap_or(false))
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let path = os_release_path();
        let release = read_os_release(&path)?;

        if !release.matches(&ctx.manifest.base.os, &ctx.manifest.base.release) {
            bail!(
                "Manifest targets {} {} but this machine reports {} {}",
                ctx.manifest.base.os,
                ctx.manifest.base.release,
                release.id.as_deref().unwrap_or("<unknown>"),
                release.version_id.as_deref().unwrap_or("<unknown>"),
            );
        }

        Ok(StepOutcome::new(format!(
            "OS base {} {} verified",
            ctx.manifest.base.os, ctx.manifest.base.release
        )))
    }
}

#[derive(Debug)]
struct OsRelease {
    id: Option<String>,
    version_id: Option<String>,
}

impl OsRelease {
    fn matches(&self, os: &str, release: &str) -> bool {
        self.id.as_deref() == Some(os.to_ascii_lowercase().as_str())
            && self.version_id.as_deref() == Some(release)
    }
}

fn os_release_path() -> PathBuf {
    env::var(OS_RELEASE_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(OS_RELEASE_PATH))
}

fn read_os_release(path: &Path) -> Result<OsRelease> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read os-release from {:?}", path))?;

    let mut values = HashMap::new();
    for line in contents.lines() {
        if let Some((key, value)) = line.split_once('=') {
            let trimmed = value.trim_matches('"').trim().to_string();
            values.insert(key.to_ascii_lowercase(), trimmed);
        }
    }

    Ok(OsRelease {
        id: values.get("id").map(|value| value.to_ascii_lowercase()),
        version_id: values.get("version_id").cloned(),
    })
}
