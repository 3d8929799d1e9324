use anyhow::{Context, Result};
use std::fs;

use crate::engine::{Step, StepContext, StepOutcome};
use crate::environment::{Environment, Shell};
use crate::ui;

const PROFILE_HEADER: &str = "# rigup environment";

/// Appends the environment exports to the login-shell profile file.
///
/// The raw operation is append-only: run N times it leaves N copies of the
/// block. Idempotence across runs comes from the engine's receipt, not from
/// this step. When the exports are already present without a receipt the
/// step warns about the impending duplicate and appends anyway; it never
/// silently deduplicates.
pub(crate) struct AppendProfile;

impl Step for AppendProfile {
    fn id(&self) -> &'static str {
        "profile"
    }

    fn summary(&self, ctx: &StepContext<'_>) -> String {
        format!("append environment exports to {}", ctx.manifest.profile.file)
    }

    fn is_applied(&self, _ctx: &StepContext<'_>) -> Result<bool> {
        // File contents cannot prove this step ran; only the receipt can.
        Ok(false)
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let path = ctx.manifest.profile.path()?;
        let shell = ctx
            .manifest
            .profile
            .shell
            .as_deref()
            .and_then(Shell::from_name)
            .unwrap_or(Shell::Bash);

        let environment = Environment::from_manifest(ctx.manifest)?;
        let block = format!(
            "{}\n{}\n",
            PROFILE_HEADER,
            environment.format_for_shell(shell)
        );

        let existing = if path.exists() {
            fs::read_to_string(&path)
                .with_context(|| format!("Failed to read profile file {:?}", path))?
        } else {
            String::new()
        };

        let toolkit_bin = environment.toolkit_bin.display().to_string();
        if existing.contains(&toolkit_bin) {
            ui::warn(format!(
                "{:?} already references {}; appending again will duplicate it",
                path, toolkit_bin
            ));
        }

        let contents = if existing.is_empty() {
            block
        } else if existing.ends_with('\n') {
            format!("{existing}{block}")
        } else {
            format!("{existing}\n{block}")
        };

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write profile file {:?}", path))?;

        Ok(StepOutcome::new(format!(
            "environment exports appended to {}",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StepContext;
    use crate::fetch::testing::StubFetcher;
    use crate::manifest::Manifest;
    use crate::runner::testing::ScriptedRunner;
    use std::path::Path;
    use tempfile::TempDir;

    fn sample_manifest(profile: &Path, shell: &str) -> Manifest {
        toml::from_str(&format!(
            r#"
[base]
os = "ubuntu"
release = "22.04"

[toolkit]
package = "cuda-toolkit-12-4"
version = "12.4.1-1"
keyring_url = "https://repo.example.com/key.deb"
pin_url = "https://repo.example.com/cuda.pin"
pin_file = "/etc/apt/preferences.d/cuda-repository-pin-600"
bin_dir = "/usr/local/cuda-12.4/bin"
lib_dir = "/usr/local/cuda-12.4/lib64"

[interpreter]
version = "3.10.15"
installer_url = "https://pyenv.run"
root = "/opt/pyenv"

[profile]
file = "{file}"
shell = "{shell}"
"#,
            file = profile.display()
        ))
        .unwrap()
    }

    fn context_for<'a>(
        manifest: &'a Manifest,
        runner: &'a ScriptedRunner,
        fetcher: &'a StubFetcher,
    ) -> StepContext<'a> {
        StepContext {
            manifest,
            runner,
            fetcher,
        }
    }

    #[test]
    fn single_run_exports_path_exactly_once() {
        let temp = TempDir::new().unwrap();
        let profile = temp.path().join("bashrc");
        let manifest = sample_manifest(&profile, "bash");
        let runner = ScriptedRunner::new();
        let fetcher = StubFetcher::new();
        let ctx = context_for(&manifest, &runner, &fetcher);

        AppendProfile.apply(&ctx).unwrap();

        let contents = fs::read_to_string(&profile).unwrap();
        assert_eq!(contents.matches("/usr/local/cuda-12.4/bin").count(), 1);
        assert_eq!(contents.matches("export PATH=").count(), 1);
        assert!(contents.contains("export LD_LIBRARY_PATH=\"/usr/local/cuda-12.4/lib64:"));
        assert!(contents.contains("/opt/pyenv/bin"));
    }

    #[test]
    fn package_install_is_idempotent_but_raw_append_is_not() {
        let temp = TempDir::new().unwrap();
        let profile = temp.path().join("bashrc");
        let manifest = sample_manifest(&profile, "bash");
        let runner = ScriptedRunner::new();
        let fetcher = StubFetcher::new();
        let ctx = context_for(&manifest, &runner, &fetcher);

        // Against a provisioned machine the toolkit step reports satisfied
        // and installs nothing further.
        runner.on_output(
            "dpkg-query -W -f ${Version} cuda-toolkit-12-4",
            "12.4.1-1\n",
        );
        assert!(super::super::packages::InstallToolkit
            .is_applied(&ctx)
            .unwrap());
        assert!(!runner.ran("apt-get install"));

        // The raw profile append has no such property; without the engine
        // receipt each invocation adds another copy.
        AppendProfile.apply(&ctx).unwrap();
        AppendProfile.apply(&ctx).unwrap();

        let contents = fs::read_to_string(&profile).unwrap();
        assert_eq!(contents.matches("export PATH=").count(), 2);
    }

    #[test]
    fn appends_after_existing_content_without_trailing_newline() {
        let temp = TempDir::new().unwrap();
        let profile = temp.path().join("bashrc");
        fs::write(&profile, "alias ll='ls -l'").unwrap();

        let manifest = sample_manifest(&profile, "bash");
        let runner = ScriptedRunner::new();
        let fetcher = StubFetcher::new();
        let ctx = context_for(&manifest, &runner, &fetcher);

        AppendProfile.apply(&ctx).unwrap();

        let contents = fs::read_to_string(&profile).unwrap();
        assert!(contents.starts_with("alias ll='ls -l'\n"));
        assert!(contents.contains("# rigup environment"));
        assert!(contents.ends_with('\n'));
    }

    #[test]
    fn fish_profile_uses_set_gx() {
        let temp = TempDir::new().unwrap();
        let profile = temp.path().join("config.fish");
        let manifest = sample_manifest(&profile, "fish");
        let runner = ScriptedRunner::new();
        let fetcher = StubFetcher::new();
        let ctx = context_for(&manifest, &runner, &fetcher);

        AppendProfile.apply(&ctx).unwrap();

        let contents = fs::read_to_string(&profile).unwrap();
        assert!(contents.contains("set -gx PATH"));
        assert!(!contents.contains("export"));
    }

    #[test]
    fn never_reports_applied_from_file_contents() {
        let temp = TempDir::new().unwrap();
        let profile = temp.path().join("bashrc");
        let manifest = sample_manifest(&profile, "bash");
        let runner = ScriptedRunner::new();
        let fetcher = StubFetcher::new();
        let ctx = context_for(&manifest, &runner, &fetcher);

        AppendProfile.apply(&ctx).unwrap();

        // Even with the exports present, the step reports pending; only the
        // engine receipt makes re-application a no-op.
        assert!(!AppendProfile.is_applied(&ctx).unwrap());
    }
}
