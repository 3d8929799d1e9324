use crate::manifest::Manifest;
use crate::runner::{CommandRunner, SystemRunner};
use crate::ui;
use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use std::path::Path;

pub fn execute(manifest_path: &Path) -> Result<()> {
    let manifest = super::load_valid_manifest(manifest_path)?;
    let runner = SystemRunner::new();
    run_checks(&manifest, &runner)
}

/// Post-provisioning checks against the manifest pins.
///
/// The interpreter must report exactly the pinned version and the toolkit
/// compiler must be present. GPU visibility is reported but not required;
/// driver management is outside the manifest's contract.
fn run_checks(manifest: &Manifest, runner: &dyn CommandRunner) -> Result<()> {
    let python = manifest.interpreter.python_bin()?.display().to_string();
    let output = runner
        .capture(&python, &["--version"])
        .with_context(|| format!("Failed to run the pinned interpreter at {python}"))?;

    let reported = parse_version(&output)
        .ok_or_else(|| anyhow!("Could not parse interpreter version from {output:?}"))?;

    if reported != manifest.interpreter.version {
        bail!(
            "Interpreter reports {} but the manifest pins {}",
            reported,
            manifest.interpreter.version
        );
    }
    ui::success("Verified", format!("interpreter {reported}"));

    let compiler = manifest
        .toolkit
        .bin_dir
        .join("nvcc")
        .display()
        .to_string();
    let output = runner
        .capture(&compiler, &["--version"])
        .with_context(|| format!("Failed to run the toolkit compiler at {compiler}"))?;

    match parse_release(&output) {
        Some(release) => ui::success("Verified", format!("toolkit compiler release {release}")),
        None => ui::success("Verified", "toolkit compiler present"),
    }

    match runner.capture("nvidia-smi", &["--query-gpu=name", "--format=csv,noheader"]) {
        Ok(names) => {
            for name in names.lines().filter(|line| !line.trim().is_empty()) {
                ui::info(format!("gpu: {}", name.trim()));
            }
        }
        Err(err) => ui::warn(format!("GPU query unavailable: {err}")),
    }

    Ok(())
}

fn parse_version(output: &str) -> Option<String> {
    let pattern = Regex::new(r"(\d+\.\d+\.\d+)").expect("static regex");
    pattern
        .captures(output)
        .map(|captures| captures[1].to_string())
}

fn parse_release(output: &str) -> Option<String> {
    let pattern = Regex::new(r"release (\d+\.\d+)").expect("static regex");
    pattern
        .captures(output)
        .map(|captures| captures[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::ScriptedRunner;

    const PYTHON: &str = "/opt/pyenv/versions/3.10.15/bin/python";
    const NVCC: &str = "/usr/local/cuda-12.4/bin/nvcc";

    fn sample_manifest() -> Manifest {
        toml::from_str(
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
file = "~/.bashrc"
"#,
        )
        .unwrap()
    }

    #[test]
    fn passes_when_interpreter_reports_exact_pin() {
        let manifest = sample_manifest();
        let runner = ScriptedRunner::new();
        runner.on_output(&format!("{PYTHON} --version"), "Python 3.10.15\n");
        runner.on_output(
            &format!("{NVCC} --version"),
            "Cuda compilation tools, release 12.4, V12.4.131\n",
        );

        run_checks(&manifest, &runner).unwrap();
    }

    #[test]
    fn fails_when_interpreter_version_differs() {
        let manifest = sample_manifest();
        let runner = ScriptedRunner::new();
        runner.on_output(&format!("{PYTHON} --version"), "Python 3.10.16\n");

        let err = run_checks(&manifest, &runner).unwrap_err();
        assert!(err.to_string().contains("pins 3.10.15"));
    }

    #[test]
    fn fails_when_toolkit_compiler_missing() {
        let manifest = sample_manifest();
        let runner = ScriptedRunner::new();
        runner.on_output(&format!("{PYTHON} --version"), "Python 3.10.15\n");
        // nvcc unregistered: the capture fails

        let err = run_checks(&manifest, &runner).unwrap_err();
        assert!(format!("{err:#}").contains("toolkit compiler"));
    }

    #[test]
    fn gpu_absence_is_not_fatal() {
        let manifest = sample_manifest();
        let runner = ScriptedRunner::new();
        runner.on_output(&format!("{PYTHON} --version"), "Python 3.10.15\n");
        runner.on_output(
            &format!("{NVCC} --version"),
            "Cuda compilation tools, release 12.4, V12.4.131\n",
        );
        runner.fail_with("nvidia-smi --query-gpu=name --format=csv,noheader", 127);

        run_checks(&manifest, &runner).unwrap();
    }

    #[test]
    fn parse_version_extracts_triplet() {
        assert_eq!(parse_version("Python 3.10.15"), Some("3.10.15".to_string()));
        assert_eq!(parse_version("no version here"), None);
    }

    #[test]
    fn parse_release_extracts_toolkit_release() {
        assert_eq!(
            parse_release("Cuda compilation tools, release 12.4, V12.4.131"),
            Some("12.4".to_string())
        );
        assert_eq!(parse_release("garbage"), None);
    }
}
