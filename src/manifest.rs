use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Desired machine state declared in `rigup.toml`.
///
/// Every version field is an exact pin; the manifest never expresses ranges
/// and no resolution happens anywhere.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Manifest {
    pub base: BaseSpec,
    pub toolkit: ToolkitSpec,
    #[serde(default)]
    pub packages: PackageSpec,
    pub interpreter: InterpreterSpec,
    pub profile: ProfileSpec,
}

/// OS base the manifest was written against.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BaseSpec {
    /// os-release ID (e.g. `ubuntu`)
    pub os: String,
    /// os-release VERSION_ID (e.g. `22.04`)
    pub release: String,
}

/// The pinned compute toolkit and the apt channel it is served from.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolkitSpec {
    /// Package name installed through the system package manager
    pub package: String,
    /// Exact package version pin
    pub version: String,
    /// Fixed URL of the repository signing keyring package
    pub keyring_url: String,
    /// Fixed URL of the release-channel pin rule
    pub pin_url: String,
    /// Destination for the pin rule (an apt preferences.d path)
    pub pin_file: PathBuf,
    /// Directory holding the toolkit executables, added to PATH
    pub bin_dir: PathBuf,
    /// Directory holding the toolkit libraries, added to LD_LIBRARY_PATH
    pub lib_dir: PathBuf,
}

/// OS-level packages installed alongside the toolkit.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PackageSpec {
    #[serde(default)]
    pub install: Vec<String>,
}

/// The interpreter version manager and the pinned interpreter it provides.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterpreterSpec {
    /// Exact interpreter version pin
    pub version: String,
    /// Fixed URL of the version-manager installer script
    pub installer_url: String,
    /// Version-manager root; `~` and environment variables are expanded
    #[serde(default = "default_interpreter_root")]
    pub root: String,
    /// Virtual environment name, created under the working directory
    #[serde(default = "default_venv")]
    pub venv: String,
}

fn default_interpreter_root() -> String {
    "~/.pyenv".to_string()
}

fn default_venv() -> String {
    ".venv".to_string()
}

/// Login-shell profile file that receives the environment exports.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProfileSpec {
    /// Profile file path; `~` and environment variables are expanded
    pub file: String,
    /// Shell dialect for the exports (defaults to bash)
    #[serde(default)]
    pub shell: Option<String>,
}

impl Manifest {
    /// Load a manifest from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest file {:?}", path))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse manifest file {:?}", path))
    }

    /// Validate field contents beyond what deserialization enforces.
    ///
    /// Returns one issue per offending field; an empty list means the
    /// manifest is safe to apply.
    pub fn validate(&self) -> Vec<ManifestIssue> {
        let mut issues = Vec::new();

        if self.base.os.trim().is_empty() {
            issues.push(ManifestIssue::new("base.os", "must not be empty"));
        }
        if self.base.release.trim().is_empty() {
            issues.push(ManifestIssue::new("base.release", "must not be empty"));
        }

        if self.toolkit.package.trim().is_empty() {
            issues.push(ManifestIssue::new("toolkit.package", "must not be empty"));
        }

        let deb_version = Regex::new(r"^[0-9][A-Za-z0-9+.:~-]*$").expect("static regex");
        if !deb_version.is_match(&self.toolkit.version) {
            issues.push(ManifestIssue::new(
                "toolkit.version",
                "must be an exact package version pin (e.g. `12.4.1-1`)",
            ));
        }

        check_url(&mut issues, "toolkit.keyring_url", &self.toolkit.keyring_url);
        check_url(&mut issues, "toolkit.pin_url", &self.toolkit.pin_url);

        if !self.toolkit.pin_file.is_absolute() {
            issues.push(ManifestIssue::new(
                "toolkit.pin_file",
                "must be an absolute path",
            ));
        }
        if !self.toolkit.bin_dir.is_absolute() {
            issues.push(ManifestIssue::new(
                "toolkit.bin_dir",
                "must be an absolute path",
            ));
        }
        if !self.toolkit.lib_dir.is_absolute() {
            issues.push(ManifestIssue::new(
                "toolkit.lib_dir",
                "must be an absolute path",
            ));
        }

        for package in &self.packages.install {
            if package.trim().is_empty() {
                issues.push(ManifestIssue::new(
                    "packages.install",
                    "package names must not be empty",
                ));
                break;
            }
        }

        let interpreter_version = Regex::new(r"^\d+\.\d+\.\d+$").expect("static regex");
        if !interpreter_version.is_match(&self.interpreter.version) {
            issues.push(ManifestIssue::new(
                "interpreter.version",
                "must be an exact interpreter version pin (e.g. `3.10.15`)",
            ));
        }

        check_url(
            &mut issues,
            "interpreter.installer_url",
            &self.interpreter.installer_url,
        );

        if self.interpreter.venv.trim().is_empty() {
            issues.push(ManifestIssue::new("interpreter.venv", "must not be empty"));
        } else if Path::new(&self.interpreter.venv).is_absolute() {
            issues.push(ManifestIssue::new(
                "interpreter.venv",
                "must be a name relative to the working directory",
            ));
        }

        if self.profile.file.trim().is_empty() {
            issues.push(ManifestIssue::new("profile.file", "must not be empty"));
        }

        if let Some(shell) = &self.profile.shell {
            if !matches!(shell.to_lowercase().as_str(), "bash" | "zsh" | "fish") {
                issues.push(ManifestIssue::new(
                    "profile.shell",
                    "must be one of: bash, zsh, fish",
                ));
            }
        }

        issues
    }
}

impl InterpreterSpec {
    /// Version-manager root with `~` and environment variables expanded.
    pub fn root_dir(&self) -> Result<PathBuf> {
        expand_path(&self.root)
            .with_context(|| format!("Failed to expand interpreter root '{}'", self.root))
    }

    /// Path of the version-manager executable.
    pub fn manager_bin(&self) -> Result<PathBuf> {
        Ok(self.root_dir()?.join("bin").join("pyenv"))
    }

    /// Path of the pinned interpreter installed by the version manager.
    pub fn python_bin(&self) -> Result<PathBuf> {
        Ok(self
            .root_dir()?
            .join("versions")
            .join(&self.version)
            .join("bin")
            .join("python"))
    }
}

impl ProfileSpec {
    /// Profile file path with `~` and environment variables expanded.
    pub fn path(&self) -> Result<PathBuf> {
        expand_path(&self.file)
            .with_context(|| format!("Failed to expand profile path '{}'", self.file))
    }
}

fn expand_path(value: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(value).map_err(|err| anyhow!("{err}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

fn check_url(issues: &mut Vec<ManifestIssue>, field: &'static str, value: &str) {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => issues.push(ManifestIssue::new(
            field,
            format!("unsupported URL scheme '{}'", url.scheme()),
        )),
        Err(err) => issues.push(ManifestIssue::new(field, format!("invalid URL: {err}"))),
    }
}

/// A single problem found while validating a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestIssue {
    pub field: String,
    pub message: String,
}

impl ManifestIssue {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
