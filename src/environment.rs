use anyhow::Result;
use std::path::PathBuf;

use crate::manifest::Manifest;

/// Shell type for environment generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
}

impl Shell {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "bash" => Some(Shell::Bash),
            "zsh" => Some(Shell::Zsh),
            "fish" => Some(Shell::Fish),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Shell::Bash => "bash",
            Shell::Zsh => "zsh",
            Shell::Fish => "fish",
        }
    }
}

/// Shell environment configuration
///
/// Renders the exports a provisioned machine needs: the toolkit and
/// version-manager bin directories on PATH and the toolkit library
/// directory on LD_LIBRARY_PATH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub toolkit_bin: PathBuf,
    pub toolkit_lib: PathBuf,
    pub manager_bin: PathBuf,
}

impl Environment {
    /// Derive the environment from a manifest
    pub fn from_manifest(manifest: &Manifest) -> Result<Self> {
        Ok(Self {
            toolkit_bin: manifest.toolkit.bin_dir.clone(),
            toolkit_lib: manifest.toolkit.lib_dir.clone(),
            manager_bin: manifest.interpreter.root_dir()?.join("bin"),
        })
    }

    /// Format the environment for the given shell
    pub fn format_for_shell(&self, shell: Shell) -> String {
        match shell {
            Shell::Bash | Shell::Zsh => self.format_posix(),
            Shell::Fish => self.format_fish(),
        }
    }

    fn format_posix(&self) -> String {
        format!(
            "export PATH=\"{}:{}:$PATH\"\nexport LD_LIBRARY_PATH=\"{}:${{LD_LIBRARY_PATH:-}}\"",
            self.toolkit_bin.display(),
            self.manager_bin.display(),
            self.toolkit_lib.display()
        )
    }

    fn format_fish(&self) -> String {
        format!(
            "set -gx PATH {} {} $PATH\nset -gx LD_LIBRARY_PATH {} $LD_LIBRARY_PATH",
            self.toolkit_bin.display(),
            self.manager_bin.display(),
            self.toolkit_lib.display()
        )
    }
}
