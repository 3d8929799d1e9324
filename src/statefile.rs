use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// State file format (similar to a lockfile)
/// Records every provisioning step that has been applied to this machine,
/// so re-application can skip them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// Version of the state file format
    version: u32,
    /// Metadata about when provisioning first ran
    pub metadata: Metadata,
    /// Receipts for applied steps, in application order
    #[serde(default)]
    steps: Vec<StepReceipt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// When this state file was created
    pub created_at: String,
}

/// Receipt for one applied provisioning step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReceipt {
    /// Step identifier (stable across runs)
    pub id: String,
    /// Human-readable description of what was done
    pub detail: String,
    /// When the step was applied
    pub applied_at: String,
    /// SHA-256 of any artifact fetched while applying the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

impl StateFile {
    /// Create a new, empty state file
    pub fn new() -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            version: 1,
            metadata: Metadata { created_at: now },
            steps: Vec::new(),
        }
    }

    /// Default on-disk location: `$XDG_STATE_HOME/rigup/rigup.lock`
    /// (falling back to `~/.local/state/rigup/rigup.lock`).
    pub fn default_path() -> Result<PathBuf> {
        let base = env::var("XDG_STATE_HOME")
            .map(PathBuf::from)
            .or_else(|_| -> Result<PathBuf> {
                let dirs = directories::BaseDirs::new()
                    .context("Could not determine home directory")?;
                Ok(dirs.home_dir().join(".local/state"))
            })?;

        Ok(base.join("rigup").join("rigup.lock"))
    }

    /// Load a state file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file from {:?}", path))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse state file from {:?}", path))
    }

    /// Load the state file if it exists, otherwise start empty
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Save the state file to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create state directory {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize state file")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write state file to {:?}", path))?;

        Ok(())
    }

    /// Record a step application, generating the timestamp automatically
    pub fn record(&mut self, id: &str, detail: &str, digest: Option<String>) {
        self.steps.push(StepReceipt {
            id: id.to_string(),
            detail: detail.to_string(),
            applied_at: chrono::Utc::now().to_rfc3339(),
            digest,
        });
    }

    /// Whether a receipt exists for the given step id
    pub fn contains(&self, id: &str) -> bool {
        self.steps.iter().any(|receipt| receipt.id == id)
    }

    /// Iterate over recorded receipts in application order
    pub fn receipts(&self) -> impl Iterator<Item = &StepReceipt> {
        self.steps.iter()
    }

    /// Returns the number of recorded receipts
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether any steps have been recorded
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
