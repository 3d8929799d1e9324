use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::debug;

use crate::fetch::Fetcher;
use crate::manifest::Manifest;
use crate::runner::CommandRunner;
use crate::stages;
use crate::statefile::StateFile;
use crate::ui;

/// Everything a step needs to inspect and mutate the machine.
pub struct StepContext<'a> {
    pub manifest: &'a Manifest,
    pub runner: &'a dyn CommandRunner,
    pub fetcher: &'a dyn Fetcher,
}

/// Result of applying a step, recorded as a receipt in the state file.
#[derive(Debug)]
pub struct StepOutcome {
    pub detail: String,
    pub digest: Option<String>,
}

impl StepOutcome {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            digest: None,
        }
    }

    pub fn with_digest(detail: impl Into<String>, digest: String) -> Self {
        Self {
            detail: detail.into(),
            digest: Some(digest),
        }
    }
}

/// One declarative provisioning step.
///
/// Steps run in a fixed order; each is checked against the machine before
/// execution and recorded in the state file after it.
pub trait Step {
    /// Stable identifier used in receipts
    fn id(&self) -> &'static str;

    /// One-line description shown in plan/apply output
    fn summary(&self, ctx: &StepContext<'_>) -> String;

    /// Whether the machine already satisfies this step, independent of any
    /// receipt. Steps whose effect cannot be probed return false and rely
    /// on receipts alone.
    fn is_applied(&self, ctx: &StepContext<'_>) -> Result<bool>;

    /// Apply the step. Any failure is fatal to the run; no rollback.
    fn apply(&self, ctx: &StepContext<'_>) -> Result<StepOutcome>;
}

/// Status of a step in `rigup plan` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Satisfied,
    Pending,
}

/// One row of `rigup plan` output.
pub struct PlanEntry {
    pub id: &'static str,
    pub summary: String,
    pub status: StepStatus,
}

/// Summary of an apply run.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApplyReport {
    pub applied: usize,
    pub skipped: usize,
}

/// The reconciler: walks the ordered step list, skipping steps that are
/// already recorded or already satisfied, applying the rest in sequence.
pub struct Engine<'a> {
    manifest: &'a Manifest,
    runner: &'a dyn CommandRunner,
    fetcher: &'a dyn Fetcher,
    state_path: PathBuf,
}

impl<'a> Engine<'a> {
    pub fn new(
        manifest: &'a Manifest,
        runner: &'a dyn CommandRunner,
        fetcher: &'a dyn Fetcher,
        state_path: PathBuf,
    ) -> Self {
        Self {
            manifest,
            runner,
            fetcher,
            state_path,
        }
    }

    fn context(&self) -> StepContext<'a> {
        StepContext {
            manifest: self.manifest,
            runner: self.runner,
            fetcher: self.fetcher,
        }
    }

    /// Evaluate every step's precondition without mutating anything.
    pub fn plan(&self) -> Result<Vec<PlanEntry>> {
        let state = StateFile::load_or_default(&self.state_path)?;
        let ctx = self.context();

        let mut entries = Vec::new();
        for step in stages::all(self.manifest) {
            let status = if state.contains(step.id()) || step.is_applied(&ctx)? {
                StepStatus::Satisfied
            } else {
                StepStatus::Pending
            };

            entries.push(PlanEntry {
                id: step.id(),
                summary: step.summary(&ctx),
                status,
            });
        }

        Ok(entries)
    }

    /// Apply every pending step in order.
    ///
    /// Strictly sequential and fail-fast: the first error aborts the run.
    /// Receipts are saved after each step, so a failed run resumes at the
    /// step that failed.
    pub fn apply(&self) -> Result<ApplyReport> {
        let mut state = StateFile::load_or_default(&self.state_path)?;
        let ctx = self.context();
        let mut report = ApplyReport::default();

        for step in stages::all(self.manifest) {
            if state.contains(step.id()) {
                debug!(step = step.id(), "receipt present, skipping");
                report.skipped += 1;
                continue;
            }

            let already = step
                .is_applied(&ctx)
                .with_context(|| format!("Precondition check failed for step '{}'", step.id()))?;

            if already {
                state.record(step.id(), "already satisfied", None);
                state.save(&self.state_path)?;
                report.skipped += 1;
                continue;
            }

            let progress = ui::Progress::new("Applying", step.summary(&ctx));
            match step.apply(&ctx) {
                Ok(outcome) => {
                    progress.success("Applied", None);
                    state.record(step.id(), &outcome.detail, outcome.digest);
                    state.save(&self.state_path)?;
                    report.applied += 1;
                }
                Err(err) => {
                    progress.fail("Failed", &err);
                    return Err(err.context(format!("Step '{}' failed", step.id())));
                }
            }
        }

        Ok(report)
    }
}
