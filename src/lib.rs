// Public API
pub mod cli;
pub mod commands;

// Core domain types
mod engine;
mod environment;
mod fetch;
mod manifest;
mod runner;
mod stages;
mod statefile;
mod ui;

// Re-export main types
pub use engine::{ApplyReport, Engine, PlanEntry, Step, StepContext, StepOutcome, StepStatus};
pub use environment::{Environment, Shell};
pub use fetch::{Fetcher, HttpFetcher};
pub use manifest::{Manifest, ManifestIssue};
pub use runner::{CommandError, CommandRunner, SystemRunner};
pub use statefile::{StateFile, StepReceipt};
