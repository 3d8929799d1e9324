use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rigup - Declarative provisioning for GPU development machines
///
/// rigup applies a pinned manifest (`rigup.toml`) to a machine: a compute
/// toolkit from its vendor apt channel, an interpreter version manager with
/// a pinned interpreter and virtual environment, and the shell exports that
/// make them reachable. Applied steps are recorded in a state file so
/// re-running `rigup apply` against a provisioned machine changes nothing.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the provisioning manifest
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        default_value = "rigup.toml"
    )]
    pub manifest: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a template manifest
    ///
    /// Creates a starter rigup.toml with pinned toolkit, interpreter, and
    /// profile sections. Edit the pins before applying.
    Init {
        /// Overwrite an existing manifest
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the manifest without touching the system
    Check,

    /// Show which steps are already applied and which are pending
    Plan,

    /// Apply every pending step in order (fail-fast, no retries)
    Apply,

    /// Show steps recorded in the state file
    Status,

    /// Output environment exports (used in shell init)
    Env {
        /// Shell type (bash, zsh, fish)
        #[arg(short, long, value_name = "SHELL", default_value = "bash")]
        shell: String,
    },

    /// Verify the provisioned toolchain against the manifest pins
    Verify,
}
