use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

/// Failure of an external tool invocation.
///
/// Carries the child's exit status so the process boundary can propagate it
/// unchanged (the first failing tool's code becomes rigup's code).
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with status {code}")]
    Exit { program: String, code: i32 },

    #[error("'{program}' was terminated by a signal")]
    Signal { program: String },
}

impl CommandError {
    /// Exit code to propagate from `main`.
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::Exit { code, .. } => *code,
            _ => 1,
        }
    }
}

/// Seam between provisioning steps and the tools they drive.
///
/// Steps never spawn processes directly; they go through this trait so tests
/// can script the package manager and version manager without root access.
pub trait CommandRunner {
    /// Run a tool to completion, inheriting stdio.
    ///
    /// Raw tool output is the only diagnostic surface; rigup does not wrap
    /// or buffer it.
    fn run(&self, program: &str, args: &[&str]) -> Result<(), CommandError>;

    /// Run a tool and capture its stdout. Used for precondition queries.
    fn capture(&self, program: &str, args: &[&str]) -> Result<String, CommandError>;
}

/// Runs tools on the live system, blocking until each exits.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<(), CommandError> {
        debug!(program, ?args, "running command");

        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|source| CommandError::Launch {
                program: program.to_string(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(failure(program, status.code()))
        }
    }

    fn capture(&self, program: &str, args: &[&str]) -> Result<String, CommandError> {
        debug!(program, ?args, "capturing command output");

        let output = Command::new(program)
            .args(args)
            .stderr(Stdio::null())
            .output()
            .map_err(|source| CommandError::Launch {
                program: program.to_string(),
                source,
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(failure(program, output.status.code()))
        }
    }
}

fn failure(program: &str, code: Option<i32>) -> CommandError {
    match code {
        Some(code) => CommandError::Exit {
            program: program.to_string(),
            code,
        },
        None => CommandError::Signal {
            program: program.to_string(),
        },
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{CommandError, CommandRunner};
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Scripted runner standing in for apt, dpkg, and pyenv in tests.
    ///
    /// Commands succeed silently unless a failure is registered; captures
    /// fail with status 1 unless an output is registered, matching how
    /// query tools report absence.
    #[derive(Default)]
    pub(crate) struct ScriptedRunner {
        calls: RefCell<Vec<String>>,
        outputs: RefCell<HashMap<String, String>>,
        failures: RefCell<HashMap<String, i32>>,
    }

    impl ScriptedRunner {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn on_output(&self, command: &str, output: &str) {
            self.outputs
                .borrow_mut()
                .insert(command.to_string(), output.to_string());
        }

        pub(crate) fn fail_with(&self, command: &str, code: i32) {
            self.failures.borrow_mut().insert(command.to_string(), code);
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        pub(crate) fn ran(&self, needle: &str) -> bool {
            self.calls.borrow().iter().any(|call| call.contains(needle))
        }

        fn record(&self, program: &str, args: &[&str]) -> String {
            let mut line = program.to_string();
            for arg in args {
                line.push(' ');
                line.push_str(arg);
            }
            self.calls.borrow_mut().push(line.clone());
            line
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, program: &str, args: &[&str]) -> Result<(), CommandError> {
            let line = self.record(program, args);
            match self.failures.borrow().get(&line) {
                Some(code) => Err(CommandError::Exit {
                    program: program.to_string(),
                    code: *code,
                }),
                None => Ok(()),
            }
        }

        fn capture(&self, program: &str, args: &[&str]) -> Result<String, CommandError> {
            let line = self.record(program, args);
            if let Some(code) = self.failures.borrow().get(&line) {
                return Err(CommandError::Exit {
                    program: program.to_string(),
                    code: *code,
                });
            }
            match self.outputs.borrow().get(&line) {
                Some(output) => Ok(output.clone()),
                None => Err(CommandError::Exit {
                    program: program.to_string(),
                    code: 1,
                }),
            }
        }
    }
}
