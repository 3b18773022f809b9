//! Running the vendor quota tools.
//!
//! Commands are run directly, not through a shell, so names coming from
//! the user database are never interpreted as shell syntax. Filtering that
//! used to be done with `grep` or `awk` is done by the backends.
use std::fmt;
use std::process::Command;

use crate::{Error, Result};

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args:    Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> CommandLine {
        CommandLine {
            program: program.into(),
            args:    Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> CommandLine {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.program)?;
        for a in &self.args {
            write!(f, " {}", a)?;
        }
        Ok(())
    }
}

/// Runs a command and returns its output.
///
/// Implementations return the standard output with trailing whitespace
/// removed, or `Error::Execution` if the command did not succeed.
pub trait Executor {
    fn execute(&self, cmd: &CommandLine) -> Result<String>;
}

/// Runs commands on the local system.
#[derive(Debug, Clone, Copy, Default)]
pub struct System;

impl Executor for System {
    fn execute(&self, cmd: &CommandLine) -> Result<String> {
        debug!("exec: {}", cmd);
        let output = Command::new(&cmd.program)
            .args(&cmd.args)
            .output()
            .map_err(|e| Error::Execution {
                command: cmd.to_string(),
                message: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            debug!("exec: {}: {}", cmd, output.status);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut message = stdout.into_owned();
            message.push_str(&stderr);
            return Err(Error::Execution {
                command: cmd.to_string(),
                message: message.trim().to_string(),
            });
        }
        Ok(stdout.trim_end().to_string())
    }
}
