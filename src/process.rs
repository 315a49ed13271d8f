//! Structured subprocess invocation
//!
//! Every external tool (git, rpm, rpmbuild, mock, tar, scp) is run through
//! [`Invocation`], which takes an argument vector, pipes stdio, and returns a
//! structured [`RunOutput`]. Shell-interpolated command strings are never
//! constructed anywhere in this crate.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

/// Errors from running an external tool
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The tool could not be started at all (usually: not installed)
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and exited non-zero (only from [`Invocation::run_checked`])
    #[error("{program} exited with status {status}: {stderr}")]
    Failed {
        program: String,
        status: i32,
        stderr: String,
    },
}

impl ProcessError {
    /// True when the underlying tool could not even be started
    pub fn is_tool_missing(&self) -> bool {
        matches!(
            self,
            ProcessError::Spawn { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

/// Captured result of a finished subprocess
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Exit status code (-1 when terminated by a signal)
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// One external tool invocation, built from an argument vector
#[derive(Debug, Clone)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Run the tool and capture its output; a non-zero exit is returned in
    /// [`RunOutput`] for the caller to interpret, not raised as an error.
    pub fn run(&self) -> Result<RunOutput, ProcessError> {
        debug!(program = %self.program, args = ?self.args, "running command");

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(ref cwd) = self.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &self.envs {
            command.env(key, value);
        }

        let child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let output = child
            .wait_with_output()
            .map_err(|source| ProcessError::Io {
                program: self.program.clone(),
                source,
            })?;

        let result = RunOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success() {
            debug!(
                program = %self.program,
                status = result.status,
                stderr = %result.stderr.trim(),
                "command exited non-zero"
            );
        }

        Ok(result)
    }

    /// Run the tool and treat a non-zero exit as an error
    pub fn run_checked(&self) -> Result<RunOutput, ProcessError> {
        let output = self.run()?;
        if output.success() {
            Ok(output)
        } else {
            Err(ProcessError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}
