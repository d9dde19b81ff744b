//! Thin wrapper around external command-line tools.
//!
//! Every tool invocation in the crate goes through [`ToolCommand`] so that spawn
//! failures, non-zero exits and missing outputs all surface as a [`ToolError`].

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;

/// Maximum number of stderr bytes kept in an error message
const STDERR_LIMIT: usize = 2000;

#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    #[error("{program} is not installed or not on PATH")]
    NotInstalled {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Expected output not found: {}", .path.display())]
    MissingOutput { path: PathBuf },

    #[error("Failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {program} output: {reason}")]
    Parse { program: String, reason: String },
}

/// Builder for a single tool invocation
pub struct ToolCommand {
    program: String,
    command: Command,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        let mut command = Command::new(&program);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        Self { program, command }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.command.arg(arg);
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.command.args(args);
        self
    }

    /// Run to completion and return the captured output on success
    pub async fn run(mut self) -> Result<Output, ToolError> {
        tracing::debug!(program = %self.program, "Running external tool");

        let output = self.command.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::NotInstalled {
                    program: self.program.clone(),
                    source: e,
                }
            } else {
                ToolError::Io {
                    program: self.program.clone(),
                    source: e,
                }
            }
        })?;

        if !output.status.success() {
            let status = output
                .status
                .code()
                .map(|code| format!("exit code {}", code))
                .unwrap_or_else(|| "signal".to_string());

            return Err(ToolError::Failed {
                program: self.program,
                status,
                stderr: truncate_stderr(&output.stderr),
            });
        }

        Ok(output)
    }

    /// Run and return stdout as UTF-8 text
    pub async fn run_stdout(self) -> Result<String, ToolError> {
        let program = self.program.clone();
        let output = self.run().await?;

        String::from_utf8(output.stdout).map_err(|e| ToolError::Parse {
            program,
            reason: e.to_string(),
        })
    }
}

/// Check that a file produced by a tool actually exists
pub fn expect_output(path: &Path) -> Result<PathBuf, ToolError> {
    if path.is_file() {
        Ok(path.to_path_buf())
    } else {
        Err(ToolError::MissingOutput {
            path: path.to_path_buf(),
        })
    }
}

/// Check if a command is available in PATH
pub async fn is_available(program: &str, version_flag: &str) -> bool {
    ToolCommand::new(program).arg(version_flag).run().await.is_ok()
}

fn truncate_stderr(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();

    if text.len() > STDERR_LIMIT {
        // Keep the tail, that is where tools print the actual failure
        let mut start = text.len() - STDERR_LIMIT;
        while !text.is_char_boundary(start) {
            start += 1;
        }
        format!("...{}", &text[start..])
    } else {
        text.to_string()
    }
}
