// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Execution of the external load-test process.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::error::ExecutionError;

/// Runs a program to completion and returns its combined output.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs `program` with `args`; `env` holds extra `KEY=VALUE` entries added
    /// on top of the inherited environment.
    async fn execute(
        &self,
        program: &str,
        args: &[String],
        env: &[String],
    ) -> Result<String, ExecutionError>;
}

/// [`ProcessRunner`] backed by a tokio child process.
///
/// The child is awaited without a timeout. Stdout and stderr are merged line by
/// line in the order they arrive.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubprocessRunner;

#[async_trait]
impl ProcessRunner for SubprocessRunner {
    async fn execute(
        &self,
        program: &str,
        args: &[String],
        env: &[String],
    ) -> Result<String, ExecutionError> {
        let launch_error = |source| ExecutionError::Launch {
            command: program.to_string(),
            args: args.to_vec(),
            source,
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for entry in env {
            match entry.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    command.env(key, value);
                },
                _ => tracing::warn!(entry = %entry, "Ignoring malformed environment entry"),
            }
        }

        tracing::info!(command = %program, args = %args.join(" "), "Running load test");
        let mut child = command.spawn().map_err(launch_error)?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(launch_error(std::io::Error::other("child output was not captured")));
        };
        let mut stdout = BufReader::new(stdout);
        let mut stderr = BufReader::new(stderr);
        let mut stdout_line = Vec::new();
        let mut stderr_line = Vec::new();

        let mut output = String::new();
        let mut stdout_open = true;
        let mut stderr_open = true;
        while stdout_open || stderr_open {
            tokio::select! {
                read = stdout.read_until(b'\n', &mut stdout_line), if stdout_open => {
                    stdout_open = push_line(&mut output, &mut stdout_line, read);
                },
                read = stderr.read_until(b'\n', &mut stderr_line), if stderr_open => {
                    stderr_open = push_line(&mut output, &mut stderr_line, read);
                },
            }
        }

        let status = child.wait().await.map_err(launch_error)?;
        if status.success() {
            tracing::debug!(command = %program, bytes = output.len(), "Load test finished");
            Ok(output)
        } else {
            Err(ExecutionError::Failed {
                command: program.to_string(),
                args: args.to_vec(),
                status: status.to_string(),
                output,
            })
        }
    }
}

/// Moves a raw line into `output`, replacing invalid UTF-8; returns whether
/// the stream is still open.
fn push_line(output: &mut String, line: &mut Vec<u8>, read: std::io::Result<usize>) -> bool {
    let open = match read {
        Ok(0) => false,
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Stopped reading load test output");
            false
        },
    };
    if !line.is_empty() {
        output.push_str(&String::from_utf8_lossy(line));
        if !output.ends_with('\n') {
            output.push('\n');
        }
        line.clear();
    }
    open
}
