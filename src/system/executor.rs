// src/system/executor.rs

use std::collections::HashMap;
use std::path::Path;
use std::process::{Command as StdCommand, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command could not be parsed: {0}")]
    CommandParse(String),
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, std::io::Error),
    #[error("Command '{command}' exited with status {code}.")]
    NonZeroExitStatus { command: String, code: i32 },
}

/// Runs one fully expanded command line to completion, inheriting the
/// terminal's stdio. Resolved variable bindings arrive as environment
/// variables; `cwd` is the directory of the declaring manifest.
///
/// A leading `-` marks the command as fail-tolerant: its exit status is
/// ignored. An empty command is a success, not an error.
pub fn execute_command(
    command_line: &str,
    cwd: &Path,
    env_vars: &HashMap<String, String>,
) -> Result<(), ExecutionError> {
    let trimmed_command = command_line.trim();
    if trimmed_command.is_empty() {
        return Ok(());
    }

    let (final_command_line, ignore_errors) = match trimmed_command.strip_prefix('-') {
        Some(rest) => (rest.trim(), true),
        None => (trimmed_command, false),
    };

    if final_command_line.is_empty() {
        return Ok(());
    }

    let parts = shlex::split(final_command_line)
        .ok_or_else(|| ExecutionError::CommandParse(final_command_line.to_string()))?;
    let Some((program, args)) = parts.split_first() else {
        return Ok(());
    };

    let status = StdCommand::new(program)
        .args(args)
        .current_dir(cwd)
        .envs(env_vars)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|e| ExecutionError::CommandFailed(final_command_line.to_string(), e))?;

    if !status.success() && !ignore_errors {
        return Err(ExecutionError::NonZeroExitStatus {
            command: final_command_line.to_string(),
            code: status.code().unwrap_or(-1),
        });
    }
    Ok(())
}
