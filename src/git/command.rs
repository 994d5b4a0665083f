use std::path::Path;
use std::process::{Command, Output, Stdio};

use tracing::debug;

use crate::error::{Result, WtxError};

const GIT_BIN: &str = "git";

/// Runs `git <args>` in `dir`, returning stdout on success.
///
/// A nonzero exit becomes [`WtxError::ExternalTool`] carrying stdout and
/// stderr verbatim; exit 0 with empty stdout is a valid empty result.
pub fn run(dir: &Path, args: &[&str]) -> Result<String> {
    let output = spawn(dir, args)?;

    if !output.status.success() {
        return Err(WtxError::external(describe(args), combined(&output)));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Runs `git <args>` in `dir` and reports only whether it exited 0.
///
/// Used for queries where a nonzero exit means "no" (`show-ref --verify`).
/// Failing to launch git at all is still an error.
pub fn succeeds(dir: &Path, args: &[&str]) -> Result<bool> {
    Ok(spawn(dir, args)?.status.success())
}

/// Runs `git <args>` and hands back the raw output for callers that need
/// to tell a launch failure apart from a nonzero exit.
pub fn spawn(dir: &Path, args: &[&str]) -> Result<Output> {
    debug!(dir = %dir.display(), command = %describe(args), "running git");

    Command::new(GIT_BIN)
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stderr(Stdio::piped())
        .stdout(Stdio::piped())
        .output()
        .map_err(|err| WtxError::external(describe(args), err.to_string()))
}

pub fn combined(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut text = String::with_capacity(stdout.len() + stderr.len());
    text.push_str(&stdout);
    text.push_str(&stderr);
    text.trim_end().to_string()
}

fn describe(args: &[&str]) -> String {
    format!("{GIT_BIN} {}", args.join(" "))
}
