use std::path::{Path, PathBuf};

use crate::error::{Result, WtxError};
use crate::git::command;

/// The primary checkout of a repository, resolved from any directory
/// inside it (including linked worktrees).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub root: PathBuf,
    pub git_dir: PathBuf,
}

impl Repository {
    pub fn discover(start: &Path) -> Result<Self> {
        let start = start
            .canonicalize()
            .map_err(|err| WtxError::io(format!("failed to resolve {}", start.display()), err))?;

        let output = command::spawn(&start, &["rev-parse", "--git-common-dir"])?;
        if !output.status.success() {
            return Err(WtxError::NotARepository(start));
        }

        let raw = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if raw.is_empty() {
            return Err(WtxError::NotARepository(start));
        }

        let git_dir = start.join(raw);
        let git_dir = git_dir
            .canonicalize()
            .map_err(|err| WtxError::io(format!("failed to resolve {}", git_dir.display()), err))?;

        // Non-bare repositories keep their control directory at `<root>/.git`.
        let root = match git_dir.file_name() {
            Some(name) if name == ".git" => git_dir
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| git_dir.clone()),
            _ => git_dir.clone(),
        };

        Ok(Self { root, git_dir })
    }

    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "repo".to_string())
    }
}

pub fn is_git_installed() -> bool {
    std::env::current_dir()
        .ok()
        .and_then(|dir| command::succeeds(&dir, &["--version"]).ok())
        .unwrap_or(false)
}
