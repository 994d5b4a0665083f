use std::path::Path;

use tracing::debug;

use crate::error::{Result, WtxError};
use crate::git::command;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Status {
    pub clean: bool,
    pub ahead: u32,
    pub behind: u32,
    pub has_changes: bool,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            clean: true,
            ahead: 0,
            behind: 0,
            has_changes: false,
        }
    }
}

impl Status {
    pub fn label(&self) -> &'static str {
        if self.clean { "clean" } else { "dirty" }
    }
}

/// Result of comparing HEAD with its upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upstream {
    Tracking { ahead: u32, behind: u32 },
    /// No upstream configured (or git refused the comparison). Expected,
    /// and reported as zero ahead/behind.
    Absent,
}

/// Something that can report the status of a single worktree.
pub trait StatusProbe {
    fn probe(&self, worktree_path: &Path) -> Result<Status>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct GitStatusProber;

impl GitStatusProber {
    pub fn new() -> Self {
        Self
    }

    /// `git status --porcelain`; any output means the tree is dirty.
    pub fn has_changes(&self, worktree_path: &Path) -> Result<bool> {
        let stdout = command::run(worktree_path, &["status", "--porcelain"])?;
        Ok(!stdout.trim().is_empty())
    }

    /// `git rev-list --left-right --count HEAD...@{upstream}`.
    ///
    /// A nonzero exit is [`Upstream::Absent`]; only a failure to launch git
    /// is an error.
    pub fn upstream(&self, worktree_path: &Path) -> Result<Upstream> {
        let output = command::spawn(
            worktree_path,
            &["rev-list", "--left-right", "--count", "HEAD...@{upstream}"],
        )?;

        if !output.status.success() {
            debug!(
                path = %worktree_path.display(),
                "no upstream to compare against: {}",
                command::combined(&output)
            );
            return Ok(Upstream::Absent);
        }

        Ok(parse_left_right(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl StatusProbe for GitStatusProber {
    fn probe(&self, worktree_path: &Path) -> Result<Status> {
        if !worktree_path.is_dir() {
            return Err(WtxError::external(
                "git status --porcelain",
                format!("{} is not a directory", worktree_path.display()),
            ));
        }

        let has_changes = self.has_changes(worktree_path)?;
        let (ahead, behind) = match self.upstream(worktree_path)? {
            Upstream::Tracking { ahead, behind } => (ahead, behind),
            Upstream::Absent => (0, 0),
        };

        Ok(Status {
            clean: !has_changes,
            ahead,
            behind,
            has_changes,
        })
    }
}

/// Parses the `<ahead>\t<behind>` pair; unparseable halves count as zero.
pub fn parse_left_right(output: &str) -> Upstream {
    let mut parts = output.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(left), Some(right), None) => Upstream::Tracking {
            ahead: left.parse().unwrap_or(0),
            behind: right.parse().unwrap_or(0),
        },
        _ => Upstream::Tracking {
            ahead: 0,
            behind: 0,
        },
    }
}
