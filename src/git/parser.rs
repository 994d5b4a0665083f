//! Parser for `git worktree list --porcelain`.
//!
//! The listing is a sequence of blank-line separated blocks, one per
//! worktree, each made of `key value` lines:
//!
//! ```text
//! worktree /home/me/project
//! HEAD 1f0c2e...
//! branch refs/heads/main
//!
//! worktree /home/me/worktrees/feature-x
//! HEAD 9ab41d...
//! branch refs/heads/feature-x
//! ```
//!
//! Parsing never fails. Unknown keys and lines without a value are skipped,
//! and blocks without a `worktree` line produce no record.

use std::path::{Path, PathBuf};

const BARE_MARKER: &str = "bare";
const BRANCH_PREFIX: &str = "refs/heads/";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Worktree {
    pub name: String,
    pub path: PathBuf,
    pub branch: String,
    pub head: String,
    pub is_main: bool,
}

#[derive(Default)]
struct BlockBuilder {
    path: Option<PathBuf>,
    branch: String,
    head: String,
    bare: bool,
}

impl BlockBuilder {
    fn apply(&mut self, line: &str) {
        let line = line.trim();
        if line == BARE_MARKER {
            self.bare = true;
            return;
        }

        let Some((key, value)) = line.split_once(' ') else {
            return;
        };

        match key {
            "worktree" => self.path = Some(PathBuf::from(value)),
            "HEAD" => self.head = value.to_string(),
            "branch" => {
                self.branch = value
                    .strip_prefix(BRANCH_PREFIX)
                    .unwrap_or(value)
                    .to_string()
            }
            _ => {}
        }
    }

    fn finish(self) -> Option<Worktree> {
        let path = self.path?;
        Some(Worktree {
            name: worktree_name(&path),
            path,
            branch: self.branch,
            head: self.head,
            is_main: self.bare,
        })
    }
}

pub fn parse_worktree_list(output: &str) -> Vec<Worktree> {
    let mut worktrees = Vec::new();
    let mut current: Option<BlockBuilder> = None;

    for line in output.lines() {
        if line.trim().is_empty() {
            if let Some(wt) = current.take().and_then(BlockBuilder::finish) {
                worktrees.push(wt);
            }
            continue;
        }
        current.get_or_insert_with(BlockBuilder::default).apply(line);
    }

    // Output without a trailing blank line still closes its last block.
    if let Some(wt) = current.take().and_then(BlockBuilder::finish) {
        worktrees.push(wt);
    }

    mark_main(&mut worktrees);
    worktrees
}

/// At most one record is main: the first bare-marked one, or else the
/// first record in listing order.
fn mark_main(worktrees: &mut [Worktree]) {
    let main_idx = worktrees.iter().position(|wt| wt.is_main).unwrap_or(0);
    for (idx, wt) in worktrees.iter_mut().enumerate() {
        wt.is_main = idx == main_idx;
    }
}

fn worktree_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
