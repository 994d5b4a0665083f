//! Batch removal of worktrees that have not been opened for a while, and
//! reconciliation of metadata with what git actually has.

use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;
use crate::git::{Worktree, WorktreeManager};
use crate::metadata::{MetadataStore, WorktreeMetadata};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaleCandidate {
    pub name: String,
    pub worktree: Worktree,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl CleanupReport {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

fn matches(meta: &WorktreeMetadata, wt: &Worktree) -> bool {
    wt.path == Path::new(&meta.path) || wt.name == meta.name
}

/// Stale entries that still have a live, clean, non-main worktree.
/// Orphaned metadata and worktrees that are dirty or cannot be probed are
/// left out.
pub fn plan_stale(
    manager: &WorktreeManager,
    store: &MetadataStore,
    max_age_days: u32,
) -> Result<Vec<StaleCandidate>> {
    let stale = store.get_stale(max_age_days);
    if stale.is_empty() {
        return Ok(Vec::new());
    }

    let live = manager.list()?;
    let mut candidates: Vec<StaleCandidate> = stale
        .into_iter()
        .filter_map(|name| {
            let meta = store.get(&name)?;
            let worktree = live.iter().find(|wt| !wt.is_main && matches(meta, wt))?;
            Some(StaleCandidate {
                name,
                worktree: worktree.clone(),
            })
        })
        .collect();

    let worktrees: Vec<Worktree> = candidates.iter().map(|c| c.worktree.clone()).collect();
    let statuses = manager.probe_all(&worktrees);
    candidates.retain(|c| {
        statuses
            .get(&c.worktree.path)
            .is_some_and(|status| status.clean)
    });
    candidates.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(candidates)
}

/// Removes each named worktree without forcing and drops its metadata on
/// success. Failures are collected; the batch always runs to the end.
pub fn remove_all<'a, I>(
    manager: &WorktreeManager,
    store: &mut MetadataStore,
    names: I,
) -> CleanupReport
where
    I: IntoIterator<Item = &'a str>,
{
    let mut report = CleanupReport::default();
    for name in names {
        match manager.remove(name, false) {
            Ok(()) => {
                store.remove(name);
                report.removed.push(name.to_string());
            }
            Err(err) => {
                warn!(name, "failed to remove stale worktree: {err}");
                report.failed.push((name.to_string(), err.to_string()));
            }
        }
    }
    info!(
        removed = report.removed.len(),
        failed = report.failed.len(),
        "stale worktree cleanup finished"
    );
    report
}

/// Drops metadata entries that no longer match any live worktree.
pub fn forget_orphans(store: &mut MetadataStore, live: &[Worktree]) -> Vec<String> {
    let orphans: Vec<String> = store
        .worktrees
        .values()
        .filter(|meta| !live.iter().any(|wt| matches(meta, wt)))
        .map(|meta| meta.name.clone())
        .collect();

    for name in &orphans {
        store.remove(name);
    }
    orphans
}
