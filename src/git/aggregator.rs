//! Fans status probes out over a bounded pool of worker threads.
//!
//! Every probe spawns git processes, so the pool is capped at
//! [`MAX_STATUS_WORKERS`]. Workers pull paths from a shared queue until it
//! drains; results land in a mutex-guarded map keyed by path. A failed probe
//! is logged and left out of the map, it never aborts the batch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Mutex, PoisonError};
use std::thread;

use tracing::{debug, warn};

use crate::git::parser::Worktree;
use crate::git::status::{Status, StatusProbe};

pub const MAX_STATUS_WORKERS: usize = 10;

pub type StatusMap = HashMap<PathBuf, Status>;

pub struct StatusAggregator<P> {
    prober: P,
    max_workers: usize,
}

impl<P: StatusProbe + Sync> StatusAggregator<P> {
    pub fn new(prober: P) -> Self {
        Self {
            prober,
            max_workers: MAX_STATUS_WORKERS,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn prober(&self) -> &P {
        &self.prober
    }

    /// Number of threads used for `items` jobs: never more than the cap,
    /// never zero for a nonempty batch.
    pub fn pool_size(&self, items: usize) -> usize {
        items.min(self.max_workers)
    }

    pub fn probe_all(&self, worktrees: &[Worktree]) -> StatusMap {
        self.probe_paths(worktrees.iter().map(|wt| wt.path.as_path()))
    }

    pub fn probe_paths<'a, I>(&self, paths: I) -> StatusMap
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let (job_tx, job_rx) = mpsc::channel::<PathBuf>();
        let mut queued = 0usize;
        for path in paths {
            // The receiver is alive until this function returns.
            let _ = job_tx.send(path.to_path_buf());
            queued += 1;
        }
        drop(job_tx);

        let results = Mutex::new(StatusMap::with_capacity(queued));
        if queued == 0 {
            return results.into_inner().unwrap_or_else(PoisonError::into_inner);
        }

        let job_rx = Mutex::new(job_rx);
        let workers = self.pool_size(queued);
        debug!(queued, workers, "probing worktree status");

        thread::scope(|scope| {
            let mut spawned = 0usize;
            for idx in 0..workers {
                let result = thread::Builder::new()
                    .name(format!("wtx-status-{idx}"))
                    .spawn_scoped(scope, || self.drain(&job_rx, &results));
                match result {
                    Ok(_) => spawned += 1,
                    Err(err) => warn!("failed to spawn status worker {idx}: {err}"),
                }
            }

            if spawned == 0 {
                self.drain(&job_rx, &results);
            }
        });

        results.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn drain(&self, jobs: &Mutex<Receiver<PathBuf>>, results: &Mutex<StatusMap>) {
        loop {
            let next = jobs
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .recv();
            let Ok(path) = next else {
                break;
            };

            match self.prober.probe(&path) {
                Ok(status) => {
                    results
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(path, status);
                }
                Err(err) => warn!(path = %path.display(), "status probe failed: {err}"),
            }
        }
    }
}
