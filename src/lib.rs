//! Persistent, named git worktrees: list/add/remove/prune them, probe their
//! status in parallel, and keep per-worktree metadata next to the repo.

pub mod cleanup;
pub mod config;
pub mod context;
pub mod editor;
pub mod error;
pub mod git;
pub mod logging;
pub mod metadata;
pub mod ports;
pub mod validation;

pub use error::{Result, WtxError};
