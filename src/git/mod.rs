pub mod aggregator;
pub mod command;
pub mod parser;
pub mod repo;
pub mod status;
pub mod worktree;

pub use aggregator::{StatusAggregator, StatusMap, MAX_STATUS_WORKERS};
pub use parser::{parse_worktree_list, Worktree};
pub use repo::Repository;
pub use status::{GitStatusProber, Status, StatusProbe, Upstream};
pub use worktree::WorktreeManager;
