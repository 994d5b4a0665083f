use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, WtxError};
use crate::git::aggregator::{StatusAggregator, StatusMap};
use crate::git::command;
use crate::git::parser::{parse_worktree_list, Worktree};
use crate::git::repo::Repository;
use crate::git::status::{GitStatusProber, Status, StatusProbe};
use crate::validation::WorktreeValidator;

pub const DEFAULT_BASE_BRANCH: &str = "main";
const REMOTE: &str = "origin";

/// Create/remove/prune/list operations against git's worktree bookkeeping.
///
/// Not meant to be driven from several threads at once; only the status
/// fan-out in [`WorktreeManager::probe_all`] runs in parallel.
pub struct WorktreeManager {
    repo: Repository,
    worktree_root: PathBuf,
    validator: WorktreeValidator,
    aggregator: StatusAggregator<GitStatusProber>,
}

impl WorktreeManager {
    pub fn new(repo: Repository, worktree_root: PathBuf) -> Self {
        Self {
            repo,
            worktree_root,
            validator: WorktreeValidator::new(),
            aggregator: StatusAggregator::new(GitStatusProber::new()),
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn worktree_root(&self) -> &Path {
        &self.worktree_root
    }

    pub fn target_path(&self, name: &str) -> PathBuf {
        self.worktree_root.join(name.trim())
    }

    pub fn list(&self) -> Result<Vec<Worktree>> {
        let stdout = command::run(&self.repo.root, &["worktree", "list", "--porcelain"])?;
        Ok(parse_worktree_list(&stdout))
    }

    /// Looks a worktree up by the path `add` would give `name`.
    ///
    /// Failing that, a linked worktree whose directory is called `name` is
    /// accepted, but only when exactly one matches. The main worktree is
    /// never found by directory name.
    pub fn find(&self, name: &str) -> Result<Option<Worktree>> {
        let target = self.target_path(name);
        let worktrees = self.list()?;
        Ok(select_worktree(worktrees, &target, name.trim()))
    }

    /// Creates `<worktree_root>/<name>` checked out on `branch`.
    ///
    /// An existing local or `origin` branch is attached as-is; otherwise the
    /// branch is created from `base_branch`. Empty `branch` falls back to
    /// the name and empty `base_branch` to `main`.
    pub fn add(&self, name: &str, branch: &str, base_branch: &str) -> Result<PathBuf> {
        self.validator.validate_name(name)?;
        self.validator.validate_branch(branch)?;
        self.validator.validate_branch(base_branch)?;

        let name = name.trim();
        let branch = match branch.trim() {
            "" => name,
            branch => branch,
        };
        let base = match base_branch.trim() {
            "" => DEFAULT_BASE_BRANCH,
            base => base,
        };

        let path = self.target_path(name);
        let path_arg = path.to_string_lossy();

        if self.branch_exists(branch)? {
            debug!(branch, "attaching worktree to existing branch");
            command::run(&self.repo.root, &["worktree", "add", &path_arg, branch])?;
        } else {
            debug!(branch, base, "creating branch for new worktree");
            command::run(
                &self.repo.root,
                &["worktree", "add", "-b", branch, &path_arg, base],
            )?;
        }

        info!(name, branch, path = %path.display(), "created worktree");
        Ok(path)
    }

    /// Local `refs/heads/<branch>` first, then `refs/remotes/origin/<branch>`.
    /// A missing ref is `false`, not an error.
    pub fn branch_exists(&self, branch: &str) -> Result<bool> {
        let local = format!("refs/heads/{branch}");
        if command::succeeds(&self.repo.root, &["show-ref", "--verify", "--quiet", &local])? {
            return Ok(true);
        }

        let remote = format!("refs/remotes/{REMOTE}/{branch}");
        command::succeeds(&self.repo.root, &["show-ref", "--verify", "--quiet", &remote])
    }

    /// `git worktree remove [--force]`. Without `force` git refuses a
    /// worktree with tracked or untracked changes; the caller decides
    /// whether to retry forced.
    pub fn remove(&self, name: &str, force: bool) -> Result<()> {
        let target = self
            .find(name)?
            .map(|wt| wt.path.to_string_lossy().to_string())
            .unwrap_or_else(|| name.to_string());

        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&target);

        command::run(&self.repo.root, &args)?;
        info!(name, force, "removed worktree");
        Ok(())
    }

    pub fn status(&self, worktree_path: &Path) -> Result<Status> {
        self.aggregator.prober().probe(worktree_path)
    }

    pub fn is_clean(&self, worktree_path: &Path) -> Result<bool> {
        Ok(self.status(worktree_path)?.clean)
    }

    pub fn probe_all(&self, worktrees: &[Worktree]) -> StatusMap {
        self.aggregator.probe_all(worktrees)
    }

    /// `git worktree prune`: drops git's records of worktrees whose
    /// directories are gone. Local metadata is untouched.
    pub fn prune(&self) -> Result<()> {
        command::run(&self.repo.root, &["worktree", "prune"])?;
        info!("pruned stale worktree records");
        Ok(())
    }

    pub fn require(&self, name: &str) -> Result<Worktree> {
        self.find(name)?
            .ok_or_else(|| WtxError::WorktreeNotFound(name.to_string()))
    }
}

fn select_worktree(worktrees: Vec<Worktree>, target: &Path, name: &str) -> Option<Worktree> {
    if let Some(exact) = worktrees.iter().position(|wt| wt.path == target) {
        return worktrees.into_iter().nth(exact);
    }

    let mut by_name = worktrees
        .into_iter()
        .filter(|wt| !wt.is_main && wt.name == name);
    let found = by_name.next()?;
    if by_name.next().is_some() {
        debug!(name, "worktree name is ambiguous");
        return None;
    }
    Some(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::test_support::{git, make_temp_repo};
    use crate::validation::ValidationError;
    use std::fs;

    fn manager_for(repo: &Path) -> WorktreeManager {
        let repository = Repository::discover(repo).unwrap();
        let root = repository.root.parent().unwrap().join("worktrees");
        WorktreeManager::new(repository, root)
    }

    #[test]
    fn test_list_fresh_repo() {
        let (_tmp, repo) = make_temp_repo();
        let manager = manager_for(&repo);

        let worktrees = manager.list().unwrap();
        assert_eq!(worktrees.len(), 1);
        assert!(worktrees[0].is_main);
        assert_eq!(worktrees[0].branch, "main");
        assert_eq!(worktrees[0].path, repo);
    }

    #[test]
    fn test_add_creates_branch_from_base() {
        let (_tmp, repo) = make_temp_repo();
        let manager = manager_for(&repo);

        let path = manager.add("feature-x", "", "").unwrap();
        assert!(path.is_dir());
        assert_eq!(path, repo.parent().unwrap().join("worktrees/feature-x"));
        assert!(manager.branch_exists("feature-x").unwrap());

        let worktrees = manager.list().unwrap();
        assert_eq!(worktrees.len(), 2);
        let added = worktrees.iter().find(|wt| wt.name == "feature-x").unwrap();
        assert_eq!(added.branch, "feature-x");
        assert!(!added.is_main);
    }

    #[test]
    fn test_add_attaches_existing_branch() {
        let (_tmp, repo) = make_temp_repo();
        git(&repo, &["branch", "already-here"]);
        let manager = manager_for(&repo);

        let path = manager.add("attach", "already-here", "").unwrap();
        let wt = manager.find("attach").unwrap().unwrap();
        assert_eq!(wt.path, path);
        assert_eq!(wt.branch, "already-here");
    }

    #[test]
    fn test_add_detects_remote_tracking_branch() {
        let (_tmp, repo) = make_temp_repo();
        git(&repo, &["update-ref", "refs/remotes/origin/from-remote", "HEAD"]);
        let manager = manager_for(&repo);

        assert!(manager.branch_exists("from-remote").unwrap());
        assert!(!manager.branch_exists("nowhere").unwrap());
    }

    #[test]
    fn test_add_rejects_invalid_input_before_git() {
        let (_tmp, repo) = make_temp_repo();
        let manager = manager_for(&repo);

        assert!(matches!(
            manager.add("", "x", "main"),
            Err(WtxError::Validation(ValidationError::Empty(_)))
        ));
        assert!(matches!(
            manager.add("ok", "bad..branch", "main"),
            Err(WtxError::Validation(ValidationError::ForbiddenSequence(_)))
        ));
        assert!(!manager.target_path("ok").exists());
    }

    #[test]
    fn test_add_unknown_base_reports_git_output() {
        let (_tmp, repo) = make_temp_repo();
        let manager = manager_for(&repo);

        match manager.add("nobase", "", "no-such-base") {
            Err(WtxError::ExternalTool { command, output }) => {
                assert!(command.starts_with("git worktree add -b nobase"));
                assert!(!output.is_empty());
            }
            other => panic!("Expected ExternalTool, got {other:?}"),
        }
        assert_eq!(manager.list().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_dirty_requires_force() {
        let (_tmp, repo) = make_temp_repo();
        let manager = manager_for(&repo);
        let path = manager.add("dirty", "", "main").unwrap();
        fs::write(path.join("untracked.txt"), "wip").unwrap();

        assert!(!manager.is_clean(&path).unwrap());
        assert!(manager.remove("dirty", false).unwrap_err().is_external_tool());
        assert_eq!(manager.list().unwrap().len(), 2);

        manager.remove("dirty", true).unwrap();
        assert_eq!(manager.list().unwrap().len(), 1);
        assert!(!path.exists());
    }

    #[test]
    fn test_remove_unknown_worktree_fails() {
        let (_tmp, repo) = make_temp_repo();
        let manager = manager_for(&repo);
        assert!(manager.remove("ghost", false).unwrap_err().is_external_tool());
        assert!(matches!(
            manager.require("ghost"),
            Err(WtxError::WorktreeNotFound(_))
        ));
    }

    #[test]
    fn test_remove_prefers_exact_path_over_directory_name() {
        let (_tmp, repo) = make_temp_repo();
        let manager = manager_for(&repo);
        let nested = manager.add("feat/login", "feat-login", "main").unwrap();
        let flat = manager.add("login", "", "main").unwrap();
        fs::write(nested.join("wip.txt"), "keep me").unwrap();

        assert_eq!(manager.find("login").unwrap().unwrap().path, flat);
        assert_eq!(manager.find("feat/login").unwrap().unwrap().path, nested);

        manager.remove("login", true).unwrap();
        assert!(!flat.exists());
        assert!(nested.join("wip.txt").is_file());
        assert_eq!(manager.list().unwrap().len(), 2);
    }

    #[test]
    fn test_find_by_directory_name_when_unique() {
        let (_tmp, repo) = make_temp_repo();
        let manager = manager_for(&repo);
        let nested = manager.add("feat/login", "", "main").unwrap();

        assert_eq!(manager.find("login").unwrap().unwrap().path, nested);

        manager.add("fix/login", "", "main").unwrap();
        assert!(manager.find("login").unwrap().is_none());
        assert!(matches!(
            manager.require("login"),
            Err(WtxError::WorktreeNotFound(_))
        ));
    }

    #[test]
    fn test_worktree_named_like_repository_directory() {
        let (_tmp, repo) = make_temp_repo();
        let manager = manager_for(&repo);
        let name = repo.file_name().unwrap().to_string_lossy().to_string();

        let path = manager.add(&name, "", "main").unwrap();
        let found = manager.find(&name).unwrap().unwrap();
        assert_eq!(found.path, path);
        assert!(!found.is_main);

        manager.remove(&name, true).unwrap();
        assert!(!path.exists());
        assert!(repo.join(".git").exists());
        assert_eq!(manager.list().unwrap().len(), 1);
    }

    #[test]
    fn test_main_worktree_is_not_found_by_directory_name() {
        let (_tmp, repo) = make_temp_repo();
        let manager = manager_for(&repo);
        let name = repo.file_name().unwrap().to_string_lossy().to_string();

        assert!(manager.find(&name).unwrap().is_none());
    }

    #[test]
    fn test_add_rejects_option_like_branches() {
        let (_tmp, repo) = make_temp_repo();
        let manager = manager_for(&repo);

        assert!(matches!(
            manager.add("opt", "-f", "main"),
            Err(WtxError::Validation(ValidationError::LeadingDash))
        ));
        assert!(matches!(
            manager.add("opt", "", "--detach"),
            Err(WtxError::Validation(ValidationError::LeadingDash))
        ));
        assert!(matches!(
            manager.add("opt", "", "bad..base"),
            Err(WtxError::Validation(ValidationError::ForbiddenSequence(_)))
        ));
        assert!(!manager.target_path("opt").exists());
        assert_eq!(manager.list().unwrap().len(), 1);
    }

    #[test]
    fn test_prune_forgets_deleted_directory() {
        let (_tmp, repo) = make_temp_repo();
        let manager = manager_for(&repo);
        let path = manager.add("vanishing", "", "main").unwrap();
        fs::remove_dir_all(&path).unwrap();

        assert_eq!(manager.list().unwrap().len(), 2);
        manager.prune().unwrap();
        assert_eq!(manager.list().unwrap().len(), 1);
    }

    #[test]
    fn test_probe_all_skips_missing_worktree() {
        let (_tmp, repo) = make_temp_repo();
        let manager = manager_for(&repo);
        manager.add("kept", "", "main").unwrap();
        let gone = manager.add("gone", "", "main").unwrap();
        fs::remove_dir_all(&gone).unwrap();

        let worktrees = manager.list().unwrap();
        assert_eq!(worktrees.len(), 3);
        let statuses = manager.probe_all(&worktrees);
        assert_eq!(statuses.len(), 2);
        assert!(!statuses.contains_key(&gone));
    }
}
