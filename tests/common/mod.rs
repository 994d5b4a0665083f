use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use wtx::git::{Repository, WorktreeManager};

pub fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("spawn git");
    assert!(status.success(), "git {args:?} failed in {}", dir.display());
}

/// A fresh repository on `main` with one empty commit, plus a manager
/// whose worktree directory is `<tmp>/worktrees`.
pub fn init_repo() -> (tempfile::TempDir, PathBuf, WorktreeManager) {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let repo = tmp.path().join("project");
    fs::create_dir(&repo).unwrap();
    let repo = repo.canonicalize().unwrap();

    git(&repo, &["init", "-q"]);
    git(&repo, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(&repo, &["config", "user.email", "test@test"]);
    git(&repo, &["config", "user.name", "test"]);
    git(&repo, &["config", "commit.gpgsign", "false"]);
    git(&repo, &["commit", "-q", "--allow-empty", "-m", "init"]);

    let repository = Repository::discover(&repo).unwrap();
    let worktree_root = repository.root.parent().unwrap().join("worktrees");
    let manager = WorktreeManager::new(repository, worktree_root);
    (tmp, repo, manager)
}
