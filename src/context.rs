use std::path::{Path, PathBuf};

use crate::config::{self, Config};
use crate::editor::EditorKind;
use crate::error::Result;
use crate::git::{Repository, WorktreeManager};
use crate::metadata::MetadataStore;

/// Everything a command needs, built once in `main` and passed down.
pub struct AppContext {
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub first_run: bool,
    pub manager: WorktreeManager,
    pub store: MetadataStore,
}

impl AppContext {
    pub fn discover(cwd: &Path) -> Result<Self> {
        let config_path = config::config_path();
        let (config, first_run) = match &config_path {
            Some(path) => Config::load_with_status(path)?,
            None => (Config::default(), true),
        };
        Self::with_config(cwd, config, config_path, first_run)
    }

    pub fn with_config(
        cwd: &Path,
        config: Config,
        config_path: Option<PathBuf>,
        first_run: bool,
    ) -> Result<Self> {
        let repo = Repository::discover(cwd)?;
        let store = MetadataStore::load(&repo)?;
        let worktree_root = config.worktree_root(&repo.root);
        let manager = WorktreeManager::new(repo, worktree_root);

        Ok(Self {
            config,
            config_path,
            first_run,
            manager,
            store,
        })
    }

    pub fn editor(&self) -> EditorKind {
        let env_editor = std::env::var("EDITOR").ok();
        EditorKind::detect(self.config.editor, env_editor.as_deref())
    }
}
