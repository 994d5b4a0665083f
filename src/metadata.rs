//! Per-repository worktree metadata, persisted as JSON inside the
//! repository's git directory (`.git`, or the repository itself when bare).
//!
//! The store is loaded once, mutated in memory and written back only when
//! the caller asks for it with [`MetadataStore::save`].

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::error::{Result, WtxError};
use crate::git::Repository;

pub const METADATA_FILE: &str = "wtx-meta.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorktreeMetadata {
    pub name: String,
    pub path: String,
    pub branch: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_opened: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub open_count: u32,
}

impl WorktreeMetadata {
    pub fn new(name: impl Into<String>, path: impl Into<String>, branch: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            name: name.into(),
            path: path.into(),
            branch: branch.into(),
            created_at: now,
            last_opened: now,
            dev_command: None,
            ports: Vec::new(),
            open_count: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataStore {
    pub repo_path: String,
    #[serde(default)]
    pub worktrees: BTreeMap<String, WorktreeMetadata>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(skip)]
    location: PathBuf,
}

/// `<git_dir>/wtx-meta.json`
pub fn metadata_path(git_dir: &Path) -> PathBuf {
    git_dir.join(METADATA_FILE)
}

impl MetadataStore {
    pub fn new(repo_path: impl Into<String>, location: PathBuf) -> Self {
        Self {
            repo_path: repo_path.into(),
            worktrees: BTreeMap::new(),
            updated_at: OffsetDateTime::now_utc(),
            location,
        }
    }

    pub fn load(repo: &Repository) -> Result<Self> {
        Self::load_from(&metadata_path(&repo.git_dir), &repo.root)
    }

    /// A missing file yields an empty store. A file that exists but cannot
    /// be read or parsed is an error so user data is never silently reset.
    pub fn load_from(path: &Path, repo_root: &Path) -> Result<Self> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no metadata yet, starting empty");
                return Ok(Self::new(
                    repo_root.to_string_lossy(),
                    path.to_path_buf(),
                ));
            }
            Err(err) => {
                return Err(WtxError::io(
                    format!("failed to read metadata {}", path.display()),
                    err,
                ));
            }
        };

        let mut store: Self = serde_json::from_str(&data).map_err(|source| WtxError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;
        store.location = path.to_path_buf();
        Ok(store)
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Writes the whole store to a temp file next to the target and renames
    /// it over the previous version.
    pub fn save(&mut self) -> Result<()> {
        self.updated_at = OffsetDateTime::now_utc();

        let path = self.location.clone();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                WtxError::io(
                    format!("failed to create metadata directory {}", parent.display()),
                    err,
                )
            })?;
        }

        let tmp = path.with_extension("json.tmp");
        let file = File::create(&tmp)
            .map_err(|err| WtxError::io(format!("failed to create {}", tmp.display()), err))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|err| {
            WtxError::io(
                format!("failed to serialize metadata {}", tmp.display()),
                io::Error::other(err),
            )
        })?;
        writer
            .flush()
            .map_err(|err| WtxError::io(format!("failed to write {}", tmp.display()), err))?;

        fs::rename(&tmp, &path).map_err(|err| {
            WtxError::io(format!("failed to persist metadata {}", path.display()), err)
        })?;
        debug!(path = %path.display(), entries = self.worktrees.len(), "saved metadata");
        Ok(())
    }

    /// Inserts or replaces the entry keyed by `record.name`.
    pub fn add(&mut self, record: WorktreeMetadata) {
        self.worktrees.insert(record.name.clone(), record);
        self.updated_at = OffsetDateTime::now_utc();
    }

    pub fn remove(&mut self, name: &str) -> Option<WorktreeMetadata> {
        let removed = self.worktrees.remove(name);
        if removed.is_some() {
            self.updated_at = OffsetDateTime::now_utc();
        }
        removed
    }

    /// Marks `name` as opened now. Returns false for unknown names.
    pub fn touch(&mut self, name: &str) -> bool {
        let Some(entry) = self.worktrees.get_mut(name) else {
            return false;
        };
        let now = OffsetDateTime::now_utc();
        entry.last_opened = now;
        entry.open_count = entry.open_count.saturating_add(1);
        self.updated_at = now;
        true
    }

    pub fn get(&self, name: &str) -> Option<&WorktreeMetadata> {
        self.worktrees.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.worktrees.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.worktrees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.worktrees.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.worktrees.keys().map(String::as_str)
    }

    pub fn set_dev_command(&mut self, name: &str, command: Option<String>) -> bool {
        let Some(entry) = self.worktrees.get_mut(name) else {
            return false;
        };
        entry.dev_command = command.filter(|c| !c.trim().is_empty());
        self.updated_at = OffsetDateTime::now_utc();
        true
    }

    pub fn set_ports(&mut self, name: &str, mut ports: Vec<u16>) -> bool {
        let Some(entry) = self.worktrees.get_mut(name) else {
            return false;
        };
        ports.sort_unstable();
        ports.dedup();
        entry.ports = ports;
        self.updated_at = OffsetDateTime::now_utc();
        true
    }

    /// Names whose `last_opened` is more than `max_age_days` ago.
    pub fn get_stale(&self, max_age_days: u32) -> Vec<String> {
        self.stale_as_of(OffsetDateTime::now_utc(), max_age_days)
    }

    pub fn stale_as_of(&self, now: OffsetDateTime, max_age_days: u32) -> Vec<String> {
        let cutoff = now - Duration::days(i64::from(max_age_days));
        self.worktrees
            .values()
            .filter(|wt| wt.last_opened < cutoff)
            .map(|wt| wt.name.clone())
            .collect()
    }

    /// Most recently opened first.
    pub fn recent(&self, limit: usize) -> Vec<&WorktreeMetadata> {
        let mut items: Vec<_> = self.worktrees.values().collect();
        items.sort_by(|a, b| b.last_opened.cmp(&a.last_opened));
        items.truncate(limit);
        items
    }

    /// Most opened first; ties go to the more recently opened.
    pub fn frequent(&self, limit: usize) -> Vec<&WorktreeMetadata> {
        let mut items: Vec<_> = self.worktrees.values().collect();
        items.sort_by(|a, b| {
            b.open_count
                .cmp(&a.open_count)
                .then_with(|| b.last_opened.cmp(&a.last_opened))
        });
        items.truncate(limit);
        items
    }

    pub fn by_age(&self, newest_first: bool) -> Vec<&WorktreeMetadata> {
        let mut items: Vec<_> = self.worktrees.values().collect();
        items.sort_by_key(|wt| wt.created_at);
        if newest_first {
            items.reverse();
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MetadataStore {
        MetadataStore::new("/test/repo", PathBuf::from("/test/repo/.git/wtx-meta.json"))
    }

    fn repo_at(root: &Path) -> Repository {
        Repository {
            root: root.to_path_buf(),
            git_dir: root.join(".git"),
        }
    }

    fn record(name: &str, days_ago: i64) -> WorktreeMetadata {
        let mut meta = WorktreeMetadata::new(name, format!("/test/{name}"), name);
        meta.last_opened = OffsetDateTime::now_utc() - Duration::days(days_ago);
        meta.created_at = meta.last_opened;
        meta
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = store();
        assert_eq!(store.repo_path, "/test/repo");
        assert!(store.is_empty());
        assert!(store.get("anything").is_none());
    }

    #[test]
    fn test_add_upserts_by_name() {
        let mut store = store();
        let before = store.updated_at;
        store.add(record("feature", 0));
        let mut replacement = record("feature", 0);
        replacement.branch = "feature/renamed".to_string();
        store.add(replacement);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("feature").unwrap().branch, "feature/renamed");
        assert!(store.updated_at >= before);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut store = store();
        store.add(record("feature", 0));
        let stamp = store.updated_at;

        assert!(store.remove("ghost").is_none());
        assert_eq!(store.updated_at, stamp);
        assert_eq!(store.len(), 1);

        assert!(store.remove("feature").is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_touch_updates_last_opened() {
        let mut store = store();
        store.add(record("feature", 3));
        let original = store.get("feature").unwrap().last_opened;

        assert!(store.touch("feature"));
        let entry = store.get("feature").unwrap();
        assert!(entry.last_opened > original);
        assert_eq!(entry.open_count, 1);

        assert!(!store.touch("ghost"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_stale() {
        let mut store = store();
        store.add(record("fresh", 1));
        store.add(record("stale", 40));

        assert_eq!(store.get_stale(30), vec!["stale".to_string()]);

        let mut all = store.get_stale(0);
        all.sort();
        assert_eq!(all, vec!["fresh".to_string(), "stale".to_string()]);
    }

    #[test]
    fn test_stale_as_of_fixed_clock() {
        let mut store = store();
        let now = OffsetDateTime::now_utc();
        let mut edge = record("edge", 0);
        edge.last_opened = now - Duration::days(30);
        store.add(edge);

        assert!(store.stale_as_of(now, 30).is_empty());
        assert_eq!(store.stale_as_of(now + Duration::seconds(1), 30), vec!["edge"]);
    }

    #[test]
    fn test_annotations() {
        let mut store = store();
        store.add(record("web", 0));

        assert!(store.set_dev_command("web", Some("npm run dev".to_string())));
        assert!(store.set_ports("web", vec![5173, 3000, 5173]));
        let entry = store.get("web").unwrap();
        assert_eq!(entry.dev_command.as_deref(), Some("npm run dev"));
        assert_eq!(entry.ports, vec![3000, 5173]);

        assert!(store.set_dev_command("web", Some("  ".to_string())));
        assert!(store.get("web").unwrap().dev_command.is_none());

        assert!(!store.set_ports("ghost", vec![1]));
        assert!(!store.set_dev_command("ghost", None));
    }

    #[test]
    fn test_orderings() {
        let mut store = store();
        store.add(record("old", 10));
        store.add(record("mid", 5));
        store.add(record("new", 1));
        store.worktrees.get_mut("old").unwrap().open_count = 7;
        store.worktrees.get_mut("new").unwrap().open_count = 7;

        let recent: Vec<_> = store.recent(2).iter().map(|m| m.name.as_str()).collect();
        assert_eq!(recent, vec!["new", "mid"]);

        let frequent: Vec<_> = store.frequent(3).iter().map(|m| m.name.as_str()).collect();
        assert_eq!(frequent, vec!["new", "old", "mid"]);

        let newest: Vec<_> = store.by_age(true).iter().map(|m| m.name.as_str()).collect();
        assert_eq!(newest, vec!["new", "mid", "old"]);
        let oldest: Vec<_> = store.by_age(false).iter().map(|m| m.name.as_str()).collect();
        assert_eq!(oldest, vec!["old", "mid", "new"]);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join(".git")).unwrap();

        let mut store = MetadataStore::load(&repo_at(tmp.path())).unwrap();
        assert!(store.is_empty());
        let mut meta = record("feature", 2);
        meta.ports = vec![8080];
        store.add(meta.clone());
        store.save().unwrap();

        assert!(metadata_path(&tmp.path().join(".git")).is_file());
        assert!(!metadata_path(&tmp.path().join(".git")).with_extension("json.tmp").exists());

        let loaded = MetadataStore::load(&repo_at(tmp.path())).unwrap();
        assert_eq!(loaded.len(), 1);
        let entry = loaded.get("feature").unwrap();
        assert_eq!(entry.ports, vec![8080]);
        assert_eq!(entry.last_opened.unix_timestamp(), meta.last_opened.unix_timestamp());
        assert_eq!(loaded.location(), metadata_path(&tmp.path().join(".git")));
    }

    #[test]
    fn test_load_missing_creates_directory_on_save() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = MetadataStore::load(&repo_at(tmp.path())).unwrap();
        assert!(store.is_empty());
        store.save().unwrap();
        assert!(tmp.path().join(".git").join(METADATA_FILE).is_file());
    }

    #[test]
    fn test_bare_repository_keeps_metadata_in_git_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let bare = tmp.path().join("bare.git");
        fs::create_dir(&bare).unwrap();
        crate::git::test_support::git(&bare, &["init", "-q", "--bare"]);
        let repo = Repository::discover(&bare).unwrap();

        let mut store = MetadataStore::load(&repo).unwrap();
        store.add(record("feature", 0));
        store.save().unwrap();

        assert_eq!(store.location(), repo.git_dir.join(METADATA_FILE));
        assert!(repo.git_dir.join(METADATA_FILE).is_file());
        assert!(!repo.git_dir.join(".git").exists());
        assert!(MetadataStore::load(&repo).unwrap().contains("feature"));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join(".git")).unwrap();
        fs::write(metadata_path(&tmp.path().join(".git")), "{ not json").unwrap();

        assert!(matches!(
            MetadataStore::load(&repo_at(tmp.path())),
            Err(WtxError::Metadata { .. })
        ));
        assert_eq!(
            fs::read_to_string(metadata_path(&tmp.path().join(".git"))).unwrap(),
            "{ not json"
        );
    }

    #[test]
    fn test_reads_document_without_optional_fields() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join(".git")).unwrap();
        let doc = r#"{
  "repo_path": "/r",
  "worktrees": {
    "feat": {
      "name": "feat",
      "path": "/w/feat",
      "branch": "feat",
      "created_at": "2024-01-01T00:00:00Z",
      "last_opened": "2024-02-01T12:30:00Z"
    }
  },
  "updated_at": "2024-02-01T12:30:00Z"
}"#;
        fs::write(metadata_path(&tmp.path().join(".git")), doc).unwrap();

        let store = MetadataStore::load(&repo_at(tmp.path())).unwrap();
        let entry = store.get("feat").unwrap();
        assert!(entry.dev_command.is_none());
        assert!(entry.ports.is_empty());
        assert_eq!(entry.open_count, 0);
        assert_eq!(store.repo_path, "/r");
    }
}
