use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::editor::EditorKind;
use crate::error::{Result, WtxError};

pub const DEFAULT_WORKTREE_DIR: &str = "../worktrees";
pub const DEFAULT_STALE_DAYS: u32 = 30;

/// Keys accepted by [`Config::set`].
pub const SETTABLE_KEYS: [&str; 5] = [
    "editor",
    "reuse_window",
    "worktree_dir",
    "auto_start_dev",
    "stale_days",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub editor: Option<EditorKind>,
    #[serde(default = "default_true")]
    pub reuse_window: bool,
    #[serde(default = "default_worktree_dir")]
    pub worktree_dir: String,
    #[serde(default)]
    pub auto_start_dev: bool,
    #[serde(default = "default_stale_days")]
    pub stale_days: u32,
    #[serde(default)]
    pub custom_commands: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_worktree_dir() -> String {
    DEFAULT_WORKTREE_DIR.to_string()
}

fn default_stale_days() -> u32 {
    DEFAULT_STALE_DAYS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            editor: None,
            reuse_window: true,
            worktree_dir: default_worktree_dir(),
            auto_start_dev: false,
            stale_days: DEFAULT_STALE_DAYS,
            custom_commands: BTreeMap::new(),
        }
    }
}

/// `~/.config/wtx/config.json` (platform config dir).
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("wtx").join("config.json"))
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::load_with_status(path)?.0)
    }

    /// Also reports whether no config file existed yet (a first run).
    pub fn load_with_status(path: &Path) -> Result<(Self, bool)> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok((Self::default(), true));
            }
            Err(err) => {
                return Err(WtxError::io(
                    format!("failed to read config file {}", path.display()),
                    err,
                ));
            }
        };

        let config = serde_json::from_str(&data).map_err(|source| WtxError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        Ok((config, false))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                WtxError::io(
                    format!("failed to create config dir {}", parent.display()),
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
                format!("failed to serialize config {}", tmp.display()),
                io::Error::other(err),
            )
        })?;
        writer
            .flush()
            .map_err(|err| WtxError::io(format!("failed to write {}", tmp.display()), err))?;
        fs::rename(&tmp, path).map_err(|err| {
            WtxError::io(format!("failed to persist config {}", path.display()), err)
        })
    }

    /// Directory new worktrees go into. Relative settings are taken from
    /// the repository root, so the default lands next to the repository.
    pub fn worktree_root(&self, repo_root: &Path) -> PathBuf {
        let dir = Path::new(self.worktree_dir.trim());
        if dir.as_os_str().is_empty() {
            return normalize(&repo_root.join(DEFAULT_WORKTREE_DIR));
        }
        if dir.is_absolute() {
            return normalize(dir);
        }
        normalize(&repo_root.join(dir))
    }

    pub fn custom_command(&self, key: &str) -> Option<&str> {
        self.custom_commands.get(key).map(String::as_str)
    }

    /// Updates one setting from its textual form. `editor auto` clears the
    /// editor so it is detected again.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "editor" => self.editor = parse_editor(value)?,
            "reuse_window" => self.reuse_window = parse_bool(key, value)?,
            "auto_start_dev" => self.auto_start_dev = parse_bool(key, value)?,
            "worktree_dir" => {
                if value.is_empty() {
                    return Err(invalid_value(key, value, "cannot be empty"));
                }
                self.worktree_dir = value.to_string();
            }
            "stale_days" => {
                self.stale_days = value
                    .parse::<u32>()
                    .ok()
                    .filter(|days| *days > 0)
                    .ok_or_else(|| invalid_value(key, value, "expected a positive number of days"))?;
            }
            _ => return Err(WtxError::UnknownConfigKey(key.to_string())),
        }
        Ok(())
    }

    pub fn set_custom_command(&mut self, name: &str, command: &str) -> Result<()> {
        let (name, command) = (name.trim(), command.trim());
        if name.is_empty() {
            return Err(invalid_value("custom_command", name, "name cannot be empty"));
        }
        if command.is_empty() {
            return Err(invalid_value(name, command, "command cannot be empty"));
        }
        self.custom_commands
            .insert(name.to_string(), command.to_string());
        Ok(())
    }
}

fn invalid_value(key: &str, value: &str, reason: impl Into<String>) -> WtxError {
    WtxError::InvalidConfigValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" => Ok(true),
        "false" | "f" | "0" => Ok(false),
        _ => Err(invalid_value(key, value, "expected true or false")),
    }
}

fn parse_editor(value: &str) -> Result<Option<EditorKind>> {
    if value.is_empty() || value.eq_ignore_ascii_case("auto") {
        return Ok(None);
    }
    EditorKind::from_str(value, true).map(Some).map_err(|_| {
        let known: Vec<String> = EditorKind::value_variants()
            .iter()
            .filter_map(|kind| kind.to_possible_value())
            .map(|v| v.get_name().to_string())
            .collect();
        invalid_value(
            "editor",
            value,
            format!("expected auto or one of {}", known.join(", ")),
        )
    })
}

/// Lexically folds `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
