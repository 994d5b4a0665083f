use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, WtxError};

/// Editors wtx knows how to hand a worktree to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EditorKind {
    #[value(name = "vscode")]
    VsCode,
    Cursor,
    #[value(name = "vscodium")]
    VsCodium,
    Neovim,
    Vim,
    Terminal,
}

/// Auto-detection order when nothing is configured.
const DETECTION_ORDER: [EditorKind; 5] = [
    EditorKind::Cursor,
    EditorKind::VsCode,
    EditorKind::VsCodium,
    EditorKind::Neovim,
    EditorKind::Vim,
];

impl EditorKind {
    pub const ALL: [EditorKind; 6] = [
        EditorKind::VsCode,
        EditorKind::Cursor,
        EditorKind::VsCodium,
        EditorKind::Neovim,
        EditorKind::Vim,
        EditorKind::Terminal,
    ];

    pub fn binary(&self) -> Option<&'static str> {
        match self {
            EditorKind::VsCode => Some("code"),
            EditorKind::Cursor => Some("cursor"),
            EditorKind::VsCodium => Some("codium"),
            EditorKind::Neovim => Some("nvim"),
            EditorKind::Vim => Some("vim"),
            EditorKind::Terminal => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EditorKind::VsCode => "Visual Studio Code",
            EditorKind::Cursor => "Cursor",
            EditorKind::VsCodium => "VSCodium",
            EditorKind::Neovim => "Neovim",
            EditorKind::Vim => "Vim",
            EditorKind::Terminal => "Terminal",
        }
    }

    /// GUI editors accept `-r` to reuse the last window.
    pub fn supports_reuse_window(&self) -> bool {
        matches!(
            self,
            EditorKind::VsCode | EditorKind::Cursor | EditorKind::VsCodium
        )
    }

    /// Terminal editors take over the controlling terminal and are awaited.
    pub fn runs_in_foreground(&self) -> bool {
        matches!(self, EditorKind::Neovim | EditorKind::Vim)
    }

    pub fn launch_args(&self, path: &Path, reuse_window: bool) -> Vec<String> {
        let mut args = Vec::new();
        if reuse_window && self.supports_reuse_window() {
            args.push("-r".to_string());
        }
        args.push(path.to_string_lossy().to_string());
        args
    }

    /// Maps an `$EDITOR`-style command (`nvim`, `/usr/bin/code`) to a kind.
    pub fn from_command(command: &str) -> Option<Self> {
        let program = command.split_whitespace().next()?;
        let base = Path::new(program).file_name()?.to_str()?;
        Self::ALL
            .into_iter()
            .find(|kind| kind.binary() == Some(base))
    }

    pub fn is_installed(&self) -> bool {
        match self.binary() {
            Some(binary) => find_in_path(binary).is_some(),
            None => true,
        }
    }

    /// Configured editor, then `$EDITOR`, then the first installed editor,
    /// then the plain terminal fallback.
    pub fn detect(configured: Option<EditorKind>, env_editor: Option<&str>) -> Self {
        Self::detect_with(configured, env_editor, EditorKind::is_installed)
    }

    pub fn detect_with<F>(
        configured: Option<EditorKind>,
        env_editor: Option<&str>,
        installed: F,
    ) -> Self
    where
        F: Fn(&EditorKind) -> bool,
    {
        if let Some(kind) = configured.filter(|kind| installed(kind)) {
            return kind;
        }
        if let Some(kind) = env_editor
            .and_then(Self::from_command)
            .filter(|kind| installed(kind))
        {
            return kind;
        }
        DETECTION_ORDER
            .into_iter()
            .find(|kind| installed(kind))
            .unwrap_or(EditorKind::Terminal)
    }

    pub fn installed() -> Vec<EditorKind> {
        DETECTION_ORDER
            .into_iter()
            .filter(EditorKind::is_installed)
            .collect()
    }

    /// Opens `path`. GUI editors are spawned with detached output and not
    /// awaited; terminal editors inherit stdio and block until they exit.
    /// [`EditorKind::Terminal`] launches nothing.
    pub fn open(&self, path: &Path, reuse_window: bool) -> Result<()> {
        let Some(binary) = self.binary() else {
            debug!(path = %path.display(), "terminal editor selected, nothing to launch");
            return Ok(());
        };

        let args = self.launch_args(path, reuse_window);
        let description = format!("{binary} {}", args.join(" "));
        let mut command = Command::new(binary);
        command.args(&args);

        if self.runs_in_foreground() {
            let status = command
                .status()
                .map_err(|err| WtxError::external(&description, err.to_string()))?;
            if !status.success() {
                return Err(WtxError::external(
                    description,
                    format!("exited with status {status}"),
                ));
            }
        } else {
            command
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|err| WtxError::external(&description, err.to_string()))?;
        }

        info!(editor = self.label(), path = %path.display(), "opened worktree");
        Ok(())
    }
}

impl fmt::Display for EditorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn find_in_path(binary: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}
