use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::debug;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "WTX_LOG";

/// `~/.cache/wtx/wtx.log`, or the temp dir when there is no cache dir.
pub fn log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("wtx")
        .join("wtx.log")
}

fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "wtx=info",
        1 => "wtx=debug",
        _ => "wtx=trace",
    }
}

/// Installs the global subscriber. Output goes to the log file so it never
/// mixes with command output; `WTX_LOG` overrides the level. Falls back to
/// stderr when the log file cannot be opened.
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level_for(verbose)));
    let path = log_path();

    let file = path
        .parent()
        .map(fs::create_dir_all)
        .transpose()
        .and_then(|_| OpenOptions::new().create(true).append(true).open(&path));

    let installed = match file {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_target(verbose >= 2)
            .with_thread_names(verbose >= 2)
            .with_writer(Mutex::new(file))
            .try_init(),
        Err(_) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(verbose >= 2)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    if installed.is_ok() {
        debug!(verbose, log = %path.display(), "logging initialised");
    }
}
