/// Canonical file paths for scrobbler data files.
///
/// Everything lives in one data directory, `$SCROBBLER_HOME` when set,
/// otherwise `<platform data dir>/scrobbler`:
///   - config.toml  Written by the shell, read by the daemon.
///   - status.toml  Written by the daemon, read by the shell.
///   - store.json   Key-value store shared with the queue consumer.
use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const HOME_ENV_VAR: &str = "SCROBBLER_HOME";
const APP_DIR_NAME: &str = "scrobbler";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STATUS_FILE_NAME: &str = "status.toml";
pub const STORE_FILE_NAME: &str = "store.json";

/// Returns the scrobbler data directory.
pub fn app_data_dir() -> Result<PathBuf> {
    resolve_data_dir(std::env::var_os(HOME_ENV_VAR), dirs::data_dir())
        .with_context(|| format!("No data directory available; set {HOME_ENV_VAR}"))
}

fn resolve_data_dir(home_override: Option<OsString>, platform: Option<PathBuf>) -> Option<PathBuf> {
    match home_override {
        Some(home) if !home.is_empty() => Some(PathBuf::from(home)),
        _ => platform.map(|dir| dir.join(APP_DIR_NAME)),
    }
}

pub fn config_file_path(app_dir: &Path) -> PathBuf {
    app_dir.join(CONFIG_FILE_NAME)
}

pub fn status_file_path(app_dir: &Path) -> PathBuf {
    app_dir.join(STATUS_FILE_NAME)
}

pub fn store_file_path(app_dir: &Path) -> PathBuf {
    app_dir.join(STORE_FILE_NAME)
}
