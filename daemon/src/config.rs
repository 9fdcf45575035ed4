use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::event::DaemonEvent;

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_TARGET_PACKAGE: &str = "com.google.android.apps.youtube.music";
/// Sub-text values that are navigation hints or the app's own name, never an album.
pub const DEFAULT_SUBTEXT_DENYLIST: [&str; 5] =
    ["YouTube Music", "Siguiente", "Anterior", "Next", "Previous"];
pub const DEFAULT_LISTENER_NAME: &str = "Background listener";
pub const DEFAULT_LISTENER_EXECUTABLE: &str = "scrobbler-listener";

/// Root configuration structure. Deserialized from `<data dir>/config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Tracing filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub listener: ListenerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            extractor: ExtractorConfig::default(),
            listener: ListenerConfig::default(),
        }
    }
}

/// Which notifications are parsed, and which sub-text values are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractorConfig {
    /// Only notifications posted by this application identifier are processed.
    #[serde(default = "default_target_package")]
    pub target_package: String,
    /// Exact sub-text values that must never be taken as an album name.
    #[serde(default = "default_subtext_denylist")]
    pub subtext_denylist: Vec<String>,
}

impl ExtractorConfig {
    pub fn is_target(&self, package: &str) -> bool {
        package == self.target_package
    }

    pub fn is_denied_subtext(&self, sub_text: &str) -> bool {
        self.subtext_denylist.iter().any(|d| d == sub_text)
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            target_package: default_target_package(),
            subtext_denylist: default_subtext_denylist(),
        }
    }
}

/// The background listener kept alive by the supervisor.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_listener_name")]
    pub display_name: String,
    /// Process name used to decide whether the listener is already running.
    #[serde(default = "default_listener_executable")]
    pub executable_name: String,
    /// argv used to start the listener. Empty disables starting it.
    #[serde(default = "default_listener_command")]
    pub command: Vec<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            display_name: default_listener_name(),
            executable_name: default_listener_executable(),
            command: default_listener_command(),
        }
    }
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Spawns a file watcher on the parent directory of `path`.  Whenever the config
/// file is created or modified, reloads it and sends a `ConfigReloaded` event.
pub async fn watch_config(path: PathBuf, tx: mpsc::Sender<DaemonEvent>) {
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Event>(16);

    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = watch_tx.blocking_send(event);
            }
        },
        NotifyConfig::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            error!("Failed to create config watcher: {e}");
            return;
        }
    };

    // Watch the directory so editor-style atomic saves (write + rename) are seen.
    let watch_dir = match path.parent() {
        Some(d) => d.to_path_buf(),
        None => {
            error!("Config path has no parent directory");
            return;
        }
    };

    if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
        error!("Failed to watch config directory: {e}");
        return;
    }

    while let Some(event) = watch_rx.recv().await {
        let affects_config = event.paths.iter().any(|p| p == path.as_path());
        let is_write = matches!(
            event.kind,
            notify::EventKind::Create(_) | notify::EventKind::Modify(_)
        );

        if affects_config && is_write {
            match load_or_default(&path) {
                Ok(config) => {
                    if tx.send(DaemonEvent::ConfigReloaded(config)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Failed to reload config: {e:#}"),
            }
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_target_package() -> String {
    DEFAULT_TARGET_PACKAGE.to_string()
}

fn default_subtext_denylist() -> Vec<String> {
    DEFAULT_SUBTEXT_DENYLIST.iter().map(|s| s.to_string()).collect()
}

fn default_listener_name() -> String {
    DEFAULT_LISTENER_NAME.to_string()
}

fn default_listener_executable() -> String {
    DEFAULT_LISTENER_EXECUTABLE.to_string()
}

fn default_listener_command() -> Vec<String> {
    vec![DEFAULT_LISTENER_EXECUTABLE.to_string()]
}
