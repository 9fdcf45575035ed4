mod config;
mod event;
mod extractor;
mod feed;
mod host;
mod logging;
mod paths;
mod queue;
mod record;
mod services;
mod sessions;
mod status;
mod store;
mod supervisor;
mod timers;

use std::sync::Arc;

use anyhow::Context;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::event::DaemonEvent;
use crate::host::{DaemonHost, TimerSlot};
use crate::queue::EventQueue;
use crate::services::ProcessServiceManager;
use crate::sessions::SessionRegistry;
use crate::store::FileStore;
use crate::supervisor::{HostCallbacks, Supervisor, SupervisorState};
use crate::timers::TimerRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── App data directory ────────────────────────────────────────────────────
    let app_dir = paths::app_data_dir()?;
    std::fs::create_dir_all(&app_dir)
        .with_context(|| format!("Failed to create data directory {}", app_dir.display()))?;

    // ── Configuration + logging ───────────────────────────────────────────────
    let config_path = paths::config_file_path(&app_dir);
    let (initial_config, config_error) = match config::load_or_default(&config_path) {
        Ok(c) => (c, None),
        Err(e) => (config::Config::default(), Some(e)),
    };
    logging::init(&initial_config.log_level);
    if let Some(e) = config_error {
        error!("Config error (using defaults): {e:#}");
    }

    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(64);

    // ── Host bindings ─────────────────────────────────────────────────────────
    let host = Arc::new(DaemonHost::new(
        ProcessServiceManager::new(initial_config.listener.clone()),
        TimerRegistry::new(event_tx.clone()),
        Arc::new(SessionRegistry::new()),
        event_tx.clone(),
    ));
    let queue = EventQueue::new(FileStore::open(paths::store_file_path(&app_dir)));
    let mut supervisor = Supervisor::new(Arc::clone(&host), queue, initial_config.extractor);

    // ── Initial status ────────────────────────────────────────────────────────
    let status_path = paths::status_file_path(&app_dir);
    let mut current_status = status::DaemonStatus::new();
    current_status.queue_length = supervisor.queue_len();
    status::write_status(&status_path, &current_status);

    // ── Background tasks ──────────────────────────────────────────────────────
    tokio::spawn(config::watch_config(config_path, event_tx.clone()));
    tokio::spawn(feed::run(BufReader::new(tokio::io::stdin()), event_tx.clone()));

    // Graceful shutdown on Ctrl+C.
    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(DaemonEvent::Shutdown).await;
            }
        });
    }

    info!("scrobbler-daemon v{} started in {}", env!("CARGO_PKG_VERSION"), app_dir.display());

    // ── Event loop ────────────────────────────────────────────────────────────
    while let Some(evt) = event_rx.recv().await {
        match evt {
            DaemonEvent::Notification(notification) => {
                match supervisor.on_event(&notification) {
                    Some(record) => current_status.last_title = Some(record.title),
                    // Dropped notifications change nothing; a failed append sets an error.
                    None if !current_status.error_changed(supervisor.last_error()) => continue,
                    None => {}
                }
                current_status.queue_length = supervisor.queue_len();
            }

            DaemonEvent::SessionPublished { handle, metadata } => {
                host.sessions().publish(handle, metadata);
                continue;
            }

            DaemonEvent::SessionEnded(handle) => {
                host.sessions().end(&handle);
                continue;
            }

            DaemonEvent::SupervisorStart => {
                let directive = supervisor.start();
                info!("Supervisor start acknowledged ({directive:?})");
            }

            DaemonEvent::WatchdogStart => match supervisor.start_watchdog() {
                Ok(()) => info!("Watchdog started"),
                Err(e) => warn!("Failed to start watchdog: {e}"),
            },

            DaemonEvent::TimerFired(slot) => {
                supervisor.on_timer_fire(slot);
                if slot == TimerSlot::Watchdog {
                    current_status.last_watchdog_fire = Some(chrono::Local::now().to_rfc3339());
                }
                current_status.queue_length = supervisor.queue_len();
            }

            DaemonEvent::TaskRemoved => supervisor.on_reclaimed(),

            DaemonEvent::Destroyed => supervisor.on_destroyed(),

            DaemonEvent::ConfigReloaded(new_config) => {
                info!("Config reloaded");
                host.set_listener(new_config.listener);
                supervisor.set_extractor_config(new_config.extractor);
                continue;
            }

            DaemonEvent::Shutdown => {
                info!("Shutting down");
                host.cancel_timers();
                current_status.supervisor = SupervisorState::Stopped;
                current_status.watchdog_armed = false;
                status::write_status(&status_path, &current_status);
                break;
            }
        }

        current_status.supervisor = supervisor.state();
        current_status.watchdog_armed = host.is_armed(TimerSlot::Watchdog);
        current_status.error = supervisor.last_error().map(str::to_string);
        status::write_status(&status_path, &current_status);
    }

    Ok(())
}
