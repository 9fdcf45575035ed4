use std::ffi::OsStr;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, RwLock};

use sysinfo::{Process, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tracing::{debug, info, warn};

use crate::config::ListenerConfig;
use crate::host::{HostError, ServiceUnit};

/// Keeps the background listener process running.
///
/// There is no reliable way to ask a process whether it is healthy, so
/// "ensure running" means: if no process with the configured executable name
/// exists, start one. Calling it while the listener runs does nothing.
pub struct ProcessServiceManager {
    listener: RwLock<ListenerConfig>,
    sys: Mutex<System>,
    /// Listeners we started; reaped on each call so they do not linger as zombies.
    children: Mutex<Vec<Child>>,
}

impl ProcessServiceManager {
    pub fn new(listener: ListenerConfig) -> Self {
        Self {
            listener: RwLock::new(listener),
            sys: Mutex::new(System::new()),
            children: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the listener definition used by subsequent calls.
    pub fn set_listener(&self, listener: ListenerConfig) {
        *self.listener.write().unwrap_or_else(|e| e.into_inner()) = listener;
    }

    pub fn ensure_listener_running(&self) -> Result<(), HostError> {
        let listener = self.listener.read().unwrap_or_else(|e| e.into_inner()).clone();
        self.reap_children();

        let Some((program, args)) = listener.command.split_first() else {
            debug!("No command configured for '{}'; nothing to start", listener.display_name);
            return Ok(());
        };

        if self.is_running(&listener.executable_name) {
            debug!("'{}' already running", listener.display_name);
            return Ok(());
        }

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| HostError::ServiceStart {
                unit: ServiceUnit::Listener,
                reason: format!("{program}: {e}"),
            })?;

        info!("Started '{}' (pid {})", listener.display_name, child.id());
        self.children
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(child);
        Ok(())
    }

    fn is_running(&self, executable_name: &str) -> bool {
        let mut sys = self.sys.lock().unwrap_or_else(|e| e.into_inner());
        // The kernel name is truncated, so the executable path and argv[0] are needed too.
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::new()
                .with_exe(UpdateKind::OnlyIfNotSet)
                .with_cmd(UpdateKind::OnlyIfNotSet),
        );
        sys.processes()
            .values()
            .any(|p| process_is_executable(p, executable_name))
    }

    fn reap_children(&self) {
        let mut children = self.children.lock().unwrap_or_else(|e| e.into_inner());
        children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                warn!("Listener pid {} exited: {status}", child.id());
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!("Failed to poll listener pid {}: {e}", child.id());
                false
            }
        });
    }
}

/// Longest process name Linux reports; longer names are cut to this many bytes.
const COMM_LEN: usize = 15;

fn process_is_executable(process: &Process, executable_name: &str) -> bool {
    process_matches(
        &process.name().to_string_lossy(),
        process.exe(),
        process.cmd().first().map(|arg| arg.as_os_str()),
        executable_name,
    )
}

/// Case-insensitive comparison of a process against the configured executable.
///
/// The file name of the executable path and of argv[0] are checked first. The
/// reported name is the fallback; a name of exactly [`COMM_LEN`] bytes also
/// matches an executable it is a truncation of.
fn process_matches(
    name: &str,
    exe: Option<&Path>,
    argv0: Option<&OsStr>,
    executable_name: &str,
) -> bool {
    if executable_name.is_empty() {
        return false;
    }
    let same = |candidate: &str| candidate.eq_ignore_ascii_case(executable_name);

    let file_names = [exe, argv0.map(Path::new)];
    if file_names
        .into_iter()
        .flatten()
        .filter_map(|p| p.file_name())
        .any(|n| same(&n.to_string_lossy()))
    {
        return true;
    }

    same(name)
        || (name.len() == COMM_LEN
            && executable_name
                .get(..COMM_LEN)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener(executable: &str, command: &[&str]) -> ListenerConfig {
        ListenerConfig {
            display_name: "Test listener".to_string(),
            executable_name: executable.to_string(),
            command: command.iter().map(|s| s.to_string()).collect(),
        }
    }

    // ── process_matches ───────────────────────────────────────────────────────

    fn name_only(name: &str, executable: &str) -> bool {
        process_matches(name, None, None, executable)
    }

    #[test]
    fn process_matches_ignores_case() {
        assert!(name_only("Scrobbler-Listener", "scrobbler-listener"));
        assert!(name_only("uploader", "UPLOADER"));
    }

    #[test]
    fn process_matches_requires_full_name() {
        assert!(!name_only("scrobbler-listener-old", "scrobbler-listener"));
        assert!(!name_only("listener", "scrobbler-listener"));
        assert!(!name_only("scrobbler-list", "scrobbler-listener"));
    }

    #[test]
    fn empty_executable_never_matches() {
        assert!(!name_only("", ""));
        assert!(!name_only("anything", ""));
        assert!(!process_matches("x", Some(Path::new("/usr/bin/x")), None, ""));
    }

    #[test]
    fn truncated_kernel_name_matches_long_executable() {
        assert!(name_only("scrobbler-liste", "scrobbler-listener"));
        assert!(name_only("Scrobbler-Liste", "scrobbler-listener"));
        assert!(!name_only("scrobbler-liste", "scrobbler-list"));
        assert!(!name_only("scrobbler-other", "scrobbler-listener"));
    }

    #[test]
    fn executable_path_file_name_matches() {
        let exe = Path::new("/opt/scrobbler/bin/scrobbler-listener");
        assert!(process_matches("scrobbler-liste", Some(exe), None, "scrobbler-listener"));
        assert!(process_matches("", Some(exe), None, "scrobbler-listener"));
        assert!(!process_matches("", Some(Path::new("/usr/bin/sleep")), None, "scrobbler-listener"));
    }

    #[test]
    fn argv0_file_name_matches() {
        let argv0 = OsStr::new("./bin/scrobbler-listener");
        assert!(process_matches("", None, Some(argv0), "scrobbler-listener"));
        assert!(process_matches(
            "",
            Some(Path::new("/usr/bin/python3")),
            Some(OsStr::new("scrobbler-listener")),
            "scrobbler-listener"
        ));
        assert!(!process_matches("", None, Some(OsStr::new("listener")), "scrobbler-listener"));
    }

    // ── ensure_listener_running ───────────────────────────────────────────────

    #[test]
    fn empty_command_is_a_noop() {
        let manager = ProcessServiceManager::new(listener("ghost", &[]));
        assert!(manager.ensure_listener_running().is_ok());
    }

    #[test]
    fn missing_program_reports_service_start_error() {
        let manager = ProcessServiceManager::new(listener(
            "definitely-not-running-xyz",
            &["/nonexistent/definitely-not-a-binary-xyz"],
        ));
        let err = manager.ensure_listener_running().unwrap_err();
        assert!(matches!(err, HostError::ServiceStart { unit: ServiceUnit::Listener, .. }));
    }

    #[test]
    fn set_listener_takes_effect_on_next_call() {
        let manager = ProcessServiceManager::new(listener(
            "definitely-not-running-xyz",
            &["/nonexistent/definitely-not-a-binary-xyz"],
        ));
        manager.set_listener(listener("ghost", &[]));
        assert!(manager.ensure_listener_running().is_ok());
    }

    // ── is_running ────────────────────────────────────────────────────────────

    /// Spawns a copy of `sleep` whose file name is longer than the kernel keeps.
    #[cfg(target_os = "linux")]
    fn spawn_long_named_sleeper(dir: &Path) -> Child {
        let sleep = ["/bin/sleep", "/usr/bin/sleep"]
            .into_iter()
            .map(Path::new)
            .find(|p| p.exists())
            .expect("sleep binary");
        let program = dir.join("scrobbler-listener");
        std::fs::copy(sleep, &program).unwrap();

        // ETXTBSY while another test thread forks with the copy still open.
        for _ in 0..50 {
            match Command::new(&program).arg("30").spawn() {
                Ok(child) => return child,
                Err(e) if e.raw_os_error() == Some(26) => {
                    std::thread::sleep(std::time::Duration::from_millis(20));
                }
                Err(e) => panic!("failed to spawn {}: {e}", program.display()),
            }
        }
        panic!("{} stayed busy", program.display());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn running_listener_with_long_name_is_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut child = spawn_long_named_sleeper(dir.path());

        let manager = ProcessServiceManager::new(ListenerConfig::default());
        let found = manager.is_running(crate::config::DEFAULT_LISTENER_EXECUTABLE);

        child.kill().unwrap();
        child.wait().unwrap();
        assert!(found, "listener with a truncated kernel name was not found");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn running_listener_is_not_started_again() {
        let dir = tempfile::tempdir().unwrap();
        let mut child = spawn_long_named_sleeper(dir.path());

        // Starting this command would fail, so Ok means nothing was spawned.
        let manager = ProcessServiceManager::new(listener(
            crate::config::DEFAULT_LISTENER_EXECUTABLE,
            &["/nonexistent/definitely-not-a-binary-xyz"],
        ));
        let result = manager.ensure_listener_running();

        child.kill().unwrap();
        child.wait().unwrap();
        assert!(result.is_ok(), "{result:?}");
    }
}
