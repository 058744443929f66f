//! Lifecycle management for spawned commands.
//!
//! Provisioning commands can run for a long time (apt upgrade, pip install,
//! the launched application). If the provisioner is killed or interrupted,
//! those children must not keep running on their own.
//!
//! - Every child gets `PR_SET_PDEATHSIG(SIGTERM)`, so the kernel signals it
//!   when the provisioner dies, including on SIGKILL. The kernel clears this
//!   setting when a setuid program such as `sudo` is executed, so `sudo apt`
//!   children are covered only by the registry below.
//! - Live children are tracked in a global registry. Trapped SIGINT/SIGTERM/
//!   SIGHUP and [`ProcessGuard`] drop terminate them: SIGTERM, a grace period,
//!   then SIGKILL.
//!
//! Children stay in the provisioner's process group: `sudo` must be
//! able to read a password from the terminal, and the launched application
//! must receive Ctrl+C directly.

use nix::libc;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Registry of running child PIDs
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
    terminating: bool,
}

impl ChildRegistry {
    /// Get or create the global child registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        debug!("Registered child PID {}", pid);
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        debug!("Unregistered child PID {}", pid);
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// SIGTERM every tracked child, wait up to `grace_period`, then SIGKILL survivors.
    ///
    /// Runs at most once per registry.
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.terminating {
            return;
        }
        self.terminating = true;

        if self.pids.is_empty() {
            return;
        }

        let pids: Vec<u32> = self.pids.drain().collect();
        info!("Terminating {} child process(es)", pids.len());

        for &pid in &pids {
            if let Err(e) = send_signal(pid, Signal::SIGTERM) {
                warn!("Failed to send SIGTERM to PID {}: {}", pid, e);
            }
        }

        let start = Instant::now();
        while start.elapsed() < grace_period {
            if !pids.iter().any(|&pid| is_process_alive(pid)) {
                info!("All child processes exited");
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        for pid in pids.into_iter().filter(|&pid| is_process_alive(pid)) {
            warn!("PID {} ignored SIGTERM, sending SIGKILL", pid);
            let _ = send_signal(pid, Signal::SIGKILL);
        }
    }
}

fn send_signal(pid: u32, signal: Signal) -> Result<(), nix::Error> {
    let pid = i32::try_from(pid).map_err(|_| nix::Error::EINVAL)?;
    signal::kill(Pid::from_raw(pid), signal)
}

/// True if the process exists and is neither a zombie nor dead.
fn is_process_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if signal::kill(Pid::from_raw(raw), None).is_err() {
        return false;
    }

    // Field 3 of /proc/<pid>/stat is the state; the name in field 2 may contain
    // spaces, so parse after its closing paren.
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .is_none_or(|state| !matches!(state, "Z" | "X")),
        Err(_) => true,
    }
}

/// RAII guard that terminates tracked children when dropped.
///
/// Hold one in `main` for the duration of a run.
pub struct ProcessGuard {
    registry: Arc<Mutex<ChildRegistry>>,
    grace_period: Duration,
}

impl ProcessGuard {
    pub fn new() -> Self {
        Self {
            registry: ChildRegistry::global(),
            grace_period: Duration::from_secs(5),
        }
    }

    pub fn child_count(&self) -> usize {
        self.registry.lock().map(|r| r.count()).unwrap_or(0)
    }
}

impl Default for ProcessGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.terminate_all(self.grace_period);
        }
    }
}

/// Install handlers for SIGINT, SIGTERM and SIGHUP.
///
/// On a signal, children are terminated and the process exits with `128 + signo`.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            let name = match sig {
                SIGINT => "SIGINT",
                SIGTERM => "SIGTERM",
                SIGHUP => "SIGHUP",
                _ => "signal",
            };
            info!("Received {}, stopping running commands", name);

            if let Ok(mut registry) = ChildRegistry::global().lock() {
                registry.terminate_all(Duration::from_secs(3));
            }
            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Extension trait tying a child's lifetime to the provisioner.
pub trait ChildLifetime {
    /// Deliver SIGTERM to the child when the parent thread dies.
    ///
    /// Has no effect once the child executes a setuid binary.
    fn die_with_parent(&mut self) -> &mut Self;
}

impl ChildLifetime for std::process::Command {
    fn die_with_parent(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // SAFETY: the closure runs between fork and exec and only calls prctl,
        // which is async-signal-safe.
        unsafe {
            self.pre_exec(|| {
                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::Command;

    #[test]
    fn test_registry_register_unregister() {
        let mut registry = ChildRegistry::default();
        registry.register(1234);
        registry.register(5678);
        registry.register(1234);
        assert_eq!(registry.count(), 2);

        registry.unregister(1234);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_terminate_all_kills_child() {
        let mut child = Command::new("sleep")
            .arg("30")
            .die_with_parent()
            .spawn()
            .expect("sleep should spawn");

        let mut registry = ChildRegistry::default();
        registry.register(child.id());

        let start = Instant::now();
        registry.terminate_all(Duration::from_secs(5));
        let status = child.wait().expect("wait for child");

        assert!(!status.success());
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_terminate_all_runs_once() {
        let mut registry = ChildRegistry::default();
        registry.terminate_all(Duration::from_millis(10));
        registry.register(42);
        registry.terminate_all(Duration::from_millis(10));
        // Second call is a no-op, so the late registration survives.
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_guard_drop_terminates_tracked_children() {
        let mut child = Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("sleep should spawn");

        let registry = Arc::new(Mutex::new(ChildRegistry::default()));
        registry.lock().unwrap().register(child.id());

        let guard = ProcessGuard {
            registry: Arc::clone(&registry),
            grace_period: Duration::from_secs(5),
        };
        assert_eq!(guard.child_count(), 1);
        drop(guard);

        let status = child.wait().expect("wait for child");
        assert_eq!(status.signal(), Some(libc::SIGTERM));
        assert_eq!(registry.lock().unwrap().count(), 0);
    }

    #[test]
    fn test_dead_pid_is_not_alive() {
        let mut child = Command::new("true").spawn().expect("true should spawn");
        let pid = child.id();
        child.wait().expect("wait for child");
        assert!(!is_process_alive(pid));
    }
}
