//! Process registry with crash-safe cleanup.
//!
//! Every live console process id is tracked in the scheduler-owned
//! registry and mirrored into a process-global one. The interrupt hook
//! force-terminates everything in the global mirror before cancellation
//! propagates, so no console process outlives the run on any teardown
//! path the handler can reach.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};

use once_cell::sync::Lazy;

static GLOBAL_REGISTRY: Lazy<ProcessRegistry> = Lazy::new(ProcessRegistry::new);
static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INSTALL_HOOK: Once = Once::new();

/// Concurrency-safe set of live console process ids.
#[derive(Clone, Debug, Default)]
pub struct ProcessRegistry {
    pids: Arc<Mutex<HashSet<u32>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self {
            pids: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Handle to the process-global mirror registry used by the
    /// interrupt hook.
    pub fn global() -> Self {
        GLOBAL_REGISTRY.clone()
    }

    pub fn add(&self, pid: u32) {
        self.lock().insert(pid);
    }

    /// Removes a pid. Idempotent: removing an unknown pid is a no-op.
    pub fn remove(&self, pid: u32) {
        self.lock().remove(&pid);
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.lock().contains(&pid)
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    /// Force-terminates every registered process and clears the set.
    /// Returns the number of processes signalled.
    pub fn kill_all(&self) -> usize {
        let mut pids = self.lock();
        let count = pids.len();
        for pid in pids.drain() {
            kill_process(pid);
        }
        count
    }

    // the registry must stay usable during unwind, so a poisoned lock is
    // recovered rather than propagated
    fn lock(&self) -> std::sync::MutexGuard<HashSet<u32>> {
        self.pids.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(unix)]
fn kill_process(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    match kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) => warn!("killed console process, pid: {}", pid),
        Err(e) => debug!("failed killing console process {}: {}", pid, e),
    }
}

#[cfg(not(unix))]
fn kill_process(pid: u32) {
    warn!(
        "terminating processes by pid is not supported on this platform, pid: {}",
        pid
    );
}

/// Installs the interrupt hook once per process. On SIGINT/SIGTERM the
/// hook kills everything in the global registry and raises the
/// interrupted flag observed by all running schedulers.
pub(crate) fn install_interrupt_hook() {
    INSTALL_HOOK.call_once(|| {
        if let Err(e) = ctrlc::set_handler(|| {
            INTERRUPTED.store(true, Ordering::SeqCst);
            let killed = ProcessRegistry::global().kill_all();
            warn!("interrupted, killed {} console processes", killed);
        }) {
            warn!("failed installing interrupt handler: {}", e);
        }
    });
}

/// True once an interrupt signal has been received.
pub(crate) fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}
