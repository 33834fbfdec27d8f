use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use anyhow::Result;
use log::{debug, info, warn};
use nix::{errno::Errno, unistd::Pid};
use signal_hook::{consts::signal::SIGCHLD, iterator::Signals};

use super::process;

/// Collects background children nobody waits for.
///
/// SIGCHLD dispositions are process-wide, so a background child cannot arrange
/// its own reaping. Instead only the tracked pids are polled with WNOHANG,
/// leaving foreground waits untouched.
#[derive(Debug, Clone, Default)]
pub struct Reaper {
    pids: Arc<Mutex<HashSet<Pid>>>,
}

impl Reaper {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Pid>> {
        self.pids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn track(&self, pid: Pid) {
        self.lock().insert(pid);
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    // Returns how many were reaped.
    pub fn sweep(&self) -> usize {
        let mut pids = self.lock();
        let before = pids.len();
        pids.retain(|&pid| match process::try_reap(pid) {
            Ok(None) => true,
            Ok(Some(status)) => {
                info!("[background {}] {}", pid, status);
                false
            }
            Err(Errno::ECHILD) => {
                debug!("[background {}] already reaped", pid);
                false
            }
            Err(e) => {
                warn!("[background {}] waitpid: {}", pid, e);
                false
            }
        });
        before - pids.len()
    }

    /// Sweeps on every SIGCHLD. Installs a handler, so call it after
    /// `session_start`.
    pub fn spawn_watcher(&self) -> Result<()> {
        let mut signals = Signals::new(&[SIGCHLD])?;
        let reaper = self.clone();
        std::thread::spawn(move || {
            for _ in signals.forever() {
                reaper.sweep();
            }
        });
        Ok(())
    }
}
