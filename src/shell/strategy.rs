//! One execution procedure per [`Mode`](super::mode::Mode).
//!
//! Everything a child needs is prepared in the parent as a [`Launch`] before
//! forking. After fork the child only replays that plan with raw syscalls,
//! which keeps it safe even when the dispatcher has other threads running.

use std::os::unix::io::RawFd;

use log::{debug, info};
use nix::{
    libc,
    sys::signal::{self, Signal},
    unistd::Pid,
};

use super::{
    error::{DispatchError, Result},
    process::{self, Argv, ExitStatus, Forked},
    signal::{ChildExitDisposition, Disposition, SignalDiscipline},
};
use crate::{config::RedirectConfig, helper::Defer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildReport {
    pub pid: Pid,
    pub status: Option<ExitStatus>, // None: background, or reaped elsewhere
}

/// Everything one child does between fork and exec.
#[derive(Debug)]
pub struct Launch {
    argv: Argv,
    discard: Vec<RawFd>,
    stdin: Option<RawFd>,
    stdout: Option<RawFd>,
    interrupt: Option<Disposition>,
    child_exit: Option<ChildExitDisposition>,
    diagnostic: Vec<u8>,
}

impl Launch {
    fn new(words: &[String]) -> Result<Self> {
        let argv = Argv::new(words)?;
        let diagnostic = format!("dispatchsh: {}: ", words[0]).into_bytes();
        Ok(Launch {
            argv,
            discard: Vec::new(),
            stdin: None,
            stdout: None,
            interrupt: None,
            child_exit: None,
            diagnostic,
        })
    }

    /// A foreground child: interrupts terminate it normally.
    pub fn foreground(words: &[String]) -> Result<Self> {
        let mut launch = Launch::new(words)?;
        launch.interrupt = Some(Disposition::Default);
        Ok(launch)
    }

    /// A background child: keeps the inherited interrupt immunity and never
    /// leaves zombies of its own children behind.
    pub fn background(words: &[String]) -> Result<Self> {
        let mut launch = Launch::new(words)?;
        launch.child_exit = Some(ChildExitDisposition::IgnoreNoZombies);
        Ok(launch)
    }

    pub fn discarding(mut self, fd: RawFd) -> Self {
        self.discard.push(fd);
        self
    }

    pub fn stdin_from(mut self, fd: RawFd) -> Self {
        self.stdin = Some(fd);
        self
    }

    pub fn stdout_to(mut self, fd: RawFd) -> Self {
        self.stdout = Some(fd);
        self
    }

    pub fn argv(&self) -> Vec<&str> {
        self.argv.to_strs()
    }

    #[cfg(test)]
    fn interrupt(&self) -> Option<Disposition> {
        self.interrupt
    }

    #[cfg(test)]
    fn child_exit(&self) -> Option<ChildExitDisposition> {
        self.child_exit
    }

    #[cfg(test)]
    fn stdin(&self) -> Option<RawFd> {
        self.stdin
    }

    #[cfg(test)]
    fn stdout(&self) -> Option<RawFd> {
        self.stdout
    }

    #[cfg(test)]
    fn discards(&self) -> &[RawFd] {
        &self.discard
    }

    /// Forks. The parent gets the child's pid; the child never returns.
    pub fn spawn<S: SignalDiscipline>(&self, signals: &S) -> Result<Pid> {
        match process::create_process()? {
            Forked::Parent(pid) => {
                debug!("spawned {} for {:?}", pid, self.argv());
                Ok(pid)
            }
            Forked::Child => self.run_in_child(signals),
        }
    }

    fn run_in_child<S: SignalDiscipline>(&self, signals: &S) -> ! {
        for &fd in &self.discard {
            let _ = nix::unistd::close(fd);
        }
        if let Some(fd) = self.stdin {
            process::duplicate_descriptor(fd, libc::STDIN_FILENO);
        }
        if let Some(fd) = self.stdout {
            process::duplicate_descriptor(fd, libc::STDOUT_FILENO);
        }
        if let Some(disposition) = self.interrupt {
            if let Err(e) = signals.set_interrupt(disposition) {
                process::die(&self.diagnostic, e);
            }
        }
        if let Some(disposition) = self.child_exit {
            if let Err(e) = signals.set_child_exit(disposition) {
                process::die(&self.diagnostic, e);
            }
        }
        process::exec_program(&self.argv, &self.diagnostic)
    }
}

fn observe(pid: Pid) -> Result<ChildReport> {
    let status = process::wait_for_exit(pid)?;
    match status {
        Some(status) if status.success() => debug!("{} {}", pid, status),
        Some(status) => info!("{} {}", pid, status),
        None => {}
    }
    Ok(ChildReport { pid, status })
}

/// Kills and collects a child whose command can no longer run.
fn abandon(pid: Pid) {
    if let Err(e) = signal::kill(pid, Signal::SIGKILL) {
        debug!("kill({}) failed: {}", pid, e);
    }
    let _ = process::wait_for_exit(pid);
}

/// The launch for `cmd &`: the marker is stripped.
pub fn plan_background(words: &[String]) -> Result<Launch> {
    let argv = words.split_last().map_or(&[][..], |(_, rest)| rest);
    Launch::background(argv)
}

pub fn background<S: SignalDiscipline>(
    words: &[String],
    signals: &S,
) -> Result<Vec<ChildReport>> {
    let pid = plan_background(words)?.spawn(signals)?;
    Ok(vec![ChildReport { pid, status: None }])
}

// Descriptors are attached once the pipe exists.
pub fn plan_pipe(words: &[String], split: usize) -> Result<(Launch, Launch)> {
    let (left, right) = words.split_at(split.min(words.len()));
    let right = right.get(1..).unwrap_or(&[]);
    Ok((Launch::foreground(left)?, Launch::foreground(right)?))
}

pub fn pipe<S: SignalDiscipline>(
    words: &[String],
    split: usize,
    signals: &S,
) -> Result<Vec<ChildReport>> {
    let (writer, reader) = plan_pipe(words, split)?;
    let (read_end, write_end) = process::create_pipe()?;
    let parent_ends = Defer::new(|| {
        process::close_descriptor(read_end);
        process::close_descriptor(write_end);
    });

    let writer = writer.discarding(read_end).stdout_to(write_end);
    let reader = reader.discarding(write_end).stdin_from(read_end);

    let first = writer.spawn(signals)?;
    let second = match reader.spawn(signals) {
        Ok(pid) => pid,
        Err(e) => {
            drop(parent_ends);
            abandon(first); // nothing may outlive a failed command
            return Err(e);
        }
    };
    drop(parent_ends);

    let first = observe(first);
    let second = observe(second);
    Ok(vec![first?, second?])
}

// Launch for `cmd > path` plus the path; the descriptor is attached later.
pub fn plan_redirect(words: &[String]) -> Result<(Launch, &str)> {
    match words {
        [argv @ .., _, path] => Ok((Launch::foreground(argv)?, path.as_str())),
        _ => Err(DispatchError::EmptyCommand),
    }
}

pub fn redirect<S: SignalDiscipline>(
    words: &[String],
    config: &RedirectConfig,
    signals: &S,
) -> Result<Vec<ChildReport>> {
    let (launch, path) = plan_redirect(words)?;
    let fd = process::open_target(path, config)?;
    let target = Defer::new(|| process::close_descriptor(fd));

    let pid = launch.stdout_to(fd).spawn(signals)?;
    drop(target);
    Ok(vec![observe(pid)?])
}

pub fn plan_plain(words: &[String]) -> Result<Launch> {
    Launch::foreground(words)
}

pub fn plain<S: SignalDiscipline>(words: &[String], signals: &S) -> Result<Vec<ChildReport>> {
    let pid = plan_plain(words)?.spawn(signals)?;
    Ok(vec![observe(pid)?])
}
