//! Error-checked process primitives.
//!
//! Functions returning [`Result`] run in the dispatcher process and report
//! soft failures. [`die`], [`duplicate_descriptor`] and [`exec_program`] run
//! in a forked child before exec: they only make raw syscalls and terminate
//! the child on failure.

use std::{ffi::CString, fmt, iter, os::unix::io::RawFd, ptr};

use log::warn;
use nix::{
    errno::Errno,
    fcntl::{self, FcntlArg, FdFlag, OFlag},
    libc,
    sys::{
        signal::Signal,
        stat::Mode,
        wait::{self, WaitPidFlag, WaitStatus},
    },
    unistd::{self, ForkResult, Pid},
};

use super::{
    error::{DispatchError, Result},
    syscall,
};
use crate::config::RedirectConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Exited(i32),
    Signaled(Signal),
}

impl ExitStatus {
    /// Shell-style status code: the exit code, or 128 + signal number.
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Exited(code) => *code,
            ExitStatus::Signaled(signal) => 128 + *signal as i32,
        }
    }

    pub fn success(&self) -> bool {
        self.code() == 0
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "exited with {}", code),
            ExitStatus::Signaled(signal) => write!(f, "terminated by {}", signal),
        }
    }
}

/// An argument vector prepared for `execvp` before forking: the strings and
/// the NULL-terminated pointer array into them.
#[derive(Debug)]
pub struct Argv {
    words: Vec<CString>,
    ptrs: Vec<*const libc::c_char>,
}

impl Argv {
    pub fn new(words: &[String]) -> Result<Self> {
        if words.is_empty() {
            return Err(DispatchError::EmptyCommand);
        }
        let words = words
            .iter()
            .map(|w| {
                CString::new(w.as_str()).map_err(|_| DispatchError::InvalidArgument(w.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        let ptrs = words
            .iter()
            .map(|w| w.as_ptr())
            .chain(iter::once(ptr::null()))
            .collect();
        Ok(Argv { words, ptrs })
    }

    pub fn program(&self) -> &CString {
        &self.words[0]
    }

    pub fn to_strs(&self) -> Vec<&str> {
        self.words.iter().filter_map(|w| w.to_str().ok()).collect()
    }
}

pub enum Forked {
    Parent(Pid),
    Child,
}

pub fn create_process() -> Result<Forked> {
    match syscall(|| unsafe { unistd::fork() }) {
        Ok(ForkResult::Parent { child }) => Ok(Forked::Parent(child)),
        Ok(ForkResult::Child) => Ok(Forked::Child),
        Err(e) => Err(DispatchError::Fork(e)),
    }
}

/// Returns `(read_end, write_end)`. Both ends are close-on-exec where the
/// platform allows it, so they never leak into unrelated children; the
/// aliased standard descriptors do not inherit the flag.
pub fn create_pipe() -> Result<(RawFd, RawFd)> {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    let fds = unistd::pipe2(OFlag::O_CLOEXEC);
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    let fds = unistd::pipe();

    fds.map_err(DispatchError::Pipe)
}

/// Opens a redirect target for writing, creating it when absent. Existing
/// content is truncated unless `append` is configured.
pub fn open_target(path: &str, config: &RedirectConfig) -> Result<RawFd> {
    let mut flags = OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_CLOEXEC;
    flags |= if config.append {
        OFlag::O_APPEND
    } else {
        OFlag::O_TRUNC
    };
    let mode = Mode::from_bits_truncate(config.mode as libc::mode_t);
    fcntl::open(path, flags, mode).map_err(|source| DispatchError::OpenTarget {
        path: path.to_string(),
        source,
    })
}

/// Closes a descriptor owned by the dispatcher. EINTR is not retried: the
/// descriptor is already released by then.
pub fn close_descriptor(fd: RawFd) {
    if let Err(e) = unistd::close(fd) {
        warn!("close({}) failed: {}", fd, e);
    }
}

/// Blocks until `pid` terminates. `Ok(None)` means the child was already
/// reaped elsewhere (ECHILD), which is not a failure.
pub fn wait_for_exit(pid: Pid) -> Result<Option<ExitStatus>> {
    loop {
        match syscall(|| wait::waitpid(pid, None)) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(Some(ExitStatus::Exited(code))),
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                return Ok(Some(ExitStatus::Signaled(signal)))
            }
            Ok(_) => continue,
            Err(Errno::ECHILD) => {
                warn!("{} was already reaped", pid);
                return Ok(None);
            }
            Err(source) => return Err(DispatchError::Wait { pid, source }),
        }
    }
}

// WNOHANG: `Ok(None)` while the child is still running.
pub fn try_reap(pid: Pid) -> nix::Result<Option<ExitStatus>> {
    match syscall(|| wait::waitpid(pid, Some(WaitPidFlag::WNOHANG)))? {
        WaitStatus::Exited(_, code) => Ok(Some(ExitStatus::Exited(code))),
        WaitStatus::Signaled(_, signal, _) => Ok(Some(ExitStatus::Signaled(signal))),
        _ => Ok(None),
    }
}

/// Writes `context`, the errno text and a newline to standard error, then
/// terminates the calling child with status 1.
pub fn die(context: &[u8], errno: Errno) -> ! {
    let _ = unistd::write(libc::STDERR_FILENO, context);
    let _ = unistd::write(libc::STDERR_FILENO, errno.desc().as_bytes());
    let _ = unistd::write(libc::STDERR_FILENO, b"\n");
    unsafe { libc::_exit(1) }
}

/// Makes `dst` an alias of `src` and closes `src`. Fatal to the child.
pub fn duplicate_descriptor(src: RawFd, dst: RawFd) {
    if src == dst {
        // Got the standard number itself; dup2 would not clear close-on-exec.
        if let Err(e) = fcntl::fcntl(dst, FcntlArg::F_SETFD(FdFlag::empty())) {
            die(b"dispatchsh: cannot redirect descriptor: ", e);
        }
        return;
    }
    if let Err(e) = syscall(|| unistd::dup2(src, dst)) {
        die(b"dispatchsh: cannot redirect descriptor: ", e);
    }
    let _ = unistd::close(src);
}

/// Replaces the child image with `argv[0]`, searched on PATH.
pub fn exec_program(argv: &Argv, context: &[u8]) -> ! {
    unsafe { libc::execvp(argv.program().as_ptr(), argv.ptrs.as_ptr()) };
    die(context, Errno::last())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, io::Read, os::unix::io::FromRawFd};

    #[test]
    fn status_codes_follow_shell_convention() {
        assert_eq!(ExitStatus::Exited(3).code(), 3);
        assert_eq!(ExitStatus::Signaled(Signal::SIGINT).code(), 130);
        assert!(ExitStatus::Exited(0).success());
        assert!(!ExitStatus::Signaled(Signal::SIGKILL).success());
    }

    #[test]
    fn argv_is_null_terminated() {
        let argv = Argv::new(&["ls".to_string(), "-l".to_string()]).unwrap();
        assert_eq!(argv.to_strs(), vec!["ls", "-l"]);
        assert_eq!(argv.ptrs.len(), 3);
        assert!(argv.ptrs[2].is_null());
    }

    #[test]
    fn argv_rejects_empty_and_nul() {
        assert!(matches!(Argv::new(&[]), Err(DispatchError::EmptyCommand)));
        assert!(matches!(
            Argv::new(&["a\0b".to_string()]),
            Err(DispatchError::InvalidArgument(_))
        ));
    }

    #[test]
    fn pipe_carries_bytes() {
        let (read_end, write_end) = create_pipe().unwrap();
        unistd::write(write_end, b"hello").unwrap();
        close_descriptor(write_end);
        let mut reader = unsafe { fs::File::from_raw_fd(read_end) };
        let mut buf = String::new();
        reader.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hello");
    }

    #[test]
    fn waiting_on_a_stranger_is_benign() {
        // pid 1 is never our child.
        assert_eq!(wait_for_exit(Pid::from_raw(1)).unwrap(), None);
    }

    #[test]
    fn open_target_truncates_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        fs::write(&path, "previous content").unwrap();
        let fd = open_target(path.to_str().unwrap(), &RedirectConfig::default()).unwrap();
        unistd::write(fd, b"new").unwrap();
        close_descriptor(fd);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn open_target_can_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        fs::write(&path, "old,").unwrap();
        let config = RedirectConfig {
            append: true,
            ..RedirectConfig::default()
        };
        let fd = open_target(path.to_str().unwrap(), &config).unwrap();
        unistd::write(fd, b"new").unwrap();
        close_descriptor(fd);
        assert_eq!(fs::read_to_string(&path).unwrap(), "old,new");
    }

    #[test]
    fn open_target_reports_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out");
        match open_target(path.to_str().unwrap(), &RedirectConfig::default()) {
            Err(DispatchError::OpenTarget { source, .. }) => assert_eq!(source, Errno::ENOENT),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
