use nix::{errno::Errno, unistd::Pid};
use thiserror::Error;

/// Soft failures of a single command line. The dispatcher survives all of
/// them and is ready for the next command.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("empty command")]
    EmptyCommand,

    #[error("word count {count} does not match {len} supplied words")]
    CountMismatch { count: usize, len: usize },

    #[error("argument contains a NUL byte: {0:?}")]
    InvalidArgument(String),

    #[error("fork failed: {0}")]
    Fork(#[source] Errno),

    #[error("pipe failed: {0}")]
    Pipe(#[source] Errno),

    #[error("cannot open {path}: {source}")]
    OpenTarget {
        path: String,
        #[source]
        source: Errno,
    },

    #[error("waitpid({pid}) failed: {source}")]
    Wait {
        pid: Pid,
        #[source]
        source: Errno,
    },
}

pub type Result<T> = std::result::Result<T, DispatchError>;
