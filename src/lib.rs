//! A command dispatcher for a line-oriented interpreter.
//!
//! Each tokenized command line runs in exactly one of four modes, checked in
//! this order:
//!
//! - `cmd args &` runs detached, without waiting;
//! - `left | right` connects two children through a pipe;
//! - `cmd args > file` sends standard output to `file`;
//! - anything else runs in the foreground.
//!
//! [`Dispatcher`] is the entry point; [`Shell`] is a small interactive loop
//! around it.

pub mod config;
mod helper;
pub mod logging;
pub mod shell;

pub use config::Config;
pub use shell::{error::DispatchError, Dispatcher, Outcome, Shell};
