use anyhow::Result;
use log::{debug, info};

use crate::config::Config;

pub mod dispatch;
pub mod error;
pub mod mode;
pub mod process;
mod reaper;
pub mod signal;
pub mod strategy;

pub use dispatch::{Dispatcher, Outcome};
pub use reaper::Reaper;

use self::signal::SignalDiscipline;

/// Retries `f` while it fails with EINTR.
pub(crate) fn syscall<F, T>(f: F) -> Result<T, nix::Error>
where
    F: Fn() -> Result<T, nix::Error>,
{
    loop {
        match f() {
            Err(nix::errno::Errno::EINTR) => continue,
            other => return other,
        }
    }
}

/// Interactive line reader in front of a [`Dispatcher`].
#[derive(Debug)]
pub struct Shell {
    config: Config,
    dispatcher: Dispatcher,
}

impl Shell {
    pub fn new(config: Config) -> Self {
        let dispatcher = Dispatcher::new().redirect_config(config.redirect.clone());
        Self { config, dispatcher }
    }

    pub fn run(&self) -> Result<()> {
        self.dispatcher.signals().session_start()?;
        self.dispatcher.reaper().spawn_watcher()?;

        let history = self.config.history_path();
        let mut rl = rustyline::Editor::<()>::new()?;
        if let Err(e) = rl.load_history(&history) {
            debug!("no history loaded from {}: {}", history.display(), e);
        }

        let mut prev_ok = true;
        loop {
            let symbol = if prev_ok { '$' } else { '!' };
            match rl.readline(&format!("{} {} ", self.config.prompt, symbol)) {
                Ok(line) => {
                    let line_trimmed = line.trim();
                    if line_trimmed.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line_trimmed);

                    let words = line_trimmed
                        .split_whitespace()
                        .map(String::from)
                        .collect::<Vec<_>>();
                    prev_ok = self
                        .dispatcher
                        .execute(words)
                        .map_or(false, |outcome| outcome.exit_code() == 0);
                }
                Err(rustyline::error::ReadlineError::Interrupted) => {
                    eprintln!("dispatchsh: Interrupted");
                }
                Err(rustyline::error::ReadlineError::Eof) => break,
                Err(e) => {
                    eprintln!("dispatchsh: Error: {}", e);
                    break;
                }
            }
        }

        if let Err(e) = rl.save_history(&history) {
            eprintln!("dispatchsh: Unable to save history: {}", e);
        }
        info!(
            "session ended, {} background children pending",
            self.dispatcher.reaper().pending()
        );
        Ok(())
    }
}
