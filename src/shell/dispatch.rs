use log::{debug, error, warn};

use super::{
    error::{DispatchError, Result},
    mode::{self, Mode},
    reaper::Reaper,
    signal::{Disposition, PosixSignals, SignalDiscipline},
    strategy::{self, ChildReport},
};
use crate::config::RedirectConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub mode: Mode,
    pub children: Vec<ChildReport>,
}

impl Outcome {
    /// Status code of the last observed child; 0 when nothing was observed.
    pub fn exit_code(&self) -> i32 {
        self.children
            .iter()
            .rev()
            .find_map(|child| child.status)
            .map_or(0, |status| status.code())
    }
}

#[derive(Debug)]
pub struct Dispatcher<S = PosixSignals> {
    signals: S,
    reaper: Reaper,
    redirect: RedirectConfig,
}

impl Dispatcher<PosixSignals> {
    pub fn new() -> Self {
        Self::with_signals(PosixSignals)
    }
}

impl Default for Dispatcher<PosixSignals> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SignalDiscipline> Dispatcher<S> {
    pub fn with_signals(signals: S) -> Self {
        Dispatcher {
            signals,
            reaper: Reaper::new(),
            redirect: RedirectConfig::default(),
        }
    }

    pub fn redirect_config(mut self, redirect: RedirectConfig) -> Self {
        self.redirect = redirect;
        self
    }

    pub fn signals(&self) -> &S {
        &self.signals
    }

    pub fn reaper(&self) -> &Reaper {
        &self.reaper
    }

    /// Classifies `words` and runs the matching strategy. Foreground modes
    /// return after every child has been waited for; background returns as
    /// soon as the child exists.
    pub fn dispatch(&self, words: Vec<String>) -> Result<Outcome> {
        if let Err(e) = self.signals.set_interrupt(Disposition::Ignore) {
            warn!("cannot ignore SIGINT: {}", e);
        }
        self.reaper.sweep();

        if words.is_empty() {
            return Err(DispatchError::EmptyCommand);
        }
        let mode = mode::classify(&words);
        debug!("{:?} {:?}", mode, words);

        let children = match mode {
            Mode::Background => strategy::background(&words, &self.signals)?,
            Mode::Pipe { split } => strategy::pipe(&words, split, &self.signals)?,
            Mode::Redirect => strategy::redirect(&words, &self.redirect, &self.signals)?,
            Mode::Plain => strategy::plain(&words, &self.signals)?,
        };
        if !mode.is_foreground() {
            for child in &children {
                self.reaper.track(child.pid);
            }
        }
        Ok(Outcome { mode, children })
    }

    /// Like [`dispatch`](Self::dispatch), with soft failures logged and
    /// printed instead of returned.
    pub fn execute(&self, words: Vec<String>) -> Option<Outcome> {
        report(self.dispatch(words))
    }

    /// Boolean entry point for a line reader: `count` words of `words` form
    /// the command. Success means every child was created and, in the
    /// foreground modes, waited for, whatever its exit status.
    pub fn process_arglist(&self, count: usize, mut words: Vec<String>) -> bool {
        if count > words.len() {
            let len = words.len();
            return report(Err(DispatchError::CountMismatch { count, len })).is_some();
        }
        words.truncate(count);
        self.execute(words).is_some()
    }
}

fn report(result: Result<Outcome>) -> Option<Outcome> {
    match result {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            error!("{}", e);
            eprintln!("dispatchsh: {}", e);
            None
        }
    }
}
