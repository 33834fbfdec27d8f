use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

// SIGINT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Default,
    Ignore,
}

// SIGCHLD
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExitDisposition {
    Default,
    /// Ignore SIGCHLD and never keep terminated children as zombies.
    IgnoreNoZombies,
}

/// Process-wide signal dispositions, behind a seam so the dispatcher never
/// touches them through ambient global calls.
///
/// Implementations are invoked from a freshly forked child as well, so they
/// must not allocate or take locks.
pub trait SignalDiscipline {
    fn set_interrupt(&self, disposition: Disposition) -> nix::Result<()>;

    fn set_child_exit(&self, disposition: ChildExitDisposition) -> nix::Result<()>;

    /// Dispositions for the dispatcher process at session start: immune to
    /// interrupts, and real exit statuses for foreground waits.
    fn session_start(&self) -> nix::Result<()> {
        self.set_interrupt(Disposition::Ignore)?;
        self.set_child_exit(ChildExitDisposition::Default)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PosixSignals;

fn install(signal: Signal, handler: SigHandler, flags: SaFlags) -> nix::Result<()> {
    let action = SigAction::new(handler, flags, SigSet::empty());
    // Only SIG_DFL and SIG_IGN are installed here, never a Rust handler.
    unsafe { sigaction(signal, &action) }.map(drop)
}

impl SignalDiscipline for PosixSignals {
    fn set_interrupt(&self, disposition: Disposition) -> nix::Result<()> {
        let handler = match disposition {
            Disposition::Default => SigHandler::SigDfl,
            Disposition::Ignore => SigHandler::SigIgn,
        };
        install(Signal::SIGINT, handler, SaFlags::empty())
    }

    fn set_child_exit(&self, disposition: ChildExitDisposition) -> nix::Result<()> {
        match disposition {
            ChildExitDisposition::Default => {
                install(Signal::SIGCHLD, SigHandler::SigDfl, SaFlags::empty())
            }
            ChildExitDisposition::IgnoreNoZombies => {
                install(Signal::SIGCHLD, SigHandler::SigIgn, SaFlags::SA_NOCLDWAIT)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Call {
        Interrupt(Disposition),
        ChildExit(ChildExitDisposition),
    }

    /// Records requested dispositions instead of applying them.
    #[derive(Default)]
    pub(crate) struct Recorder {
        pub calls: RefCell<Vec<Call>>,
    }

    impl SignalDiscipline for Recorder {
        fn set_interrupt(&self, disposition: Disposition) -> nix::Result<()> {
            self.calls.borrow_mut().push(Call::Interrupt(disposition));
            Ok(())
        }

        fn set_child_exit(&self, disposition: ChildExitDisposition) -> nix::Result<()> {
            self.calls.borrow_mut().push(Call::ChildExit(disposition));
            Ok(())
        }
    }

    #[test]
    fn session_start_ignores_interrupt_then_restores_child_exit() {
        let recorder = Recorder::default();
        recorder.session_start().unwrap();
        assert_eq!(
            *recorder.calls.borrow(),
            vec![
                Call::Interrupt(Disposition::Ignore),
                Call::ChildExit(ChildExitDisposition::Default),
            ]
        );
    }

    #[test]
    fn posix_interrupt_ignore_survives_raise() {
        PosixSignals.set_interrupt(Disposition::Ignore).unwrap();
        nix::sys::signal::raise(Signal::SIGINT).unwrap();
    }
}
