//! Subordinate side of a probe
//!
//! Runs in the forked child and never returns. In traced mode it asks to be
//! traced and stops itself so the controller can set up before anything else
//! happens. Failures travel back over the error channel.

use nix::sys::ptrace;
use nix::sys::signal::{raise, Signal};

use crate::signal::ErrorSignal;
use crate::trigger::Trigger;

/// Exit status of a subordinate that failed
pub const FAILURE_STATUS: i32 = 1;

/// Become the traced subordinate, fire the trigger, exit
///
/// With `traced == false` nothing is traced and failures are printed on
/// stdout instead, which is handy to compare against `strace` output.
pub fn enter<T: Trigger + ?Sized>(trigger: &T, traced: bool) -> ! {
    if traced {
        if ptrace::traceme().is_err() {
            fail(&ErrorSignal::new("ptrace(TRACEME) failed."), traced);
        }
        if raise(Signal::SIGSTOP).is_err() {
            fail(&ErrorSignal::new("raise sigstop failed."), traced);
        }
    }
    match trigger.fire() {
        Ok(()) => exit(0),
        Err(signal) => fail(&signal, traced),
    }
}

fn fail(signal: &ErrorSignal, traced: bool) -> ! {
    if traced {
        signal.send();
    } else {
        println!("{signal}");
    }
    exit(FAILURE_STATUS)
}

/// Leave without running the parent's atexit handlers or stdio flushes
fn exit(status: i32) -> ! {
    // SAFETY: _exit has no preconditions.
    unsafe { libc::_exit(status) }
}
