//! Syscall monitor loop
//!
//! Drives the subordinate from its initial SIGSTOP through alternating
//! syscall-entry and syscall-exit stops. Only entry stops are inspected:
//! for the monitored file-access calls the path argument is copied out,
//! classified, optionally neutralised, and recorded.
//!
//! The phase of a stop is derived from a step counter. Every stop counted as
//! an entry is checked against the entry marker in the registers, so a lost
//! or duplicated notification ends the session instead of silently swapping
//! entry and exit for the rest of the run.

use nix::sys::signal::Signal;

use crate::collector::{Classification, RecordOutcome};
use crate::config::ProbeConfig;
use crate::error::TraceError;
use crate::memory::read_c_string;
use crate::registers::{redirect_path_argument, RegisterSnapshot};
use crate::session::{Phase, TraceSession};
use crate::syscalls::SyscallEvent;
use crate::tracee::{Stop, Tracee};

/// Where the subordinate is after being resumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Syscall,
    Exited(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Run a whole session against an already spawned subordinate
///
/// Never leaves the subordinate alive: whatever ends the loop, the tracee is
/// terminated and reaped before returning (a no-op if it already exited).
pub fn run<T: Tracee + ?Sized>(tracee: &mut T, session: &mut TraceSession, config: &ProbeConfig) {
    if let Err(err) = drive(tracee, session, config) {
        tracing::warn!(pid = %tracee.pid(), step = session.step(), error = %err, "session failed");
        session.fail(&err);
    }
    tracee.terminate();
}

/// Resume to the next syscall stop, passing signals through
///
/// Signal-delivery stops are not syscall boundaries and do not count as
/// steps. The signal is handed back on the next resume, except SIGSTOP,
/// which would only park the subordinate in a group stop.
pub fn next_syscall_boundary<T: Tracee + ?Sized>(tracee: &mut T) -> Result<Boundary, TraceError> {
    let mut pending: Option<Signal> = None;
    loop {
        tracee.resume(pending.take())?;
        match tracee.wait()? {
            Stop::Syscall => return Ok(Boundary::Syscall),
            Stop::Exited(code) => return Ok(Boundary::Exited(code)),
            Stop::Killed(sig) => return Err(TraceError::Killed(sig)),
            Stop::Signal(Signal::SIGSTOP) => {}
            Stop::Signal(sig) => {
                tracing::trace!(signal = %sig, "passing signal through");
                pending = Some(sig);
            }
            Stop::Other => {}
        }
    }
}

fn drive<T: Tracee + ?Sized>(
    tracee: &mut T,
    session: &mut TraceSession,
    config: &ProbeConfig,
) -> Result<(), TraceError> {
    match tracee.wait()? {
        Stop::Signal(Signal::SIGSTOP) => {
            tracing::debug!(pid = %tracee.pid(), "subordinate stopped itself, tracing");
        }
        Stop::Exited(code) => {
            tracing::warn!(pid = %tracee.pid(), code, "subordinate exited before its initial stop");
            session.exited(code);
            return Ok(());
        }
        other => return Err(TraceError::UnexpectedStop(format!("{other:?}"))),
    }
    tracee.enable_syscall_tracing()?;

    loop {
        if let Boundary::Exited(code) = next_syscall_boundary(tracee)? {
            tracing::debug!(code, steps = session.step(), "subordinate exited");
            session.exited(code);
            return Ok(());
        }
        if session.advance() == Phase::Exit {
            continue;
        }

        let regs = tracee.registers()?;
        if !regs.is_syscall_entry() {
            return Err(TraceError::Desynchronized {
                step: session.step(),
            });
        }
        let Some(event) = SyscallEvent::decode(&regs) else {
            continue;
        };
        if inspect(tracee, session, config, regs, &event)? == Flow::Stop {
            return Ok(());
        }
    }
}

fn inspect<T: Tracee + ?Sized>(
    tracee: &mut T,
    session: &mut TraceSession,
    config: &ProbeConfig,
    regs: RegisterSnapshot,
    event: &SyscallEvent,
) -> Result<Flow, TraceError> {
    let path = read_c_string(&*tracee, event.path_addr, config.max_path_len);
    if path.bytes.is_empty() {
        return Ok(Flow::Continue);
    }
    match session.collector().classify(&path.bytes) {
        Classification::ErrorSignal(signal) => {
            tracing::debug!(message = %signal, "subordinate reported an error");
            session.subordinate_error(&signal);
            Ok(Flow::Stop)
        }
        Classification::Unmatched => Ok(Flow::Continue),
        Classification::Match => {
            if config.suppresses_reads() {
                redirect_path_argument(tracee, regs, event, &path)?;
            }
            match session.record(&path.bytes) {
                RecordOutcome::Recorded => {
                    tracing::debug!(
                        syscall = event.syscall.name(),
                        path = %path.to_string_lossy(),
                        "option file"
                    );
                    Ok(Flow::Continue)
                }
                RecordOutcome::Duplicate => Ok(Flow::Continue),
                RecordOutcome::Full => {
                    tracing::warn!(
                        recorded = session.collector().len(),
                        limit = config.max_list_size,
                        "path list full, stopping early"
                    );
                    Ok(Flow::Stop)
                }
            }
        }
    }
}
