//! Controller-side failures and the session status they map to

use serde::Serialize;
use thiserror::Error;

/// Failures of the controller while driving the subordinate
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("fork() failed: {0}")]
    Spawn(#[source] nix::Error),

    #[error("ptrace(PTRACE_SYSCALL) failed: {0}")]
    Resume(#[source] nix::Error),

    #[error("ptrace register access failed: {0}")]
    Inspect(#[source] nix::Error),

    #[error("waitpid failed.")]
    Wait(#[source] nix::Error),

    #[error("waitpid timeout.")]
    Timeout,

    #[error("waitpid status: {0}.")]
    UnexpectedStop(String),

    #[error("syscall entry/exit alternation lost at step {step}.")]
    Desynchronized { step: u64 },

    #[error("subordinate killed by {0}.")]
    Killed(nix::sys::signal::Signal),
}

impl TraceError {
    pub fn status(&self) -> SessionStatus {
        match self {
            TraceError::Spawn(_) => SessionStatus::SpawnFailed,
            TraceError::Resume(_) | TraceError::Inspect(_) => SessionStatus::ResumeFailed,
            TraceError::Wait(_) => SessionStatus::WaitFailed,
            TraceError::Timeout => SessionStatus::TimedOut,
            TraceError::UnexpectedStop(_) | TraceError::Desynchronized { .. } => {
                SessionStatus::ProtocolViolation
            }
            TraceError::Killed(_) => SessionStatus::SubordinateError,
        }
    }
}

/// How a probe session ended
///
/// Everything except `Completed` is an unrecoverable condition and gets its
/// own process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// The subordinate exited, or collection stopped at the capacity limit
    Completed,
    SpawnFailed,
    ResumeFailed,
    WaitFailed,
    ProtocolViolation,
    TimedOut,
    /// The subordinate reported its own failure through the error channel,
    /// or died from a signal
    SubordinateError,
}

impl SessionStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            SessionStatus::Completed => 0,
            SessionStatus::SpawnFailed => 1,
            SessionStatus::ResumeFailed => 2,
            SessionStatus::WaitFailed => 3,
            SessionStatus::ProtocolViolation => 4,
            SessionStatus::TimedOut => 5,
            SessionStatus::SubordinateError => 6,
        }
    }

    pub fn is_success(self) -> bool {
        self == SessionStatus::Completed
    }
}
