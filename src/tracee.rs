//! Control surface of the traced subordinate
//!
//! [`Tracee`] is everything the monitor needs from the subordinate. The real
//! implementation, [`PtraceTracee`], sits on `nix::sys::ptrace` and `waitpid`.

use nix::sys::ptrace;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::config::WaitPolicy;
use crate::error::TraceError;
use crate::memory::RemoteMemory;
use crate::registers::RegisterSnapshot;

/// A state change of the subordinate as reported by `waitpid`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// Syscall-entry or syscall-exit stop
    Syscall,
    /// Signal-delivery stop
    Signal(Signal),
    /// Ptrace event stop or continue notification
    Other,
    Exited(i32),
    Killed(Signal),
}

/// Operations on a stopped, traced subordinate
pub trait Tracee: RemoteMemory {
    fn pid(&self) -> Pid;

    /// Mark syscall stops and kill the subordinate if the controller dies
    fn enable_syscall_tracing(&mut self) -> Result<(), TraceError>;

    /// Continue to the next syscall boundary, delivering `signal` if given
    fn resume(&mut self, signal: Option<Signal>) -> Result<(), TraceError>;

    /// Block (or poll, per wait policy) until the subordinate changes state
    fn wait(&mut self) -> Result<Stop, TraceError>;

    fn registers(&self) -> Result<RegisterSnapshot, TraceError>;

    fn set_registers(&mut self, regs: &RegisterSnapshot) -> Result<(), TraceError>;

    /// Kill and reap the subordinate; a no-op once it has been reaped
    fn terminate(&mut self);
}

/// The forked subordinate, traced with ptrace
#[derive(Debug)]
pub struct PtraceTracee {
    pid: Pid,
    policy: WaitPolicy,
    reaped: bool,
}

impl PtraceTracee {
    pub fn new(pid: Pid, policy: WaitPolicy) -> Self {
        Self {
            pid,
            policy,
            reaped: false,
        }
    }

    pub fn is_reaped(&self) -> bool {
        self.reaped
    }

    fn poll(&self) -> Result<WaitStatus, TraceError> {
        for delay in self.policy.delays() {
            match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)).map_err(TraceError::Wait)? {
                WaitStatus::StillAlive => std::thread::sleep(delay),
                status => return Ok(status),
            }
        }
        match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)).map_err(TraceError::Wait)? {
            WaitStatus::StillAlive => Err(TraceError::Timeout),
            status => Ok(status),
        }
    }

    fn classify(&mut self, status: WaitStatus) -> Stop {
        match status {
            WaitStatus::PtraceSyscall(_) => Stop::Syscall,
            WaitStatus::Stopped(_, sig) => Stop::Signal(sig),
            WaitStatus::Exited(_, code) => {
                self.reaped = true;
                Stop::Exited(code)
            }
            WaitStatus::Signaled(_, sig, _) => {
                self.reaped = true;
                Stop::Killed(sig)
            }
            _ => Stop::Other,
        }
    }
}

impl RemoteMemory for PtraceTracee {
    fn read_word(&self, addr: u64) -> nix::Result<libc::c_long> {
        ptrace::read(self.pid, addr as usize as ptrace::AddressType)
    }
}

impl Tracee for PtraceTracee {
    fn pid(&self) -> Pid {
        self.pid
    }

    fn enable_syscall_tracing(&mut self) -> Result<(), TraceError> {
        let options = ptrace::Options::PTRACE_O_TRACESYSGOOD | ptrace::Options::PTRACE_O_EXITKILL;
        ptrace::setoptions(self.pid, options).map_err(TraceError::Resume)
    }

    fn resume(&mut self, signal: Option<Signal>) -> Result<(), TraceError> {
        ptrace::syscall(self.pid, signal).map_err(TraceError::Resume)
    }

    fn wait(&mut self) -> Result<Stop, TraceError> {
        let status = match self.policy {
            WaitPolicy::Blocking => waitpid(self.pid, None).map_err(TraceError::Wait)?,
            WaitPolicy::Backoff { .. } => self.poll()?,
        };
        Ok(self.classify(status))
    }

    fn registers(&self) -> Result<RegisterSnapshot, TraceError> {
        ptrace::getregs(self.pid)
            .map(RegisterSnapshot::from_raw)
            .map_err(TraceError::Inspect)
    }

    fn set_registers(&mut self, regs: &RegisterSnapshot) -> Result<(), TraceError> {
        ptrace::setregs(self.pid, regs.into_raw()).map_err(TraceError::Inspect)
    }

    fn terminate(&mut self) {
        if self.reaped {
            return;
        }
        // SIGKILL is the one signal a tracer cannot intercept.
        if let Err(errno) = kill(self.pid, Signal::SIGKILL) {
            tracing::debug!(pid = %self.pid, %errno, "kill failed");
        }
        loop {
            match waitpid(self.pid, None) {
                Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) => break,
                Ok(_) => continue,
                Err(errno) => {
                    tracing::debug!(pid = %self.pid, %errno, "reap failed");
                    break;
                }
            }
        }
        self.reaped = true;
        tracing::debug!(pid = %self.pid, "subordinate terminated");
    }
}

impl Drop for PtraceTracee {
    fn drop(&mut self) {
        self.terminate();
    }
}
