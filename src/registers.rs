//! Register snapshots of the stopped subordinate
//!
//! The snapshot is read once per entry stop, edited locally and committed back
//! as a whole with a single `PTRACE_SETREGS`; it is never written piecemeal.

use crate::error::TraceError;
use crate::memory::RemoteString;
use crate::syscalls::SyscallEvent;
use crate::tracee::Tracee;

/// Full x86_64 register set of the subordinate at a syscall stop
#[derive(Clone, Copy)]
pub struct RegisterSnapshot {
    raw: libc::user_regs_struct,
}

impl RegisterSnapshot {
    pub fn from_raw(raw: libc::user_regs_struct) -> Self {
        Self { raw }
    }

    pub fn into_raw(self) -> libc::user_regs_struct {
        self.raw
    }

    /// Syscall number (orig_rax survives the kernel clobbering rax)
    pub fn syscall_number(&self) -> i64 {
        self.raw.orig_rax as i64
    }

    /// The kernel parks -ENOSYS in rax at every syscall-entry stop.
    pub fn is_syscall_entry(&self) -> bool {
        self.raw.rax == (-(libc::ENOSYS as i64)) as u64
    }

    /// Syscall argument by index, in rdi, rsi, rdx, r10, r8, r9 order
    pub fn arg(&self, index: usize) -> u64 {
        match index {
            0 => self.raw.rdi,
            1 => self.raw.rsi,
            2 => self.raw.rdx,
            3 => self.raw.r10,
            4 => self.raw.r8,
            5 => self.raw.r9,
            _ => 0,
        }
    }

    pub fn set_arg(&mut self, index: usize, value: u64) {
        match index {
            0 => self.raw.rdi = value,
            1 => self.raw.rsi = value,
            2 => self.raw.rdx = value,
            3 => self.raw.r10 = value,
            4 => self.raw.r8 = value,
            5 => self.raw.r9 = value,
            _ => {}
        }
    }

    /// Registers as they look at an entry stop of syscall `nr`
    #[cfg(test)]
    pub(crate) fn syscall_entry(nr: i64, args: [u64; 6]) -> Self {
        // SAFETY: user_regs_struct is plain integers; all-zero is a valid value.
        let raw: libc::user_regs_struct = unsafe { std::mem::zeroed() };
        let mut regs = Self { raw };
        regs.raw.orig_rax = nr as u64;
        regs.raw.rax = (-(libc::ENOSYS as i64)) as u64;
        for (index, value) in args.into_iter().enumerate() {
            regs.set_arg(index, value);
        }
        regs
    }
}

impl std::fmt::Debug for RegisterSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterSnapshot")
            .field("orig_rax", &self.raw.orig_rax)
            .field("rax", &format_args!("{:#x}", self.raw.rax))
            .field("rdi", &format_args!("{:#x}", self.raw.rdi))
            .field("rsi", &format_args!("{:#x}", self.raw.rsi))
            .finish()
    }
}

/// Address the path argument should be rewritten to so the call sees ""
///
/// For a fully read string that is its own terminating NUL. A truncated or
/// partial read never saw the NUL, so the argument becomes a null pointer
/// instead and the call fails with EFAULT.
pub fn empty_path_address(event: &SyscallEvent, path: &RemoteString) -> u64 {
    if path.terminated {
        event.path_addr + path.bytes.len() as u64
    } else {
        0
    }
}

/// Point the syscall's path argument at an empty string and commit the
/// registers before the subordinate enters the kernel.
pub fn redirect_path_argument<T: Tracee + ?Sized>(
    tracee: &mut T,
    mut regs: RegisterSnapshot,
    event: &SyscallEvent,
    path: &RemoteString,
) -> Result<(), TraceError> {
    let target = empty_path_address(event, path);
    regs.set_arg(event.syscall.path_arg_index(), target);
    tracing::trace!(
        syscall = event.syscall.name(),
        from = event.path_addr,
        to = target,
        "redirecting path argument"
    );
    tracee.set_registers(&regs)
}
