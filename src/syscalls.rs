//! File-access syscall decoding for x86_64
//!
//! Only the calls a connector uses to look for option files are decoded;
//! every other syscall number maps to `None` and is skipped by the monitor.

use crate::registers::RegisterSnapshot;

/// The file-access syscalls whose path argument is inspected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccessSyscall {
    Open,
    Stat,
    Lstat,
    Access,
    Openat,
}

impl FileAccessSyscall {
    /// Resolve an x86_64 syscall number
    pub fn from_number(num: i64) -> Option<Self> {
        match num {
            2 => Some(Self::Open),
            4 => Some(Self::Stat),
            6 => Some(Self::Lstat),
            21 => Some(Self::Access),
            257 => Some(Self::Openat),
            _ => None,
        }
    }

    pub fn number(self) -> i64 {
        match self {
            Self::Open => 2,
            Self::Stat => 4,
            Self::Lstat => 6,
            Self::Access => 21,
            Self::Openat => 257,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Stat => "stat",
            Self::Lstat => "lstat",
            Self::Access => "access",
            Self::Openat => "openat",
        }
    }

    /// Zero-based index of the argument that holds the path pointer.
    ///
    /// `openat(dfd, filename, flags, mode)` carries it second, the others first.
    pub fn path_arg_index(self) -> usize {
        match self {
            Self::Openat => 1,
            Self::Open | Self::Stat | Self::Lstat | Self::Access => 0,
        }
    }
}

/// Snapshot of one inspected syscall entry
///
/// Built fresh from the registers of a single entry stop and dropped at the
/// end of that loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallEvent {
    pub syscall: FileAccessSyscall,
    /// Address of the path string in the subordinate
    pub path_addr: u64,
}

impl SyscallEvent {
    /// Decode an entry stop; `None` when the syscall is not monitored
    pub fn decode(regs: &RegisterSnapshot) -> Option<Self> {
        let syscall = FileAccessSyscall::from_number(regs.syscall_number())?;
        Some(Self {
            syscall,
            path_addr: regs.arg(syscall.path_arg_index()),
        })
    }
}
