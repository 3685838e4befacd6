//! cnfprobe - find the option files a MySQL/MariaDB Connector C library reads
//!
//! A controller forks a subordinate that loads the connector library and
//! makes it search for its option files. The controller traces the
//! subordinate with ptrace, copies the path argument of every `open`,
//! `openat`, `access`, `stat` and `lstat` out of its memory, and keeps the
//! ones naming an option file. By default the matched calls are redirected
//! to an empty path, so the search is observed without the files being read.

pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod memory;
pub mod monitor;
pub mod output;
pub mod probe;
pub mod registers;
pub mod session;
pub mod signal;
pub mod subordinate;
pub mod syscalls;
pub mod tracee;
pub mod trigger;
