// Probe configuration
//
// Every switch has a build-time default (cargo feature or environment
// variable at compile time) and can be overridden with the builder.

use std::time::Duration;

/// Default filename substring that marks a connector option file
pub const DEFAULT_PATTERN: &str = "my.cnf";

/// Default cap on the accumulated, delimited path list in bytes
pub const DEFAULT_MAX_LIST_SIZE: usize = 65536;

/// Default cap on a single path read from the subordinate (PATH_MAX - 1)
pub const DEFAULT_MAX_PATH_LEN: usize = libc::PATH_MAX as usize - 1;

/// Delimiter baked in with `CNFPROBE_DELIMITER=<char>` at build time, else newline
pub fn default_delimiter() -> char {
    option_env!("CNFPROBE_DELIMITER")
        .and_then(|s| s.chars().next())
        .unwrap_or('\n')
}

/// Whether matched accesses really happen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Matched calls are redirected to an empty path and fail with ENOENT
    Suppressed,
    /// Matched calls go through, so `!include` targets are discovered too
    Real,
}

impl Default for ReadMode {
    fn default() -> Self {
        if cfg!(feature = "read-option-files") {
            ReadMode::Real
        } else {
            ReadMode::Suppressed
        }
    }
}

/// How the controller waits for the subordinate to change state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    /// Plain blocking `waitpid`
    #[default]
    Blocking,
    /// Poll with `WNOHANG`, sleeping `initial`, then doubling while the
    /// next sleep stays below `ceiling`. Running out of sleeps is a timeout.
    Backoff { initial: Duration, ceiling: Duration },
}

impl WaitPolicy {
    /// 125µs doubling up to 2.048s, about 4.1s in total
    pub fn default_backoff() -> Self {
        WaitPolicy::Backoff {
            initial: Duration::from_micros(125),
            ceiling: Duration::from_micros(4_096_000),
        }
    }

    /// Sleep schedule between polls; empty for `Blocking`
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let (mut next, ceiling) = match *self {
            WaitPolicy::Blocking => (Duration::ZERO, Duration::ZERO),
            WaitPolicy::Backoff { initial, ceiling } => (initial, ceiling),
        };
        std::iter::from_fn(move || {
            if next.is_zero() || next >= ceiling {
                return None;
            }
            let current = next;
            next = next.saturating_mul(2);
            Some(current)
        })
    }

    /// Total time a backoff wait sleeps before giving up
    pub fn max_cumulative_delay(&self) -> Option<Duration> {
        match self {
            WaitPolicy::Blocking => None,
            WaitPolicy::Backoff { .. } => Some(self.delays().sum()),
        }
    }
}

/// Probe configuration with builder pattern
///
/// # Example
/// ```
/// use cnfprobe::config::{ProbeConfig, ReadMode};
///
/// let config = ProbeConfig::new()
///     .with_delimiter(';')
///     .with_read_mode(ReadMode::Real)
///     .with_timeout();
/// assert_eq!(config.delimiter, ';');
/// ```
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Separates entries in the rendered path list
    pub delimiter: char,

    pub read_mode: ReadMode,

    /// Byte cap on the accumulated list; reaching it ends collection early
    pub max_list_size: usize,

    /// Byte cap on one path read from the subordinate
    pub max_path_len: usize,

    /// Paths not containing this substring are ignored
    pub pattern: String,

    pub wait_policy: WaitPolicy,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            read_mode: ReadMode::default(),
            max_list_size: DEFAULT_MAX_LIST_SIZE,
            max_path_len: DEFAULT_MAX_PATH_LEN,
            pattern: DEFAULT_PATTERN.to_string(),
            wait_policy: WaitPolicy::default(),
        }
    }
}

impl ProbeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_read_mode(mut self, mode: ReadMode) -> Self {
        self.read_mode = mode;
        self
    }

    pub fn with_max_list_size(mut self, bytes: usize) -> Self {
        self.max_list_size = bytes;
        self
    }

    /// Set the single-path cap (at least one byte)
    pub fn with_max_path_len(mut self, bytes: usize) -> Self {
        self.max_path_len = bytes.max(1);
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn with_wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.wait_policy = policy;
        self
    }

    /// Use the default backoff schedule so a stuck subordinate times out
    pub fn with_timeout(self) -> Self {
        self.with_wait_policy(WaitPolicy::default_backoff())
    }

    pub fn suppresses_reads(&self) -> bool {
        self.read_mode == ReadMode::Suppressed
    }
}
