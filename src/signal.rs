//! Out-of-band error reporting from the subordinate
//!
//! The subordinate has no pipe back to the controller. When it fails it
//! opens a "file" whose name is the error text, starting with [`MARKER`].
//! The controller already inspects every open, so it sees the message and
//! ends the session with it. No real file is ever named like this.

use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use std::fmt;

/// Prefix reserved for error messages on the file-access channel
pub const MARKER: &str = "Error: ";

/// A single error message carried over the file-access channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSignal {
    text: String,
}

impl ErrorSignal {
    /// Build a signal; the marker is added unless `detail` already has it.
    ///
    /// NUL bytes would cut the message short on the wire, so they become spaces.
    pub fn new(detail: impl Into<String>) -> Self {
        let detail = detail.into().replace('\0', " ");
        let text = if detail.starts_with(MARKER) {
            detail
        } else {
            format!("{MARKER}{detail}")
        };
        Self { text }
    }

    /// Recognise an observed path argument as an error message
    pub fn parse(path: impl AsRef<[u8]>) -> Option<Self> {
        let path = path.as_ref();
        path.starts_with(MARKER.as_bytes()).then(|| Self {
            text: String::from_utf8_lossy(path).into_owned(),
        })
    }

    /// Full text, marker included
    pub fn message(&self) -> &str {
        &self.text
    }

    /// Text after the marker
    pub fn detail(&self) -> &str {
        &self.text[MARKER.len()..]
    }

    /// Put the message on the channel by opening it as a path.
    ///
    /// The open is expected to fail; the traced `openat` is what matters.
    pub fn send(&self) {
        let opened = nix::fcntl::open(self.text.as_str(), OFlag::O_RDONLY, Mode::empty());
        if opened.is_ok() {
            tracing::warn!(message = %self.text, "a file named like an error message exists");
        }
    }
}

impl fmt::Display for ErrorSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_added_once() {
        let signal = ErrorSignal::new("dlopen() failed");
        assert_eq!(signal.message(), "Error: dlopen() failed");
        assert_eq!(signal.detail(), "dlopen() failed");

        let again = ErrorSignal::new(signal.message());
        assert_eq!(again, signal);
    }

    #[test]
    fn test_parse_requires_prefix() {
        assert!(ErrorSignal::parse("/etc/my.cnf").is_none());
        assert!(ErrorSignal::parse("error: lowercase").is_none());
        assert!(ErrorSignal::parse("/tmp/Error: inside").is_none());

        let signal = ErrorSignal::parse("Error: raise sigstop failed.").unwrap();
        assert_eq!(signal.detail(), "raise sigstop failed.");
    }

    #[test]
    fn test_parse_wins_over_pattern_text() {
        // Marker check is independent of any filename pattern
        let signal = ErrorSignal::parse("Error: bad syntax in /etc/my.cnf").unwrap();
        assert_eq!(signal.message(), "Error: bad syntax in /etc/my.cnf");
    }

    #[test]
    fn test_interior_nul_replaced() {
        let signal = ErrorSignal::new("a\0b");
        assert_eq!(signal.message(), "Error: a b");
    }

    #[test]
    fn test_send_without_tracer_is_harmless() {
        ErrorSignal::new("no such file is expected to exist").send();
    }
}
