//! Path filtering and collection
//!
//! Every path seen on the file-access channel goes through [`PathCollector`]:
//! error messages end the session, paths without the pattern are dropped, and
//! matching paths are appended once each, in first-seen order, to a
//! delimited list with a byte cap.
//!
//! Paths are compared as raw bytes, the way the kernel sees them. Only the
//! rendered list is converted to UTF-8, lossily.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;

use crate::config::ProbeConfig;
use crate::signal::ErrorSignal;

/// What an observed path argument is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A message from the subordinate; the session ends with it
    ErrorSignal(ErrorSignal),
    /// Not an option file
    Unmatched,
    /// Contains the pattern
    Match,
}

/// Result of offering a matching path to the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    Duplicate,
    /// The list cap would be reached; collection should stop
    Full,
}

/// Accumulates matching paths for one session
#[derive(Debug, Clone)]
pub struct PathCollector {
    delimiter: char,
    pattern: String,
    max_list_size: usize,
    /// Each entry wrapped in delimiters on both sides, concatenated
    raw: Vec<u8>,
    entries: Vec<OsString>,
}

impl PathCollector {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            delimiter: config.delimiter,
            pattern: config.pattern.clone(),
            max_list_size: config.max_list_size,
            raw: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Classify a path; the error marker is checked before the pattern
    pub fn classify(&self, path: impl AsRef<[u8]>) -> Classification {
        let path = path.as_ref();
        if let Some(signal) = ErrorSignal::parse(path) {
            return Classification::ErrorSignal(signal);
        }
        if contains(path, self.pattern.as_bytes()) {
            Classification::Match
        } else {
            Classification::Unmatched
        }
    }

    /// Append `path` unless it is already listed or the cap would be reached
    pub fn record(&mut self, path: impl AsRef<[u8]>) -> RecordOutcome {
        let path = path.as_ref();
        let mut buf = [0u8; 4];
        let delimiter = self.delimiter.encode_utf8(&mut buf).as_bytes();

        let mut entry = Vec::with_capacity(path.len() + 2 * delimiter.len());
        entry.extend_from_slice(delimiter);
        entry.extend_from_slice(path);
        entry.extend_from_slice(delimiter);

        if contains(&self.raw, &entry) {
            return RecordOutcome::Duplicate;
        }
        if self.raw.len() + entry.len() >= self.max_list_size {
            return RecordOutcome::Full;
        }
        self.raw.extend_from_slice(&entry);
        self.entries.push(OsStr::from_bytes(path).to_os_string());
        RecordOutcome::Recorded
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Accumulated list before delimiter normalization
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Normalize delimiters once and hand out the final list
    pub fn finish(self) -> PathList {
        PathList {
            rendered: normalize_delimiters(&String::from_utf8_lossy(&self.raw), self.delimiter),
            entries: self.entries,
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}

/// Collapse runs of `delimiter` and strip it from both ends
pub fn normalize_delimiters(raw: &str, delimiter: char) -> String {
    let mut out = String::with_capacity(raw.len());
    for part in raw.split(delimiter).filter(|part| !part.is_empty()) {
        if !out.is_empty() {
            out.push(delimiter);
        }
        out.push_str(part);
    }
    out
}

/// Final ordered, deduplicated list of matched paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathList {
    entries: Vec<OsString>,
    rendered: String,
}

impl PathList {
    /// Paths exactly as the subordinate passed them
    pub fn entries(&self) -> &[OsString] {
        &self.entries
    }

    /// Entries joined by the delimiter, no leading/trailing/doubled delimiters
    ///
    /// Invalid UTF-8 shows up as U+FFFD. A delimiter inside a path is
    /// collapsed like any other, so such a path reads differently here than
    /// in [`entries`](Self::entries).
    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
