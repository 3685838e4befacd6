//! Property-based tests for the pure parts of cnfprobe
//!
//! Covers:
//! 1. Path collection (dedupe, order, rendering)
//! 2. Delimiter normalization
//! 3. Remote string reads
//! 4. The error channel encoding

use cnfprobe::collector::{normalize_delimiters, Classification, PathCollector, RecordOutcome};
use cnfprobe::config::ProbeConfig;
use cnfprobe::memory::{read_c_string, RemoteMemory};
use cnfprobe::signal::{ErrorSignal, MARKER};
use proptest::prelude::*;
use std::collections::HashSet;
use std::ffi::OsString;
use std::os::unix::ffi::OsStrExt;

const BASE: u64 = 0x7ffd_0000_1000;

/// Contiguous mapping at `BASE`; anything past the end faults
struct Mapping(Vec<u8>);

impl RemoteMemory for Mapping {
    fn read_word(&self, addr: u64) -> nix::Result<libc::c_long> {
        let start = addr.checked_sub(BASE).ok_or(nix::errno::Errno::EFAULT)? as usize;
        let end = start + std::mem::size_of::<libc::c_long>();
        let bytes = self.0.get(start..end).ok_or(nix::errno::Errno::EFAULT)?;
        let mut word = [0u8; std::mem::size_of::<libc::c_long>()];
        word.copy_from_slice(bytes);
        Ok(libc::c_long::from_ne_bytes(word))
    }
}

fn path_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "/[a-z]{1,6}(/[a-z.]{1,6}){0,2}/my\\.cnf",
        "/[a-z]{1,6}/[a-z]{1,8}\\.conf",
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_collector_keeps_first_seen_order_without_duplicates(
        paths in prop::collection::vec(path_strategy(), 0..30),
    ) {
        let config = ProbeConfig::new().with_delimiter('\n');
        let mut collector = PathCollector::new(&config);
        let mut expected: Vec<OsString> = Vec::new();
        for path in &paths {
            let outcome = collector.record(path);
            let path = OsString::from(path);
            if expected.contains(&path) {
                prop_assert_eq!(outcome, RecordOutcome::Duplicate);
            } else {
                prop_assert_eq!(outcome, RecordOutcome::Recorded);
                expected.push(path);
            }
        }
        let list = collector.finish();
        prop_assert_eq!(list.entries(), expected.as_slice());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_rendered_list_has_clean_delimiters(
        paths in prop::collection::vec(path_strategy(), 0..20),
        delimiter in prop::sample::select(vec!['\n', ',', ':', ';']),
    ) {
        let config = ProbeConfig::new().with_delimiter(delimiter);
        let mut collector = PathCollector::new(&config);
        for path in &paths {
            collector.record(path);
        }
        let list = collector.finish();
        let rendered = list.rendered();

        let joined = list
            .entries()
            .iter()
            .map(|entry| entry.to_string_lossy())
            .collect::<Vec<_>>()
            .join(&delimiter.to_string());
        prop_assert_eq!(rendered, joined);
        prop_assert!(!rendered.starts_with(delimiter));
        prop_assert!(!rendered.ends_with(delimiter));
        let doubled: String = [delimiter, delimiter].iter().collect();
        prop_assert!(!rendered.contains(doubled.as_str()));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_collector_never_reaches_cap(
        paths in prop::collection::vec(path_strategy(), 0..40),
        cap in 1usize..400,
    ) {
        let config = ProbeConfig::new().with_delimiter(',').with_max_list_size(cap);
        let mut collector = PathCollector::new(&config);
        for path in &paths {
            if collector.record(path) == RecordOutcome::Full {
                break;
            }
            prop_assert!(collector.raw().len() < cap);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_normalize_is_idempotent(raw in "[a-z/,]{0,40}") {
        let once = normalize_delimiters(&raw, ',');
        let twice = normalize_delimiters(&once, ',');
        prop_assert_eq!(&once, &twice);
        prop_assert!(!once.contains(",,"));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_read_c_string_stops_at_nul(
        text in prop::collection::vec(1u8..=255, 0..64),
        padding in prop::collection::vec(any::<u8>(), 8..16),
    ) {
        let mut bytes = text.clone();
        bytes.push(0);
        bytes.extend(padding);
        let read = read_c_string(&Mapping(bytes), BASE, 4095);
        prop_assert_eq!(read.bytes, text);
        prop_assert!(read.terminated);
        prop_assert!(!read.truncated);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_read_c_string_respects_cap(
        text in prop::collection::vec(1u8..=255, 1..64),
        max_len in 0usize..64,
    ) {
        let mut bytes = text.clone();
        bytes.extend([0u8; 16]);
        let read = read_c_string(&Mapping(bytes), BASE, max_len);

        prop_assert!(read.bytes.len() <= max_len);
        prop_assert!(text.starts_with(&read.bytes));
        prop_assert_eq!(read.truncated, text.len() > max_len);
        prop_assert_eq!(read.terminated, text.len() <= max_len);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_read_c_string_unterminated_mapping_is_partial(
        text in prop::collection::vec(1u8..=255, 0..64),
    ) {
        // no NUL before the mapping ends: the read returns what it got
        let read = read_c_string(&Mapping(text.clone()), BASE, 4095);
        prop_assert!(!read.terminated);
        prop_assert!(!read.truncated);
        prop_assert!(text.starts_with(&read.bytes));
        prop_assert!(text.len() - read.bytes.len() < std::mem::size_of::<libc::c_long>());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_error_signal_round_trips_through_classification(detail in "[ -~]{0,60}") {
        let signal = ErrorSignal::new(detail.as_str());
        prop_assert!(signal.message().starts_with(MARKER));
        prop_assert!(!signal.message().contains('\0'));

        let parsed = ErrorSignal::parse(signal.message());
        prop_assert_eq!(parsed.as_ref(), Some(&signal));

        let collector = PathCollector::new(&ProbeConfig::new());
        let is_signal = matches!(
            collector.classify(signal.message()),
            Classification::ErrorSignal(_)
        );
        prop_assert!(is_signal);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_distinct_byte_paths_give_distinct_entries(
        dirs in prop::collection::hash_set(prop::collection::vec(0x80u8..=0xff, 1..4), 1..10),
    ) {
        let paths: Vec<Vec<u8>> = dirs
            .into_iter()
            .map(|dir| [b"/tmp/".as_slice(), dir.as_slice(), b"/my.cnf".as_slice()].concat())
            .collect();
        let config = ProbeConfig::new().with_delimiter('\n');
        let mut collector = PathCollector::new(&config);
        for path in &paths {
            prop_assert_eq!(collector.classify(path), Classification::Match);
            prop_assert_eq!(collector.record(path), RecordOutcome::Recorded);
        }

        let list = collector.finish();
        prop_assert_eq!(list.len(), paths.len());
        let recorded: HashSet<&[u8]> = list.entries().iter().map(|entry| entry.as_bytes()).collect();
        prop_assert_eq!(recorded.len(), paths.len());
        for (entry, path) in list.entries().iter().zip(&paths) {
            prop_assert_eq!(entry.as_bytes(), path.as_slice());
        }
    }
}
