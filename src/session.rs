//! State of one probe run and the report it ends in

use std::borrow::Cow;

use serde::Serialize;

use crate::collector::{PathCollector, PathList, RecordOutcome};
use crate::config::ProbeConfig;
use crate::error::{SessionStatus, TraceError};
use crate::signal::ErrorSignal;

/// Which half of a syscall a stop belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Entry,
    Exit,
}

/// Everything the controller accumulates while tracing one subordinate
#[derive(Debug)]
pub struct TraceSession {
    pid: i32,
    collector: PathCollector,
    error: String,
    /// Syscall stops seen since the initial stop; odd = entry, even = exit
    step: u64,
    status: SessionStatus,
    subordinate_exit: Option<i32>,
}

impl TraceSession {
    pub fn new(pid: i32, config: &ProbeConfig) -> Self {
        Self {
            pid,
            collector: PathCollector::new(config),
            error: String::new(),
            step: 0,
            status: SessionStatus::Completed,
            subordinate_exit: None,
        }
    }

    /// Count one more syscall stop and say which phase it is
    pub fn advance(&mut self) -> Phase {
        self.step += 1;
        if self.step % 2 == 1 {
            Phase::Entry
        } else {
            Phase::Exit
        }
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn collector(&self) -> &PathCollector {
        &self.collector
    }

    pub fn record(&mut self, path: impl AsRef<[u8]>) -> RecordOutcome {
        self.collector.record(path)
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// The subordinate exited on its own
    pub fn exited(&mut self, code: i32) {
        self.subordinate_exit = Some(code);
    }

    /// The subordinate reported a failure of its own
    pub fn subordinate_error(&mut self, signal: &ErrorSignal) {
        self.status = SessionStatus::SubordinateError;
        self.error.push_str(signal.message());
    }

    /// The controller hit an unrecoverable condition
    pub fn fail(&mut self, err: &TraceError) {
        self.status = err.status();
        self.error.push_str(ErrorSignal::new(err.to_string()).message());
    }

    pub fn into_report(self) -> ProbeReport {
        ProbeReport {
            pid: self.pid,
            paths: self.collector.finish(),
            error: (!self.error.is_empty()).then_some(self.error),
            status: self.status,
            subordinate_exit: self.subordinate_exit,
        }
    }
}

/// Outcome of a probe: matched paths, optional error text, status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /// Subordinate process id, 0 if none was spawned
    pub pid: i32,
    pub paths: PathList,
    /// Starts with the error marker when present
    pub error: Option<String>,
    pub status: SessionStatus,
    /// Exit code of the subordinate if it exited by itself
    pub subordinate_exit: Option<i32>,
}

impl ProbeReport {
    /// Report for a run that never got a subordinate
    pub fn not_spawned(err: &TraceError) -> Self {
        Self {
            pid: 0,
            paths: PathList::default(),
            error: Some(ErrorSignal::new(err.to_string()).message().to_owned()),
            status: err.status(),
            subordinate_exit: None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Serializable view of a report for `--format json`
///
/// Paths that are not valid UTF-8 are rendered lossily.
#[derive(Debug, Serialize)]
pub struct ReportSummary<'a> {
    pub paths: Vec<Cow<'a, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
    pub status: SessionStatus,
    pub exit_code: i32,
}

impl<'a> From<&'a ProbeReport> for ReportSummary<'a> {
    fn from(report: &'a ProbeReport) -> Self {
        Self {
            paths: report
                .paths
                .entries()
                .iter()
                .map(|path| path.to_string_lossy())
                .collect(),
            error: report.error.as_deref(),
            status: report.status,
            exit_code: report.exit_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phases_alternate_from_entry() {
        let mut session = TraceSession::new(1, &ProbeConfig::new());
        assert_eq!(session.advance(), Phase::Entry);
        assert_eq!(session.advance(), Phase::Exit);
        assert_eq!(session.advance(), Phase::Entry);
        assert_eq!(session.step(), 3);
    }

    #[test]
    fn test_clean_report() {
        let mut session = TraceSession::new(42, &ProbeConfig::new());
        session.record("/etc/my.cnf");
        session.exited(0);
        let report = session.into_report();
        assert!(report.is_success());
        assert_eq!(report.error, None);
        assert_eq!(report.paths.entries(), ["/etc/my.cnf"]);
        assert_eq!(report.subordinate_exit, Some(0));
        assert_eq!(report.pid, 42);
    }

    #[test]
    fn test_subordinate_error_text_is_verbatim() {
        let mut session = TraceSession::new(1, &ProbeConfig::new());
        let signal = ErrorSignal::new("mysql_init() failed -- out of memory?");
        session.subordinate_error(&signal);
        let report = session.into_report();
        assert_eq!(report.status, SessionStatus::SubordinateError);
        assert_eq!(
            report.error.as_deref(),
            Some("Error: mysql_init() failed -- out of memory?")
        );
        assert_eq!(report.exit_code(), 6);
    }

    #[test]
    fn test_controller_failure_uses_marker() {
        let mut session = TraceSession::new(1, &ProbeConfig::new());
        session.fail(&TraceError::Timeout);
        let report = session.into_report();
        assert_eq!(report.status, SessionStatus::TimedOut);
        assert_eq!(report.error.as_deref(), Some("Error: waitpid timeout."));
    }

    #[test]
    fn test_not_spawned() {
        let report = ProbeReport::not_spawned(&TraceError::Spawn(nix::errno::Errno::EAGAIN));
        assert_eq!(report.status, SessionStatus::SpawnFailed);
        assert!(report.paths.is_empty());
        assert!(report.error.unwrap().starts_with("Error: fork() failed"));
    }

    #[test]
    fn test_summary_serializes() {
        let mut session = TraceSession::new(1, &ProbeConfig::new());
        session.record("/etc/my.cnf");
        let report = session.into_report();
        let json = serde_json::to_value(ReportSummary::from(&report)).unwrap();
        assert_eq!(json["paths"][0], "/etc/my.cnf");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["exit_code"], 0);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_summary_renders_non_utf8_lossily() {
        let mut session = TraceSession::new(1, &ProbeConfig::new());
        session.record(b"/tmp/\xff/my.cnf");
        session.record(b"/tmp/\xfe/my.cnf");
        let report = session.into_report();
        assert_eq!(report.paths.len(), 2);

        let json = serde_json::to_value(ReportSummary::from(&report)).unwrap();
        assert_eq!(json["paths"][0], "/tmp/\u{fffd}/my.cnf");
        assert_eq!(json["paths"][1], "/tmp/\u{fffd}/my.cnf");
    }
}
