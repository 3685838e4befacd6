//! Process orchestration: fork, trace, report
//!
//! # Example
//! ```no_run
//! use cnfprobe::config::ProbeConfig;
//! use cnfprobe::probe;
//!
//! let config = ProbeConfig::new();
//! let report = probe::probe_library("/usr/lib/x86_64-linux-gnu/libmariadb.so.3", &config)?;
//! for path in report.paths.entries() {
//!     println!("{}", path.to_string_lossy());
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

use nix::unistd::{fork, ForkResult};

use crate::config::ProbeConfig;
use crate::error::TraceError;
use crate::monitor;
use crate::session::{ProbeReport, TraceSession};
use crate::subordinate;
use crate::tracee::PtraceTracee;
use crate::trigger::{ConnectorTrigger, Trigger, TriggerError};

/// Fork a subordinate running `trigger` and trace it to the end
///
/// Always returns a report; failures are in its `status` and `error`. The
/// subordinate is reaped before this returns.
pub fn run<T: Trigger + ?Sized>(trigger: &T, config: &ProbeConfig) -> ProbeReport {
    tracing::debug!(?config, "starting probe");

    // SAFETY: the child only runs the trigger and leaves through _exit; it
    // never returns into the caller's code.
    match unsafe { fork() } {
        Err(errno) => {
            let err = TraceError::Spawn(errno);
            tracing::warn!(error = %err, "could not spawn subordinate");
            ProbeReport::not_spawned(&err)
        }
        Ok(ForkResult::Child) => subordinate::enter(trigger, true),
        Ok(ForkResult::Parent { child }) => {
            let mut tracee = PtraceTracee::new(child, config.wait_policy);
            let mut session = TraceSession::new(child.as_raw(), config);
            monitor::run(&mut tracee, &mut session, config);
            let report = session.into_report();
            tracing::debug!(
                status = ?report.status,
                paths = report.paths.len(),
                "probe finished"
            );
            report
        }
    }
}

/// Probe a Connector C library for the option files it reads
pub fn probe_library(
    library: impl AsRef<std::path::Path>,
    config: &ProbeConfig,
) -> Result<ProbeReport, TriggerError> {
    let trigger = ConnectorTrigger::new(library)?;
    Ok(run(&trigger, config))
}
