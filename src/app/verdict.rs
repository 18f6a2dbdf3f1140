use thiserror::Error;
use tracing::info;

use crate::domain::ScanReport;

/// Turns a scan report into an admit/deny verdict.
pub trait VerdictPolicy: Send + Sync {
    fn evaluate(&self, report: &ScanReport) -> Result<(), ScanFailed>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Scan result is FAILED (status: {status})")]
pub struct ScanFailed {
    pub status: String,
}

/// Admits only reports whose status is `pass`, ignoring case. Every other
/// status, including in-progress ones, denies.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassStatusPolicy;

impl PassStatusPolicy {
    const PASS: &'static str = "pass";
}

impl VerdictPolicy for PassStatusPolicy {
    fn evaluate(&self, report: &ScanReport) -> Result<(), ScanFailed> {
        if report.status().eq_ignore_ascii_case(Self::PASS) {
            return Ok(());
        }

        info!(
            "scan of {} ({}) did not pass: {}",
            report.tag(),
            report.digest(),
            report.status()
        );
        Err(ScanFailed {
            status: report.status().to_owned(),
        })
    }
}
