//! Maps a finished run to the process exit status.

use crate::aggregator::RunReport;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Document emitted and the policy holds.
pub const EXIT_OK: u8 = 0;
/// Fatal: no session, bad configuration or unserializable document.
pub const EXIT_FATAL: u8 = 1;
/// Document emitted but the policy does not hold.
pub const EXIT_DEGRADED: u8 = 2;

/// The query whose success the default policy requires.
pub const PRIMARY_QUERY: &str = "status";

/// Which query failures turn a run into a non-zero exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExitPolicy {
    /// The `status` query must succeed.
    #[default]
    Primary,
    /// Every query must succeed.
    Strict,
    /// Connecting is enough.
    Lenient,
}

impl ExitPolicy {
    /// True if `report` satisfies the policy.
    pub fn is_satisfied(&self, report: &RunReport) -> bool {
        match self {
            ExitPolicy::Primary => report.succeeded(PRIMARY_QUERY),
            ExitPolicy::Strict => report.is_complete(),
            ExitPolicy::Lenient => true,
        }
    }

    /// Exit status for a run that produced a document.
    pub fn exit_code(&self, report: &RunReport) -> u8 {
        if self.is_satisfied(report) {
            return EXIT_OK;
        }
        match self {
            ExitPolicy::Primary => warn!(
                "Primary query '{}' did not succeed; exiting with {}",
                PRIMARY_QUERY, EXIT_DEGRADED
            ),
            _ => warn!(
                "{} queries failed under strict policy; exiting with {}",
                report.failures().len(),
                EXIT_DEGRADED
            ),
        }
        EXIT_DEGRADED
    }
}
