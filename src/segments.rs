//! Segment availability checks.
//!
//! Each segment gets exactly one existence check. Long broadcasts have
//! thousands of segments and some loss is normal, so a partial result is a
//! report, never an error.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::playlist::PlaylistSegment;
use crate::probe::{ExistenceCheck, ProbeSettings, Prober, ProgressCallback};

/// Concurrency and timeout for segment checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSettings {
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for SegmentSettings {
    fn default() -> Self {
        Self {
            concurrency: 64,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Caller-facing summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStatus {
    /// Every segment answered. Also reported when none did.
    AllAvailable,
    Partial { reachable: usize, total: usize },
}

impl fmt::Display for SegmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentStatus::AllAvailable => f.write_str("All Segments are Available"),
            SegmentStatus::Partial { reachable, total } => {
                write!(f, "{reachable} out of {total} Segments are Available")
            }
        }
    }
}

/// Result of checking one playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentReport {
    pub reachable: usize,
    pub total: usize,
    /// Indices of segments that did not answer, in playback order.
    pub missing: Vec<usize>,
}

impl SegmentReport {
    pub fn status(&self) -> SegmentStatus {
        if self.reachable == self.total || self.reachable == 0 {
            SegmentStatus::AllAvailable
        } else {
            SegmentStatus::Partial {
                reachable: self.reachable,
                total: self.total,
            }
        }
    }
}

/// Checks every segment of a reconstructed playlist.
pub struct SegmentValidator {
    prober: Prober,
}

impl SegmentValidator {
    pub fn new(check: Arc<dyn ExistenceCheck>, settings: SegmentSettings) -> Self {
        let probe = ProbeSettings {
            concurrency: settings.concurrency,
            timeout: settings.timeout,
            retries: 0,
            backoff: Duration::ZERO,
        };
        Self {
            prober: Prober::new(check, probe),
        }
    }

    /// Single-attempt check of every segment.
    pub async fn validate(
        &self,
        segments: &[PlaylistSegment],
        progress: Option<&ProgressCallback>,
    ) -> SegmentReport {
        let urls: Vec<String> = segments.iter().map(|s| s.url.clone()).collect();
        let verdicts = self.prober.verdicts(&urls, progress).await;

        let missing: Vec<usize> = segments
            .iter()
            .zip(&verdicts)
            .filter_map(|(segment, reachable)| (!reachable).then_some(segment.index))
            .collect();

        let report = SegmentReport {
            reachable: segments.len() - missing.len(),
            total: segments.len(),
            missing,
        };
        info!("{}", report.status());
        report
    }
}
