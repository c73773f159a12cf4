//! Recovery error taxonomy.
//!
//! Only the terminal states escape the orchestrator: a broadcast with no usable
//! starting timestamp, and a broadcast for which every timestamp source was tried
//! and failed. Per-site and per-candidate failures are recorded as
//! [`SourceAttempt`]s and carried inside both terminal variants.

use std::fmt::Write as _;

use thiserror::Error;

use crate::recovery::SourceAttempt;

/// Terminal recovery failures.
#[derive(Error, Debug)]
pub enum RecoveryError {
    /// No timestamp was supplied and none could be found; the caller must
    /// collect one manually. `attempts` lists the sites asked, if any.
    #[error(
        "no broadcast timestamp available, enter one manually (YYYY-MM-DD HH:MM:SS, UTC){}",
        format_attempts(.attempts)
    )]
    NoTimestamp { attempts: Vec<SourceAttempt> },

    /// Every timestamp source was tried without a reachable candidate.
    #[error("unable to recover the video, all sources exhausted:{}", format_attempts(.attempts))]
    AllSourcesExhausted { attempts: Vec<SourceAttempt> },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, RecoveryError>;

fn format_attempts(attempts: &[SourceAttempt]) -> String {
    let mut out = String::new();
    for attempt in attempts {
        let _ = write!(out, "\n  - {attempt}");
    }
    out
}
