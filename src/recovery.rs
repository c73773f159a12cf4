//! Recovery orchestration.
//!
//! Runs as an explicit state machine:
//!
//! ```text
//! Start -> TryPrimary -> TryTrackerFallback(0..n) -> Resolved | Exhausted
//! ```
//!
//! The supplied timestamp is tried first. On failure every tracker site is
//! asked for its own start time in [`TrackerSite::TIMESTAMP_ORDER`], each
//! site at most once and each distinct timestamp probed at most once. The
//! walk ends at the first reachable candidate or when the site list runs out.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::{info, instrument, warn};

use crate::candidate::{format_timestamp, generate_for, BroadcastKey, DEFAULT_DRIFT_SECONDS};
use crate::error::{RecoveryError, Result};
use crate::probe::Prober;
use crate::quality::{QualityResolver, ResolvedVod};
use crate::tracker::{SourceError, TimestampSource, TrackerLink, TrackerSite};

/// Where a timestamp guess came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptSource {
    Supplied,
    Tracker(TrackerSite),
}

impl fmt::Display for AttemptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptSource::Supplied => f.write_str("supplied timestamp"),
            AttemptSource::Tracker(site) => write!(f, "{site}"),
        }
    }
}

/// Why one source did not lead to a recovered video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Both fetch tiers failed.
    Unreachable(String),
    /// The page loaded but carried no start time.
    Unparseable(String),
    /// No candidate for the timestamp was reachable.
    TimestampMismatch { candidates: usize },
    /// The timestamp had already been probed.
    DuplicateTimestamp,
    /// The site omits the year and the broadcast is from another one.
    SkippedYear { year: i32 },
    /// A candidate answered but none of its renditions did.
    NoQualityVariant,
    /// The source gave no timestamp to work from.
    NoTimestamp,
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Unreachable(reason) => write!(f, "unreachable ({reason})"),
            AttemptOutcome::Unparseable(reason) => write!(f, "unparseable ({reason})"),
            AttemptOutcome::TimestampMismatch { candidates } => {
                write!(f, "timestamp mismatch, none of {candidates} candidates reachable")
            }
            AttemptOutcome::DuplicateTimestamp => f.write_str("timestamp already tried"),
            AttemptOutcome::SkippedYear { year } => {
                write!(f, "skipped, page omits the year and the broadcast is from {year}")
            }
            AttemptOutcome::NoQualityVariant => f.write_str("no quality variant reachable"),
            AttemptOutcome::NoTimestamp => f.write_str("no timestamp"),
        }
    }
}

/// One source tried during a recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAttempt {
    pub source: AttemptSource,
    pub timestamp: Option<String>,
    pub outcome: AttemptOutcome,
}

impl fmt::Display for SourceAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.timestamp {
            Some(ts) => write!(f, "{} [{ts}]: {}", self.source, self.outcome),
            None => write!(f, "{}: {}", self.source, self.outcome),
        }
    }
}

/// Non-blocking notices raised during recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    OldBroadcast { days: i64 },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::OldBroadcast { days } => write!(
                f,
                "Video is {days} days old. Chances of recovery are very slim."
            ),
        }
    }
}

/// A successful recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryOutcome {
    pub vod: ResolvedVod,
    pub advisories: Vec<Advisory>,
    /// Sources that failed before the one that worked.
    pub attempts: Vec<SourceAttempt>,
}

/// Candidate window and age policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverySettings {
    pub domains: Vec<String>,
    pub drift_seconds: u32,
    pub old_broadcast_days: i64,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            domains: crate::config::default_domains(),
            drift_seconds: DEFAULT_DRIFT_SECONDS,
            old_broadcast_days: 60,
        }
    }
}

enum State {
    Start,
    TryPrimary,
    TryTrackerFallback(usize),
    Resolved(ResolvedVod),
    Exhausted,
}

/// Composes generation, probing, tracker lookups and quality selection.
pub struct Orchestrator {
    prober: Prober,
    quality: QualityResolver,
    sources: Arc<dyn TimestampSource>,
    settings: RecoverySettings,
    now: Option<DateTime<Utc>>,
}

impl Orchestrator {
    pub fn new(
        prober: Prober,
        quality: QualityResolver,
        sources: Arc<dyn TimestampSource>,
        settings: RecoverySettings,
    ) -> Self {
        Self {
            prober,
            quality,
            sources,
            settings,
            now: None,
        }
    }

    /// Pin the wall clock used for the age advisory and the year rule.
    #[must_use]
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    /// Recover a broadcast from its key, skipping the `excluded` tracker sites.
    #[instrument(skip(self), fields(channel = key.channel(), id = key.broadcast_id()))]
    pub async fn recover(
        &self,
        key: &BroadcastKey,
        excluded: &[TrackerSite],
    ) -> Result<RecoveryOutcome> {
        self.run(key, AttemptSource::Supplied, excluded, Vec::new())
            .await
    }

    /// Recover starting from a tracker page.
    ///
    /// The linked site is asked for the start time first, then the others in
    /// fallback order. Sites used here are not asked again during recovery.
    #[instrument(skip(self), fields(url = %link))]
    pub async fn recover_from_tracker(&self, link: &TrackerLink) -> Result<RecoveryOutcome> {
        let key = BroadcastKey::new(&link.channel, &link.broadcast_id, None)?;

        let mut order = vec![link.site];
        order.extend(
            TrackerSite::TIMESTAMP_ORDER
                .into_iter()
                .filter(|s| *s != link.site),
        );

        let mut attempts = Vec::new();
        let mut consulted = Vec::new();
        for site in order {
            consulted.push(site);
            match self.lookup_start(site, &key).await {
                Ok(start) => {
                    info!("Datetime from {site}: {}", format_timestamp(start));
                    let seeded = key.with_start(start);
                    return self
                        .run(&seeded, AttemptSource::Tracker(site), &consulted, attempts)
                        .await;
                }
                Err(outcome) => attempts.push(SourceAttempt {
                    source: AttemptSource::Tracker(site),
                    timestamp: None,
                    outcome,
                }),
            }
        }

        Err(RecoveryError::NoTimestamp { attempts })
    }

    /// Probe the candidate window of `key` and return the earliest reachable playlist.
    pub async fn probe_key(&self, key: &BroadcastKey) -> Option<String> {
        let candidates =
            generate_for(key, self.settings.drift_seconds, &self.settings.domains)?;
        let urls: Vec<String> = candidates.iter().map(|c| c.url()).collect();
        self.prober.probe_first(&urls).await
    }

    async fn lookup_start(
        &self,
        site: TrackerSite,
        key: &BroadcastKey,
    ) -> std::result::Result<DateTime<Utc>, AttemptOutcome> {
        match self
            .sources
            .lookup(site, key.channel(), key.broadcast_id())
            .await
        {
            Ok(record) => record
                .start
                .ok_or_else(|| AttemptOutcome::Unparseable("no start time on page".to_string())),
            Err(SourceError::Unreachable { reason, .. }) => Err(AttemptOutcome::Unreachable(reason)),
            Err(SourceError::Malformed { reason, .. }) => Err(AttemptOutcome::Unparseable(reason)),
        }
    }

    /// Probe one timestamp guess and select its rendition.
    async fn attempt(&self, key: &BroadcastKey) -> std::result::Result<ResolvedVod, AttemptOutcome> {
        let candidates = generate_for(key, self.settings.drift_seconds, &self.settings.domains)
            .ok_or(AttemptOutcome::NoTimestamp)?;
        let urls: Vec<String> = candidates.iter().map(|c| c.url()).collect();

        let Some(found) = self.prober.probe_first(&urls).await else {
            return Err(AttemptOutcome::TimestampMismatch {
                candidates: urls.len(),
            });
        };
        info!("Found playlist: {found}");

        self.quality
            .resolve(&found)
            .await
            .ok_or(AttemptOutcome::NoQualityVariant)
    }

    fn age_advisory(&self, start: DateTime<Utc>) -> Option<Advisory> {
        let days = (self.now() - start).num_days().max(0);
        (days > self.settings.old_broadcast_days).then_some(Advisory::OldBroadcast { days })
    }

    async fn run(
        &self,
        key: &BroadcastKey,
        primary: AttemptSource,
        excluded: &[TrackerSite],
        mut attempts: Vec<SourceAttempt>,
    ) -> Result<RecoveryOutcome> {
        let sites: Vec<TrackerSite> = TrackerSite::TIMESTAMP_ORDER
            .into_iter()
            .filter(|s| !excluded.contains(s))
            .collect();

        let mut advisories = Vec::new();
        let mut tried: HashSet<String> = HashSet::new();
        let mut state = State::Start;

        loop {
            state = match state {
                State::Start => {
                    let Some(start) = key.start() else {
                        return Err(RecoveryError::NoTimestamp { attempts });
                    };
                    if let Some(advisory) = self.age_advisory(start) {
                        warn!("{advisory}");
                        advisories.push(advisory);
                    }
                    State::TryPrimary
                }

                State::TryPrimary => {
                    let Some(start) = key.start() else {
                        return Err(RecoveryError::NoTimestamp { attempts });
                    };
                    let timestamp = format_timestamp(start);
                    tried.insert(timestamp.clone());

                    match self.attempt(key).await {
                        Ok(vod) => State::Resolved(vod),
                        Err(outcome) => {
                            info!("Unable to recover with {timestamp}, trying alternate sources...");
                            attempts.push(SourceAttempt {
                                source: primary,
                                timestamp: Some(timestamp),
                                outcome,
                            });
                            State::TryTrackerFallback(0)
                        }
                    }
                }

                State::TryTrackerFallback(n) => {
                    let Some(&site) = sites.get(n) else {
                        state = State::Exhausted;
                        continue;
                    };
                    match self.try_site(site, key, &mut tried).await {
                        Ok(vod) => State::Resolved(vod),
                        Err(attempt) => {
                            warn!("{attempt}");
                            attempts.push(attempt);
                            State::TryTrackerFallback(n + 1)
                        }
                    }
                }

                State::Resolved(vod) => {
                    info!(url = %vod.url, quality = %vod.quality, "recovered");
                    return Ok(RecoveryOutcome {
                        vod,
                        advisories,
                        attempts,
                    });
                }

                State::Exhausted => {
                    return Err(RecoveryError::AllSourcesExhausted { attempts });
                }
            };
        }
    }

    async fn try_site(
        &self,
        site: TrackerSite,
        key: &BroadcastKey,
        tried: &mut HashSet<String>,
    ) -> std::result::Result<ResolvedVod, SourceAttempt> {
        let failed = |timestamp: Option<String>, outcome| SourceAttempt {
            source: AttemptSource::Tracker(site),
            timestamp,
            outcome,
        };

        if site.omits_year() {
            if let Some(start) = key.start() {
                if start.year() != self.now().year() {
                    return Err(failed(None, AttemptOutcome::SkippedYear { year: start.year() }));
                }
            }
        }

        let start = self
            .lookup_start(site, key)
            .await
            .map_err(|outcome| failed(None, outcome))?;
        let timestamp = format_timestamp(start);

        if !tried.insert(timestamp.clone()) {
            return Err(failed(Some(timestamp), AttemptOutcome::DuplicateTimestamp));
        }

        info!("Trying {timestamp} from {site}");
        self.attempt(&key.with_start(start))
            .await
            .map_err(|outcome| failed(Some(timestamp), outcome))
    }
}
