//! Hash candidate generation.
//!
//! Twitch stores VOD playlists under a path derived from the channel, the
//! broadcast id and the UTC start second:
//!
//! ```text
//! {domain}{sha1("{channel}_{id}_{epoch}")[..20]}_{channel}_{id}_{epoch}/chunked/index-dvr.m3u8
//! ```
//!
//! Tracker sites report start times that can run a few seconds early, so
//! candidates cover a window of positive drift around the best guess.
//!
//! # Example
//!
//! ```rust
//! use vodrecover::candidate::{generate, parse_timestamp};
//!
//! let start = parse_timestamp("2024-01-01 00:00:00").unwrap();
//! let domains = vec!["https://vod-secure.twitch.tv/".to_string()];
//! let candidates = generate("shroud", "999", start, 3, &domains);
//!
//! assert_eq!(candidates.len(), 3);
//! assert_eq!(candidates[0].epoch_seconds(), 1_704_067_200);
//! ```

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use sha1::{Digest, Sha1};

use crate::error::{RecoveryError, Result};

/// Conventional drift window, in seconds.
pub const DEFAULT_DRIFT_SECONDS: u32 = 60;

/// Timestamp format accepted from callers and produced by tracker adapters.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Number of hex characters kept from the SHA-1 digest.
const HASH_PREFIX_LEN: usize = 20;

/// Identifies one recovery attempt.
///
/// Immutable: a new timestamp guess produces a new key via [`BroadcastKey::with_start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastKey {
    channel: String,
    broadcast_id: String,
    start: Option<DateTime<Utc>>,
}

impl BroadcastKey {
    /// Build a key, lowercasing the channel.
    ///
    /// Fails if the channel is empty or the broadcast id is not a numeric string.
    pub fn new(channel: &str, broadcast_id: &str, start: Option<DateTime<Utc>>) -> Result<Self> {
        let channel = channel.trim().to_lowercase();
        if channel.is_empty() {
            return Err(RecoveryError::InvalidInput("channel name is empty".into()));
        }

        let broadcast_id = broadcast_id.trim();
        if broadcast_id.is_empty() || !broadcast_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RecoveryError::InvalidInput(format!(
                "broadcast id must be numeric, got {broadcast_id:?}"
            )));
        }

        Ok(Self {
            channel,
            broadcast_id: broadcast_id.to_string(),
            start,
        })
    }

    /// Same broadcast, different start guess.
    #[must_use]
    pub fn with_start(&self, start: DateTime<Utc>) -> Self {
        Self {
            channel: self.channel.clone(),
            broadcast_id: self.broadcast_id.clone(),
            start: Some(start),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn broadcast_id(&self) -> &str {
        &self.broadcast_id
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }
}

/// One storage location to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateUrl {
    domain: String,
    hash_prefix: String,
    channel: String,
    broadcast_id: String,
    epoch_seconds: i64,
}

impl CandidateUrl {
    /// Build a candidate, computing its hash prefix.
    ///
    /// `domain` is used as given and must already end with `/`
    /// (see [`normalize_domain`]).
    pub fn new(domain: &str, channel: &str, broadcast_id: &str, epoch_seconds: i64) -> Self {
        Self {
            domain: domain.to_string(),
            hash_prefix: hash_prefix(channel, broadcast_id, epoch_seconds),
            channel: channel.to_string(),
            broadcast_id: broadcast_id.to_string(),
            epoch_seconds,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn hash_prefix(&self) -> &str {
        &self.hash_prefix
    }

    pub fn epoch_seconds(&self) -> i64 {
        self.epoch_seconds
    }

    /// Storage directory name, `{hash}_{channel}_{id}_{epoch}`.
    pub fn storage_key(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.hash_prefix, self.channel, self.broadcast_id, self.epoch_seconds
        )
    }

    /// Playlist URL of the source-quality (`chunked`) variant.
    pub fn url(&self) -> String {
        format!("{}{}/chunked/index-dvr.m3u8", self.domain, self.storage_key())
    }
}

impl fmt::Display for CandidateUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// First 20 hex characters of SHA-1 over `"{channel}_{broadcast_id}_{epoch_seconds}"`.
pub fn hash_prefix(channel: &str, broadcast_id: &str, epoch_seconds: i64) -> String {
    let digest = Sha1::digest(format!("{channel}_{broadcast_id}_{epoch_seconds}").as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(HASH_PREFIX_LEN);
    hex
}

/// Generate candidates for every drift in `[0, drift_seconds)` and every domain.
///
/// Ordering is drift outer, domain inner, so near-zero drift is probed first.
/// Blank domains are skipped. Pure and deterministic.
pub fn generate(
    channel: &str,
    broadcast_id: &str,
    start: DateTime<Utc>,
    drift_seconds: u32,
    domains: &[String],
) -> Vec<CandidateUrl> {
    let domains: Vec<String> = domains.iter().filter_map(|d| normalize_domain(d)).collect();
    let base = start.timestamp();

    let mut candidates = Vec::with_capacity(drift_seconds as usize * domains.len());
    for drift in 0..i64::from(drift_seconds) {
        let epoch = base + drift;
        for domain in &domains {
            candidates.push(CandidateUrl::new(domain, channel, broadcast_id, epoch));
        }
    }
    candidates
}

/// Generate candidates for a key; `None` when the key carries no timestamp.
pub fn generate_for(
    key: &BroadcastKey,
    drift_seconds: u32,
    domains: &[String],
) -> Option<Vec<CandidateUrl>> {
    key.start().map(|start| {
        generate(
            key.channel(),
            key.broadcast_id(),
            start,
            drift_seconds,
            domains,
        )
    })
}

/// Trim a domain root and make sure it ends with `/`. Blank input yields `None`.
pub fn normalize_domain(domain: &str) -> Option<String> {
    let domain = domain.trim();
    if domain.is_empty() {
        return None;
    }
    if domain.ends_with('/') {
        Some(domain.to_string())
    } else {
        Some(format!("{domain}/"))
    }
}

/// Parse `YYYY-MM-DD HH:MM:SS` as a UTC instant.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(input.trim(), TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Format a UTC instant as `YYYY-MM-DD HH:MM:SS`.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://d{i}.cloudfront.net/")).collect()
    }

    #[test]
    fn hash_prefix_matches_sha1_of_joined_fields() {
        assert_eq!(hash_prefix("foo", "12345", 1_609_459_200), "f0478dc747c001a42e4a");
        assert_eq!(hash_prefix("foo", "12345", 1_609_459_200).len(), 20);
    }

    #[test]
    fn generate_is_deterministic() {
        let start = parse_timestamp("2021-01-01 00:00:00").unwrap();
        let first = generate("foo", "12345", start, 60, &domains(4));
        let second = generate("foo", "12345", start, 60, &domains(4));
        assert_eq!(first, second);
    }

    #[test]
    fn generate_yields_window_times_domains() {
        let start = parse_timestamp("2021-01-01 00:00:00").unwrap();
        for window in [0, 1, 7, 60] {
            for count in [0, 1, 3] {
                let candidates = generate("foo", "1", start, window, &domains(count));
                assert_eq!(candidates.len(), window as usize * count);
            }
        }
    }

    #[test]
    fn generate_orders_drift_outer_domain_inner() {
        let start = parse_timestamp("2024-01-01 00:00:00").unwrap();
        let candidates = generate("shroud", "999", start, 2, &domains(2));
        let order: Vec<(i64, &str)> = candidates
            .iter()
            .map(|c| (c.epoch_seconds(), c.domain()))
            .collect();
        assert_eq!(
            order,
            vec![
                (1_704_067_200, "https://d0.cloudfront.net/"),
                (1_704_067_200, "https://d1.cloudfront.net/"),
                (1_704_067_201, "https://d0.cloudfront.net/"),
                (1_704_067_201, "https://d1.cloudfront.net/"),
            ]
        );
    }

    #[test]
    fn candidate_url_layout() {
        let candidate = CandidateUrl::new("https://vod-secure.twitch.tv/", "shroud", "999", 1_704_067_200);
        assert_eq!(
            candidate.url(),
            "https://vod-secure.twitch.tv/48c4457049d2d7c4091f_shroud_999_1704067200/chunked/index-dvr.m3u8"
        );
    }

    #[test]
    fn blank_domains_are_skipped_and_slashes_added() {
        let start = parse_timestamp("2024-01-01 00:00:00").unwrap();
        let raw = vec!["  ".to_string(), "https://vod-metro.twitch.tv".to_string()];
        let candidates = generate("shroud", "999", start, 1, &raw);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].domain(), "https://vod-metro.twitch.tv/");
    }

    #[test]
    fn broadcast_key_validates_and_lowercases() {
        let key = BroadcastKey::new(" Shroud ", "999", None).unwrap();
        assert_eq!(key.channel(), "shroud");
        assert!(BroadcastKey::new("", "999", None).is_err());
        assert!(BroadcastKey::new("shroud", "99a", None).is_err());
        assert!(BroadcastKey::new("shroud", "", None).is_err());
    }

    #[test]
    fn with_start_produces_new_key() {
        let key = BroadcastKey::new("shroud", "999", None).unwrap();
        let start = parse_timestamp("2024-01-01 00:00:00").unwrap();
        let next = key.with_start(start);
        assert_eq!(key.start(), None);
        assert_eq!(next.start(), Some(start));
        assert!(generate_for(&key, 60, &domains(1)).is_none());
        assert_eq!(generate_for(&next, 60, &domains(1)).unwrap().len(), 60);
    }

    #[test]
    fn timestamp_round_trip_format() {
        let parsed = parse_timestamp(" 2024-03-09 17:05:33 ").unwrap();
        assert_eq!(format_timestamp(parsed), "2024-03-09 17:05:33");
        assert!(parse_timestamp("2024-03-09T17:05:33").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
