//! Clip recovery.
//!
//! Clips cut from a broadcast live on the clip CDN under names derived from
//! the broadcast id and an offset into the stream. Knowing the broadcast
//! length bounds the offsets worth probing.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, instrument};

use crate::probe::{Prober, ProgressCallback};

pub const CLIP_HOST: &str = "https://clips-media-assets2.twitch.tv/";

static OFFSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:-offset|-index)-(\d+)").unwrap());

/// Clip file naming schemes used over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipFormat {
    /// `{id}-offset-{o}.mp4`, even offsets.
    Default,
    /// `vod-{id}-offset-{o}.mp4`, even offsets.
    Alternate,
    /// `{id}-index-{i:010}.mp4`, every index.
    Legacy,
}

impl ClipFormat {
    fn url(self, broadcast_id: &str, offset: u32) -> String {
        match self {
            ClipFormat::Default => format!("{CLIP_HOST}{broadcast_id}-offset-{offset}.mp4"),
            ClipFormat::Alternate => format!("{CLIP_HOST}vod-{broadcast_id}-offset-{offset}.mp4"),
            ClipFormat::Legacy => format!("{CLIP_HOST}{broadcast_id}-index-{offset:010}.mp4"),
        }
    }

    fn step(self) -> usize {
        match self {
            ClipFormat::Default | ClipFormat::Alternate => 2,
            ClipFormat::Legacy => 1,
        }
    }
}

impl fmt::Display for ClipFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClipFormat::Default => "default",
            ClipFormat::Alternate => "alternate",
            ClipFormat::Legacy => "legacy",
        })
    }
}

impl FromStr for ClipFormat {
    type Err = String;

    /// Accepts the name or the 1-based menu number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "default" => Ok(ClipFormat::Default),
            "2" | "alternate" => Ok(ClipFormat::Alternate),
            "3" | "legacy" => Ok(ClipFormat::Legacy),
            other => Err(format!("unknown clip format: {other}")),
        }
    }
}

/// Upper bound (exclusive) on clip offsets for a broadcast of `minutes`.
pub fn max_offset(minutes: u32) -> u32 {
    minutes.saturating_mul(60).saturating_add(2000)
}

/// Every candidate clip URL for a broadcast, in offset order.
pub fn clip_urls(broadcast_id: &str, minutes: u32, format: ClipFormat) -> Vec<String> {
    (0..max_offset(minutes))
        .step_by(format.step())
        .map(|offset| format.url(broadcast_id, offset))
        .collect()
}

/// Offset encoded in a clip URL.
pub fn extract_offset(clip_url: &str) -> Option<u32> {
    OFFSET_RE.captures(clip_url)?.get(1)?.as_str().parse().ok()
}

/// Probes clip candidates.
pub struct ClipRecovery {
    prober: Prober,
}

impl ClipRecovery {
    pub fn new(prober: Prober) -> Self {
        Self { prober }
    }

    /// Reachable clips of one format, in offset order.
    #[instrument(skip(self, progress))]
    pub async fn recover(
        &self,
        broadcast_id: &str,
        minutes: u32,
        format: ClipFormat,
        progress: Option<&ProgressCallback>,
    ) -> Vec<String> {
        let urls = clip_urls(broadcast_id, minutes, format);
        info!("Probing {} {format} clip candidates", urls.len());
        let verdicts = self.prober.verdicts(&urls, progress).await;
        urls.into_iter()
            .zip(verdicts)
            .filter_map(|(url, found)| found.then_some(url))
            .collect()
    }
}
