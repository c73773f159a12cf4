//! Quality variant selection.
//!
//! A recovered playlist URL points at the `chunked` (source) rendition. The
//! other renditions live beside it under their own directory names:
//!
//! ```text
//! https://host/{storage_key}/chunked/index-dvr.m3u8
//! https://host/{storage_key}/720p60/index-dvr.m3u8
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::probe::Prober;

const PLAYLIST_FILE: &str = "index-dvr.m3u8";

/// Known renditions, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Quality {
    Chunked,
    P1080p60,
    P1080p30,
    P720p60,
    P720p30,
    P480p60,
    P480p30,
}

impl Quality {
    /// Canonical order, best first.
    pub const ALL: [Quality; 7] = [
        Quality::Chunked,
        Quality::P1080p60,
        Quality::P1080p30,
        Quality::P720p60,
        Quality::P720p30,
        Quality::P480p60,
        Quality::P480p30,
    ];

    /// Directory name in the storage path.
    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Chunked => "chunked",
            Quality::P1080p60 => "1080p60",
            Quality::P1080p30 => "1080p30",
            Quality::P720p60 => "720p60",
            Quality::P720p30 => "720p30",
            Quality::P480p60 => "480p60",
            Quality::P480p30 => "480p30",
        }
    }

    /// Human label for menus.
    pub fn label(self) -> &'static str {
        match self {
            Quality::Chunked => "Chunked (Best Quality)",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Quality::ALL
            .into_iter()
            .find(|q| q.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown quality: {s}"))
    }
}

/// A confirmed, quality-selected playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVod {
    pub url: String,
    pub quality: Quality,
}

/// Rendition named by a playlist URL, read from the directory holding `index-dvr.m3u8`.
pub fn quality_of(url: &str) -> Option<Quality> {
    let dir = url.strip_suffix(PLAYLIST_FILE)?.strip_suffix('/')?;
    let name = dir.rsplit('/').next()?;
    name.parse().ok()
}

/// Swap the rendition directory of a playlist URL.
///
/// Returns `None` when the URL does not end in `{quality}/index-dvr.m3u8`.
pub fn variant_url(url: &str, quality: Quality) -> Option<String> {
    let current = quality_of(url)?;
    let prefix_len = url.len() - PLAYLIST_FILE.len() - 1 - current.as_str().len();
    Some(format!("{}{}/{PLAYLIST_FILE}", &url[..prefix_len], quality.as_str()))
}

/// Read a 1-based menu choice into a 0-based index.
///
/// Non-numeric and out-of-range input yields `None`.
pub fn parse_choice(input: &str, option_count: usize) -> Option<usize> {
    let choice: usize = input.trim().parse().ok()?;
    (1..=option_count).contains(&choice).then(|| choice - 1)
}

/// Picks one rendition from the reachable ones.
#[async_trait]
pub trait QualityChooser: Send + Sync {
    /// `options` is non-empty and ordered best first.
    async fn choose(&self, options: &[Quality]) -> Quality;
}

/// Always takes the best option.
pub struct BestQuality;

#[async_trait]
impl QualityChooser for BestQuality {
    async fn choose(&self, options: &[Quality]) -> Quality {
        options.first().copied().unwrap_or(Quality::Chunked)
    }
}

/// Probes renditions next to a confirmed playlist and picks one.
#[derive(Clone)]
pub struct QualityResolver {
    prober: Prober,
    auto_select: bool,
    chooser: Arc<dyn QualityChooser>,
}

impl QualityResolver {
    /// With `auto_select` set, the best reachable rendition is taken and the
    /// chooser is never consulted.
    pub fn new(prober: Prober, auto_select: bool, chooser: Arc<dyn QualityChooser>) -> Self {
        Self {
            prober,
            auto_select,
            chooser,
        }
    }

    /// Resolver that never asks.
    pub fn best(prober: Prober) -> Self {
        Self::new(prober, true, Arc::new(BestQuality))
    }

    /// Reachable renditions of `url`, best first.
    #[instrument(skip(self))]
    pub async fn available(&self, url: &str) -> Vec<Quality> {
        let variants: Vec<(Quality, String)> = Quality::ALL
            .into_iter()
            .filter_map(|q| variant_url(url, q).map(|u| (q, u)))
            .collect();
        let urls: Vec<String> = variants.iter().map(|(_, u)| u.clone()).collect();
        let verdicts = self.prober.verdicts(&urls, None).await;

        variants
            .into_iter()
            .zip(verdicts)
            .filter_map(|((quality, _), reachable)| reachable.then_some(quality))
            .collect()
    }

    /// Select a rendition for a confirmed playlist URL.
    ///
    /// A URL already naming a non-source rendition comes back unchanged.
    /// `None` means no rendition answered.
    pub async fn resolve(&self, url: &str) -> Option<ResolvedVod> {
        match quality_of(url) {
            Some(Quality::Chunked) => {}
            Some(quality) => {
                return Some(ResolvedVod {
                    url: url.to_string(),
                    quality,
                })
            }
            None => {
                return Some(ResolvedVod {
                    url: url.to_string(),
                    quality: Quality::Chunked,
                })
            }
        }

        info!("Checking for available qualities...");
        let options = self.available(url).await;
        let first = *options.first()?;

        let quality = if self.auto_select {
            first
        } else {
            let chosen = self.chooser.choose(&options).await;
            if options.contains(&chosen) {
                chosen
            } else {
                first
            }
        };

        Some(ResolvedVod {
            url: variant_url(url, quality)?,
            quality,
        })
    }
}
