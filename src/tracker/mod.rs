//! Broadcast metadata from third-party tracker sites.
//!
//! # Architecture
//!
//! - [`TrackerAdapter`]: site-specific extraction of start time and duration
//! - [`TrackerResolver`]: two-tier fetch (plain HTTP, then rendered browser)
//!   and the cross-site duration fallback chain
//! - [`TrackerLink`]: parsing and conversion of tracker page URLs
//!
//! Tracker markup is versioned by the sites themselves. A redesign shows up
//! as [`SourceError::Malformed`] and is handled like any other failed source.

pub mod streamscharts;
pub mod sullygnome;
pub mod twitchtracker;

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::browser::{fetch_exclusive, RenderedFetcher};
use crate::http_client::PageFetcher;

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*(h(?:ou)?r?s?|m(?:in)?(?:ute)?s?)").unwrap());

/// Known tracker sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerSite {
    TwitchTracker,
    StreamsCharts,
    SullyGnome,
}

impl TrackerSite {
    pub const ALL: [TrackerSite; 3] = [
        TrackerSite::TwitchTracker,
        TrackerSite::StreamsCharts,
        TrackerSite::SullyGnome,
    ];

    /// Order in which sites are asked for a start timestamp.
    pub const TIMESTAMP_ORDER: [TrackerSite; 3] = [
        TrackerSite::TwitchTracker,
        TrackerSite::SullyGnome,
        TrackerSite::StreamsCharts,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TrackerSite::TwitchTracker => "TwitchTracker",
            TrackerSite::StreamsCharts => "StreamsCharts",
            TrackerSite::SullyGnome => "SullyGnome",
        }
    }

    fn host(self) -> &'static str {
        match self {
            TrackerSite::TwitchTracker => "twitchtracker.com",
            TrackerSite::StreamsCharts => "streamscharts.com",
            TrackerSite::SullyGnome => "sullygnome.com",
        }
    }

    /// Stream page for a broadcast.
    pub fn page_url(self, channel: &str, broadcast_id: &str) -> String {
        match self {
            TrackerSite::TwitchTracker => {
                format!("https://twitchtracker.com/{channel}/streams/{broadcast_id}")
            }
            TrackerSite::StreamsCharts => {
                format!("https://streamscharts.com/channels/{channel}/streams/{broadcast_id}")
            }
            TrackerSite::SullyGnome => {
                format!("https://sullygnome.com/channel/{channel}/stream/{broadcast_id}")
            }
        }
    }

    /// Next site to ask when this one fails.
    ///
    /// SullyGnome is the common target; it falls back to TwitchTracker, and
    /// callers stop once a site repeats.
    pub fn fallback(self) -> TrackerSite {
        match self {
            TrackerSite::TwitchTracker | TrackerSite::StreamsCharts => TrackerSite::SullyGnome,
            TrackerSite::SullyGnome => TrackerSite::TwitchTracker,
        }
    }

    /// Sites visited starting from `self`, each at most once.
    pub fn fallback_chain(self) -> Vec<TrackerSite> {
        let mut chain = vec![self];
        let mut next = self.fallback();
        while !chain.contains(&next) {
            chain.push(next);
            next = next.fallback();
        }
        chain
    }

    /// SullyGnome pages omit the year of the broadcast.
    pub fn omits_year(self) -> bool {
        self == TrackerSite::SullyGnome
    }
}

impl fmt::Display for TrackerSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What one tracker page said about a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerRecord {
    pub site: TrackerSite,
    pub start: Option<DateTime<Utc>>,
    pub duration_minutes: Option<u32>,
}

impl TrackerRecord {
    pub fn empty(site: TrackerSite) -> Self {
        Self {
            site,
            start: None,
            duration_minutes: None,
        }
    }
}

/// A stream page on one of the tracker sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerLink {
    pub site: TrackerSite,
    pub channel: String,
    pub broadcast_id: String,
}

impl TrackerLink {
    /// Parse a tracker stream URL. Scheme and `www.` are optional.
    ///
    /// ```rust
    /// use vodrecover::tracker::{TrackerLink, TrackerSite};
    ///
    /// let link = TrackerLink::parse("https://twitchtracker.com/shroud/streams/999").unwrap();
    /// assert_eq!(link.site, TrackerSite::TwitchTracker);
    /// assert_eq!(link.channel, "shroud");
    /// assert_eq!(link.broadcast_id, "999");
    /// ```
    pub fn parse(url: &str) -> Option<Self> {
        let trimmed = url.trim();
        let rest = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .unwrap_or(trimmed);
        let rest = rest.strip_prefix("www.").unwrap_or(rest);

        let (host, path) = rest.split_once('/')?;
        let site = TrackerSite::ALL
            .into_iter()
            .find(|s| host.eq_ignore_ascii_case(s.host()))?;

        let parts: Vec<&str> = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .split('/')
            .filter(|p| !p.is_empty())
            .collect();

        let (channel, id) = match (site, parts.as_slice()) {
            (TrackerSite::TwitchTracker, [channel, "streams", id, ..])
            | (TrackerSite::StreamsCharts, ["channels", channel, "streams", id, ..])
            | (TrackerSite::SullyGnome, ["channel", channel, "stream", id, ..]) => (*channel, *id),
            _ => return None,
        };

        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        Some(Self {
            site,
            channel: channel.to_lowercase(),
            broadcast_id: id.to_string(),
        })
    }

    /// Same broadcast on another site.
    #[must_use]
    pub fn to_site(&self, site: TrackerSite) -> Self {
        Self {
            site,
            channel: self.channel.clone(),
            broadcast_id: self.broadcast_id.clone(),
        }
    }

    pub fn url(&self) -> String {
        self.site.page_url(&self.channel, &self.broadcast_id)
    }
}

impl fmt::Display for TrackerLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Why a tracker site produced nothing usable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Both fetch tiers failed.
    #[error("{site} unreachable: {reason}")]
    Unreachable { site: TrackerSite, reason: String },

    /// The page loaded but the expected markup was absent.
    #[error("{site} page not understood: {reason}")]
    Malformed { site: TrackerSite, reason: String },
}

impl SourceError {
    pub fn site(&self) -> TrackerSite {
        match self {
            SourceError::Unreachable { site, .. } | SourceError::Malformed { site, .. } => *site,
        }
    }
}

/// Site-specific extraction rules.
pub trait TrackerAdapter: Send + Sync {
    fn site(&self) -> TrackerSite;

    /// Pull whatever the page says about the broadcast. Missing fields stay `None`.
    fn extract(&self, html: &str) -> TrackerRecord;
}

/// Source of tracker records, the seam the orchestrator depends on.
#[async_trait]
pub trait TimestampSource: Send + Sync {
    async fn lookup(
        &self,
        site: TrackerSite,
        channel: &str,
        broadcast_id: &str,
    ) -> Result<TrackerRecord, SourceError>;
}

/// Normalize a human-readable duration to whole minutes.
///
/// Accepts compound strings such as `5h 30m`, `5 hours, 30 minutes` or
/// `2 hrs 7 mins`, and bare integers, which are read as minutes.
pub fn parse_duration(text: &str) -> Option<u32> {
    let text = text.trim();
    let mut hours = None;
    let mut minutes = None;

    for caps in DURATION_RE.captures_iter(text) {
        let Ok(value) = caps[1].parse::<u32>() else {
            continue;
        };
        match caps[2].chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('h') => hours = Some(value),
            Some('m') => minutes = Some(value),
            _ => {}
        }
    }

    if hours.is_none() && minutes.is_none() {
        return text.parse().ok();
    }
    hours
        .unwrap_or(0)
        .checked_mul(60)?
        .checked_add(minutes.unwrap_or(0))
}

/// Fetches tracker pages and runs the matching adapter over them.
pub struct TrackerResolver {
    fetcher: Arc<dyn PageFetcher>,
    browser: Option<Arc<dyn RenderedFetcher>>,
    adapters: Vec<Box<dyn TrackerAdapter>>,
}

impl TrackerResolver {
    /// Resolver with all site adapters. Without a browser, tier 2 is skipped.
    pub fn new(fetcher: Arc<dyn PageFetcher>, browser: Option<Arc<dyn RenderedFetcher>>) -> Self {
        let adapters: Vec<Box<dyn TrackerAdapter>> = vec![
            Box::new(twitchtracker::TwitchTracker),
            Box::new(streamscharts::StreamsCharts),
            Box::new(sullygnome::SullyGnome::new()),
        ];

        Self {
            fetcher,
            browser,
            adapters,
        }
    }

    /// Replace the adapter for one site.
    #[must_use]
    pub fn with_adapter(mut self, adapter: Box<dyn TrackerAdapter>) -> Self {
        self.adapters.retain(|a| a.site() != adapter.site());
        self.adapters.push(adapter);
        self
    }

    fn adapter(&self, site: TrackerSite) -> Option<&dyn TrackerAdapter> {
        self.adapters
            .iter()
            .find(|a| a.site() == site)
            .map(AsRef::as_ref)
    }

    /// Tier 1 is a plain GET. A transport error or non-success status moves
    /// on to tier 2, the rendered browser fetch.
    async fn fetch_html(&self, site: TrackerSite, url: &str) -> Result<String, SourceError> {
        let tier1_failure = match self.fetcher.fetch_page(url).await {
            Ok(page) if page.is_success() => return Ok(page.body),
            Ok(page) => format!("HTTP {}", page.status),
            Err(e) => e.to_string(),
        };
        debug!(site = %site, reason = %tier1_failure, "direct fetch failed");

        let Some(browser) = &self.browser else {
            return Err(SourceError::Unreachable {
                site,
                reason: tier1_failure,
            });
        };

        info!("Opening {site} with browser...");
        fetch_exclusive(browser.as_ref(), url)
            .await
            .map_err(|e| SourceError::Unreachable {
                site,
                reason: format!("{tier1_failure}; browser: {e}"),
            })
    }

    /// Fetch and extract one site's page for a broadcast.
    ///
    /// A page yielding neither a start nor a duration is malformed.
    pub async fn fetch_record(
        &self,
        site: TrackerSite,
        channel: &str,
        broadcast_id: &str,
    ) -> Result<TrackerRecord, SourceError> {
        let adapter = self.adapter(site).ok_or_else(|| SourceError::Malformed {
            site,
            reason: "no adapter registered".to_string(),
        })?;

        let url = site.page_url(channel, broadcast_id);
        let html = self.fetch_html(site, &url).await?;
        let record = adapter.extract(&html);

        if record.start.is_none() && record.duration_minutes.is_none() {
            return Err(SourceError::Malformed {
                site,
                reason: "expected markup not found".to_string(),
            });
        }
        Ok(record)
    }

    /// Broadcast duration, walking the fallback chain from the link's site.
    ///
    /// Returns the site that answered along with the minutes.
    pub async fn resolve_duration(&self, link: &TrackerLink) -> Option<(TrackerSite, u32)> {
        let mut visited = HashSet::new();
        for site in link.site.fallback_chain() {
            if !visited.insert(site) {
                continue;
            }
            match self
                .fetch_record(site, &link.channel, &link.broadcast_id)
                .await
            {
                Ok(TrackerRecord {
                    duration_minutes: Some(minutes),
                    ..
                }) => return Some((site, minutes)),
                Ok(_) => warn!("{site} page carried no duration"),
                Err(e) => warn!("{e}"),
            }
        }
        None
    }
}

#[async_trait]
impl TimestampSource for TrackerResolver {
    async fn lookup(
        &self,
        site: TrackerSite,
        channel: &str,
        broadcast_id: &str,
    ) -> Result<TrackerRecord, SourceError> {
        info!("Retrieving datetime from {site}...");
        self.fetch_record(site, channel, broadcast_id).await
    }
}
