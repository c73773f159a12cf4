//! TwitchTracker stream pages.
//!
//! The start time sits in `div.stream-timestamp-dt` as `YYYY-MM-DD HH:MM:SS`.
//! Pages served to a browser after a challenge sometimes drop that block, but
//! the `description` meta tag still carries the same timestamp.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::{parse_duration, TrackerAdapter, TrackerRecord, TrackerSite};
use crate::candidate::parse_timestamp;

static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}").unwrap());

pub struct TwitchTracker;

impl TrackerAdapter for TwitchTracker {
    fn site(&self) -> TrackerSite {
        TrackerSite::TwitchTracker
    }

    fn extract(&self, html: &str) -> TrackerRecord {
        let document = Html::parse_document(html);

        let start = first_text(&document, "div.stream-timestamp-dt")
            .and_then(|text| parse_timestamp(&text))
            .or_else(|| meta_timestamp(&document));

        let duration_minutes =
            first_text(&document, "div.g-x-s-value").and_then(|text| parse_duration(&text));

        TrackerRecord {
            site: TrackerSite::TwitchTracker,
            start,
            duration_minutes,
        }
    }
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

fn meta_timestamp(document: &Html) -> Option<chrono::DateTime<chrono::Utc>> {
    let selector = Selector::parse(r#"meta[name="description"]"#).ok()?;
    let content = document.select(&selector).next()?.value().attr("content")?;
    let found = TIMESTAMP_RE.find(content)?;
    parse_timestamp(found.as_str())
}
