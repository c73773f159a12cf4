//! StreamsCharts stream pages.

use chrono::{DateTime, NaiveDateTime, Utc};
use scraper::{Html, Selector};

use super::{parse_duration, TrackerAdapter, TrackerRecord, TrackerSite};

/// Start time as printed once the comma is dropped and seconds appended,
/// e.g. `01 Jan 2024 00:00:00`.
const START_FORMAT: &str = "%d %b %Y %H:%M:%S";

/// Position of the duration among the page's `div.text-xs.font-bold` stat blocks.
const STAT_DURATION_INDEX: usize = 3;

pub struct StreamsCharts;

impl TrackerAdapter for StreamsCharts {
    fn site(&self) -> TrackerSite {
        TrackerSite::StreamsCharts
    }

    fn extract(&self, html: &str) -> TrackerRecord {
        let document = Html::parse_document(html);

        let start = nth_text(&document, "time.ml-2.font-bold", 0).and_then(|t| parse_start(&t));

        let duration_minutes = nth_text(&document, "span.mx-2.font-bold", 0)
            .and_then(|t| parse_duration(&t))
            .or_else(|| {
                nth_text(&document, "div.text-xs.font-bold", STAT_DURATION_INDEX)
                    .and_then(|t| parse_duration(&t))
            });

        TrackerRecord {
            site: TrackerSite::StreamsCharts,
            start,
            duration_minutes,
        }
    }
}

fn nth_text(document: &Html, selector: &str, index: usize) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .nth(index)
        .map(|el| el.text().collect::<String>().trim().to_string())
}

/// `01 Jan 2024, 00:00` to a UTC instant.
fn parse_start(text: &str) -> Option<DateTime<Utc>> {
    let cleaned = format!("{}:00", text.replace(',', "").trim());
    NaiveDateTime::parse_from_str(&cleaned, START_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
