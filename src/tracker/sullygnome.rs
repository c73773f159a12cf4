//! SullyGnome stream pages.
//!
//! The sub-header lists the start as `Monday 1st January 12:00am` with no
//! year; the adapter assumes its reference year (the current one unless set).
//! The orchestrator skips this site for broadcasts from other years.

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Month, NaiveDate, Utc};
use regex::Regex;
use scraper::{Html, Selector};

use super::{parse_duration, TrackerAdapter, TrackerRecord, TrackerSite};

static START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,2})(?:st|nd|rd|th)\s+([a-z]+)\s+(\d{1,2}):(\d{2})\s*([ap]m)").unwrap()
});

const START_INDEX: usize = 6;
const DURATION_INDEX: usize = 7;

pub struct SullyGnome {
    year: Option<i32>,
}

impl SullyGnome {
    /// Adapter that assumes the current year.
    pub fn new() -> Self {
        Self { year: None }
    }

    pub fn for_year(year: i32) -> Self {
        Self { year: Some(year) }
    }

    fn year(&self) -> i32 {
        self.year.unwrap_or_else(|| Utc::now().year())
    }
}

impl Default for SullyGnome {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerAdapter for SullyGnome {
    fn site(&self) -> TrackerSite {
        TrackerSite::SullyGnome
    }

    fn extract(&self, html: &str) -> TrackerRecord {
        let document = Html::parse_document(html);
        let values: Vec<String> = Selector::parse("div.MiddleSubHeaderItemValue")
            .map(|selector| {
                document
                    .select(&selector)
                    .map(|el| el.text().collect::<String>().trim().to_string())
                    .collect()
            })
            .unwrap_or_default();

        TrackerRecord {
            site: TrackerSite::SullyGnome,
            start: values
                .get(START_INDEX)
                .and_then(|text| parse_start(text, self.year())),
            duration_minutes: values
                .get(DURATION_INDEX)
                .and_then(|text| parse_duration(&text.replace(',', " "))),
        }
    }
}

fn parse_start(text: &str, year: i32) -> Option<DateTime<Utc>> {
    let caps = START_RE.captures(text)?;
    let day: u32 = caps[1].parse().ok()?;
    let month = Month::from_str(&caps[2]).ok()?.number_from_month();
    let hour12: u32 = caps[3].parse().ok()?;
    let minute: u32 = caps[4].parse().ok()?;
    if !(1..=12).contains(&hour12) {
        return None;
    }

    let hour = match (hour12, caps[5].eq_ignore_ascii_case("pm")) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };

    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(hour, minute, 0)
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::candidate::parse_timestamp;

    pub(crate) const PAGE: &str = r#"<html><body><div class="MiddleSubHeader">
      <div class="MiddleSubHeaderItemValue">shroud</div>
      <div class="MiddleSubHeaderItemValue">41,233</div>
      <div class="MiddleSubHeaderItemValue">28,114</div>
      <div class="MiddleSubHeaderItemValue">12,551</div>
      <div class="MiddleSubHeaderItemValue">Counter-Strike</div>
      <div class="MiddleSubHeaderItemValue">English</div>
      <div class="MiddleSubHeaderItemValue">Monday 1st January 12:00am</div>
      <div class="MiddleSubHeaderItemValue">5 hours, 30 minutes</div>
    </div></body></html>"#;

    #[test]
    fn extracts_start_in_reference_year() {
        let record = SullyGnome::for_year(2024).extract(PAGE);
        assert_eq!(record.start, parse_timestamp("2024-01-01 00:00:00"));
        assert_eq!(record.duration_minutes, Some(330));
    }

    #[test]
    fn twelve_hour_clock() {
        assert_eq!(
            parse_start("Saturday 23rd March 12:30pm", 2024),
            parse_timestamp("2024-03-23 12:30:00")
        );
        assert_eq!(
            parse_start("Friday 2nd February 9:05PM", 2024),
            parse_timestamp("2024-02-02 21:05:00")
        );
        assert_eq!(parse_start("Thursday 31st February 1:00am", 2024), None);
        assert_eq!(parse_start("Monday 1st January 13:00am", 2024), None);
    }

    #[test]
    fn short_header_yields_nothing() {
        let html = r#"<div class="MiddleSubHeaderItemValue">shroud</div>"#;
        let record = SullyGnome::for_year(2024).extract(html);
        assert_eq!(record, TrackerRecord::empty(TrackerSite::SullyGnome));
    }
}
