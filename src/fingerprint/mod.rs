//! Randomized browser fingerprints for tracker page requests.
//!
//! Tracker sites sit behind bot detection, so every direct fetch goes out
//! with a freshly drawn desktop user agent and the companion headers that
//! browser would send.

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};

/// Chrome builds with high market share (major, full).
const CHROME_VERSIONS: &[(&str, &str)] = &[
    ("131", "131.0.0.0"),
    ("130", "130.0.0.0"),
    ("129", "129.0.0.0"),
    ("128", "128.0.0.0"),
];

const FIREFOX_VERSIONS: &[&str] = &["133.0", "132.0", "131.0"];

/// Safari builds (version, `WebKit` build).
const SAFARI_VERSIONS: &[(&str, &str)] = &[("17.6", "605.1.15"), ("17.5", "605.1.15")];

const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.9",
    "en-US,en;q=0.9,de;q=0.8",
    "en-US,en;q=0.9,es;q=0.8",
    "en-US,en;q=0.9,pt;q=0.8",
];

/// Headers identifying one simulated browser.
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    /// Chromium client hint, empty for other engines.
    pub sec_ch_ua: String,
}

/// Desktop platform embedded in the user agent.
#[derive(Debug, Clone, Copy)]
pub enum Platform {
    MacOS,
    Windows,
    Linux,
}

impl Platform {
    fn random() -> Self {
        let roll: f32 = rand::thread_rng().gen();
        // Windows 65%, macOS 20%, Linux 15%
        if roll < 0.65 {
            Platform::Windows
        } else if roll < 0.85 {
            Platform::MacOS
        } else {
            Platform::Linux
        }
    }

    fn os_string(self) -> &'static str {
        match self {
            Platform::MacOS => "Macintosh; Intel Mac OS X 10_15_7",
            Platform::Windows => "Windows NT 10.0; Win64; x64",
            Platform::Linux => "X11; Linux x86_64",
        }
    }
}

fn pick<'a, T>(items: &'a [T], fallback: &'a T) -> &'a T {
    items.choose(&mut rand::thread_rng()).unwrap_or(fallback)
}

fn random_accept_language() -> String {
    (*pick(ACCEPT_LANGUAGES, &"en-US,en;q=0.9")).to_string()
}

#[must_use]
pub fn chrome_profile() -> BrowserProfile {
    let (major, full) = *pick(CHROME_VERSIONS, &("131", "131.0.0.0"));
    BrowserProfile {
        user_agent: format!(
            "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{full} Safari/537.36",
            Platform::random().os_string()
        ),
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8".to_string(),
        accept_language: random_accept_language(),
        sec_ch_ua: format!(
            "\"Google Chrome\";v=\"{major}\", \"Chromium\";v=\"{major}\", \"Not_A Brand\";v=\"24\""
        ),
    }
}

#[must_use]
pub fn firefox_profile() -> BrowserProfile {
    let version = *pick(FIREFOX_VERSIONS, &"133.0");
    BrowserProfile {
        user_agent: format!(
            "Mozilla/5.0 ({}; rv:{version}) Gecko/20100101 Firefox/{version}",
            Platform::random().os_string()
        ),
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        accept_language: random_accept_language(),
        sec_ch_ua: String::new(),
    }
}

/// Safari is only ever reported on macOS.
#[must_use]
pub fn safari_profile() -> BrowserProfile {
    let (version, webkit) = *pick(SAFARI_VERSIONS, &("17.6", "605.1.15"));
    BrowserProfile {
        user_agent: format!(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/{webkit} (KHTML, like Gecko) Version/{version} Safari/{webkit}"
        ),
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        accept_language: random_accept_language(),
        sec_ch_ua: String::new(),
    }
}

/// Random profile weighted by market share: Chrome 65%, Safari 20%, Firefox 15%.
#[must_use]
pub fn random_profile() -> BrowserProfile {
    let roll: f32 = rand::thread_rng().gen();
    if roll < 0.65 {
        chrome_profile()
    } else if roll < 0.85 {
        safari_profile()
    } else {
        firefox_profile()
    }
}

impl BrowserProfile {
    /// Request headers for this profile. Values that are not valid header
    /// text are left out.
    pub fn to_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(value) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.accept) {
            headers.insert(ACCEPT, value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.accept_language) {
            headers.insert(ACCEPT_LANGUAGE, value);
        }
        if !self.sec_ch_ua.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&self.sec_ch_ua) {
                headers.insert("Sec-CH-UA", value);
            }
        }
        headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));

        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chrome_profile_has_client_hint() {
        let profile = chrome_profile();
        assert!(profile.user_agent.contains("Chrome/"));
        assert!(!profile.sec_ch_ua.is_empty());
    }

    #[test]
    fn firefox_and_safari_skip_client_hint() {
        assert!(firefox_profile().sec_ch_ua.is_empty());
        let safari = safari_profile();
        assert!(safari.sec_ch_ua.is_empty());
        assert!(safari.user_agent.contains("Macintosh"));
    }

    #[test]
    fn headers_include_user_agent() {
        let headers = random_profile().to_headers();
        assert!(headers.contains_key(USER_AGENT));
        assert!(headers.contains_key(ACCEPT_LANGUAGE));
    }

    #[test]
    fn version_tables_not_empty() {
        assert!(!CHROME_VERSIONS.is_empty());
        assert!(!FIREFOX_VERSIONS.is_empty());
        assert!(!SAFARI_VERSIONS.is_empty());
        for (major, full) in CHROME_VERSIONS {
            assert!(full.starts_with(major));
        }
    }
}
