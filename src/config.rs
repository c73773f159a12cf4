//! Recovery configuration loaded from `~/.config/vodrecover/config.toml`.
//!
//! Every field is optional; an absent file means all defaults.
//!
//! ```toml
//! drift_seconds = 60
//! probe_concurrency = 32
//! auto_select_best_quality = true
//!
//! [browser]
//! executable = "/usr/bin/chromium"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::candidate::{normalize_domain, DEFAULT_DRIFT_SECONDS};
use crate::probe::ProbeSettings;
use crate::recovery::RecoverySettings;
use crate::segments::SegmentSettings;

/// CDN roots Twitch has served VOD storage from.
const DEFAULT_DOMAINS: &[&str] = &[
    "https://vod-secure.twitch.tv/",
    "https://vod-metro.twitch.tv/",
    "https://vod-pop-secure.twitch.tv/",
    "https://d2e2de1etea730.cloudfront.net/",
    "https://dqrpb9wgowsf5.cloudfront.net/",
    "https://ds0h3roq6wcgc.cloudfront.net/",
    "https://d2nvs31859zcd8.cloudfront.net/",
    "https://d2aba1wr3818hz.cloudfront.net/",
    "https://d3c27h4odz752x.cloudfront.net/",
    "https://dgeft87wbj63p.cloudfront.net/",
    "https://d1m7jfoe9zdc1j.cloudfront.net/",
    "https://d3vd9lfkzbru3h.cloudfront.net/",
    "https://d2vjef5jvl6bfs.cloudfront.net/",
    "https://d1ymi26ma8va5x.cloudfront.net/",
    "https://d1mhjrowxxagfy.cloudfront.net/",
    "https://ddacn6pr5v0tl.cloudfront.net/",
    "https://d3aqoihi2n8ty8.cloudfront.net/",
];

pub fn default_domains() -> Vec<String> {
    DEFAULT_DOMAINS.iter().map(|d| (*d).to_string()).collect()
}

/// Headless browser used for the second fetch tier.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BrowserSettings {
    pub enabled: bool,
    /// Explicit browser binary; detected from `PATH` when unset.
    pub executable: Option<PathBuf>,
    /// Seconds challenge pages get to run before the DOM is read.
    pub wait_secs: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            executable: None,
            wait_secs: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RecoveryConfig {
    pub domains: Vec<String>,
    pub drift_seconds: u32,
    pub probe_concurrency: usize,
    pub probe_timeout_secs: u64,
    /// Extra attempts after the first, for transient failures.
    pub probe_retries: u32,
    pub probe_backoff_ms: u64,
    pub segment_concurrency: usize,
    pub segment_timeout_secs: u64,
    pub tracker_timeout_secs: u64,
    pub auto_select_best_quality: bool,
    pub check_segments: bool,
    pub unmute_video: bool,
    pub old_broadcast_days: i64,
    pub output_dir: Option<PathBuf>,
    pub browser: BrowserSettings,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            domains: default_domains(),
            drift_seconds: DEFAULT_DRIFT_SECONDS,
            probe_concurrency: 32,
            probe_timeout_secs: 30,
            probe_retries: 2,
            probe_backoff_ms: 2000,
            segment_concurrency: 64,
            segment_timeout_secs: 30,
            tracker_timeout_secs: 10,
            auto_select_best_quality: false,
            check_segments: true,
            unmute_video: true,
            old_broadcast_days: 60,
            output_dir: None,
            browser: BrowserSettings::default(),
        }
    }
}

impl RecoveryConfig {
    /// Load from the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from `path`, falling back to defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        config.domains = config
            .domains
            .iter()
            .filter_map(|d| normalize_domain(d))
            .collect();
        Ok(config)
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            concurrency: self.probe_concurrency.max(1),
            timeout: Duration::from_secs(self.probe_timeout_secs),
            retries: self.probe_retries,
            backoff: Duration::from_millis(self.probe_backoff_ms),
        }
    }

    pub fn segment_settings(&self) -> SegmentSettings {
        SegmentSettings {
            concurrency: self.segment_concurrency.max(1),
            timeout: Duration::from_secs(self.segment_timeout_secs),
        }
    }

    pub fn recovery_settings(&self) -> RecoverySettings {
        RecoverySettings {
            domains: self.domains.clone(),
            drift_seconds: self.drift_seconds,
            old_broadcast_days: self.old_broadcast_days,
        }
    }

    pub fn tracker_timeout(&self) -> Duration {
        Duration::from_secs(self.tracker_timeout_secs)
    }

    /// Directory for rewritten manifests: configured, else the download
    /// directory, else the working directory.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Return the path to the config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vodrecover")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config() {
        let config = RecoveryConfig::parse("").unwrap();
        assert_eq!(config, RecoveryConfig::default());
        assert_eq!(config.probe_settings(), ProbeSettings::default());
        assert_eq!(config.segment_settings(), SegmentSettings::default());
    }

    #[test]
    fn parse_overrides() {
        let toml_str = r#"
domains = ["https://vod-secure.twitch.tv", "  "]
drift_seconds = 5
probe_retries = 0
auto_select_best_quality = true
output_dir = "/tmp/vods"

[browser]
enabled = false
wait_secs = 8
"#;
        let config = RecoveryConfig::parse(toml_str).unwrap();
        assert_eq!(config.domains, vec!["https://vod-secure.twitch.tv/"]);
        assert_eq!(config.drift_seconds, 5);
        assert_eq!(config.probe_settings().retries, 0);
        assert!(config.auto_select_best_quality);
        assert_eq!(config.output_dir(), PathBuf::from("/tmp/vods"));
        assert!(!config.browser.enabled);
        assert_eq!(config.browser.wait_secs, 8);
        assert_eq!(config.browser.executable, None);
        assert_eq!(config.segment_concurrency, 64);
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecoveryConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, RecoveryConfig::default());
    }

    #[test]
    fn invalid_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "drift_seconds = \"sixty\"").unwrap();
        let err = RecoveryConfig::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("config.toml"));
    }

    #[test]
    fn default_domains_are_normalized() {
        for domain in default_domains() {
            assert_eq!(normalize_domain(&domain).as_deref(), Some(domain.as_str()));
        }
    }
}
