//! Rendered page fetch through a headless browser.
//!
//! Tracker sites answer plain HTTP clients with bot challenges. The fallback
//! tier drives a real Chromium to render the page and hands back the DOM.
//! Tracker parsing only sees the [`RenderedFetcher`] interface, so any
//! automation engine can stand behind it.
//!
//! A single browser session exists system-wide: [`fetch_exclusive`] holds a
//! process-wide lock for the whole fetch.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::debug;

use crate::fingerprint::chrome_profile;

static SESSION_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Executable names tried in `PATH`, most specific first.
const CHROMIUM_BINARIES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
    "msedge",
];

/// Fetch the fully rendered HTML of a page.
#[async_trait]
pub trait RenderedFetcher: Send + Sync {
    async fn fetch_rendered_html(&self, url: &str) -> Result<String>;
}

/// Run one rendered fetch while holding the browser session lock.
pub async fn fetch_exclusive(fetcher: &dyn RenderedFetcher, url: &str) -> Result<String> {
    let _session = SESSION_LOCK.lock().await;
    debug!(url, "browser session acquired");
    fetcher.fetch_rendered_html(url).await
}

/// Headless Chromium driven through `--dump-dom`.
///
/// Each fetch gets a throwaway profile directory that is deleted when the
/// fetch ends, whether it succeeded or not.
#[derive(Debug, Clone)]
pub struct HeadlessChrome {
    executable: PathBuf,
    /// Virtual time granted to challenge scripts before the DOM is dumped.
    wait: Duration,
    /// Hard limit on the browser process.
    deadline: Duration,
}

impl HeadlessChrome {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            wait: Duration::from_secs(3),
            deadline: Duration::from_secs(60),
        }
    }

    /// Locate a Chromium-family browser on this system.
    pub fn detect() -> Option<Self> {
        for name in CHROMIUM_BINARIES {
            if let Ok(path) = which::which(name) {
                debug!("Found browser: {}", path.display());
                return Some(Self::new(path));
            }
        }

        #[cfg(target_os = "macos")]
        {
            for path in [
                "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                "/Applications/Chromium.app/Contents/MacOS/Chromium",
            ] {
                if Path::new(path).exists() {
                    return Some(Self::new(path));
                }
            }
        }

        None
    }

    #[must_use]
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn build_args(&self, profile_dir: &Path, url: &str) -> Vec<String> {
        // Headless Chromium announces itself in its default user agent
        let user_agent = chrome_profile().user_agent;
        vec![
            "--headless=new".to_string(),
            "--disable-gpu".to_string(),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            format!("--user-data-dir={}", profile_dir.display()),
            format!("--user-agent={user_agent}"),
            format!("--virtual-time-budget={}", self.wait.as_millis()),
            "--dump-dom".to_string(),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl RenderedFetcher for HeadlessChrome {
    async fn fetch_rendered_html(&self, url: &str) -> Result<String> {
        let profile_dir = tempfile::Builder::new()
            .prefix("vodrecover-browser-")
            .tempdir()
            .context("failed to create browser profile directory")?;

        let args = self.build_args(profile_dir.path(), url);
        debug!("browser args: {:?}", args);

        let output = tokio::time::timeout(
            self.deadline,
            Command::new(&self.executable)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| anyhow!("browser timed out after {:?}", self.deadline))?
        .with_context(|| format!("failed to run {}", self.executable.display()))?;

        drop(profile_dir);

        if !output.status.success() {
            bail!("browser exited with status: {}", output.status);
        }

        let html = String::from_utf8_lossy(&output.stdout).into_owned();
        if html.trim().is_empty() {
            bail!("browser returned an empty document for {url}");
        }
        Ok(html)
    }
}
