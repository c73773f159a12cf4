use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use vodrecover::quality::parse_choice;
use vodrecover::{
    HeadlessChrome, Orchestrator, Prober, Quality, QualityChooser, QualityResolver,
    RecoveryConfig, RenderedFetcher, SegmentValidator, TrackerResolver, WebClient,
};

/// Everything a subcommand needs, built once from the config and global flags.
pub struct Context {
    pub config: RecoveryConfig,
    pub client: Arc<WebClient>,
    pub prober: Prober,
    pub quality: QualityResolver,
}

impl Context {
    pub fn new(best_quality: bool, quality: Option<u32>) -> Result<Self> {
        let config = RecoveryConfig::load()?;
        let client = Arc::new(WebClient::with_timeouts(
            Duration::from_secs(config.probe_timeout_secs),
            config.tracker_timeout(),
        )?);
        let prober = Prober::http(client.inner().clone(), config.probe_settings());

        let chooser: Arc<dyn QualityChooser> = match quality {
            Some(choice) => Arc::new(PresetChoice(choice)),
            None => Arc::new(PromptChoice),
        };
        let auto_select = best_quality || config.auto_select_best_quality;
        let quality = QualityResolver::new(prober.clone(), auto_select, chooser);

        Ok(Self {
            config,
            client,
            prober,
            quality,
        })
    }

    /// Headless browser for the second tracker tier, if one is enabled and installed.
    fn browser(&self) -> Option<Arc<dyn RenderedFetcher>> {
        let settings = &self.config.browser;
        if !settings.enabled {
            return None;
        }

        let chrome = match &settings.executable {
            Some(path) => Some(HeadlessChrome::new(path.clone())),
            None => HeadlessChrome::detect(),
        };
        match chrome {
            Some(chrome) => {
                debug!("Browser fallback: {}", chrome.executable().display());
                Some(Arc::new(chrome.with_wait(Duration::from_secs(settings.wait_secs))))
            }
            None => {
                warn!("No Chromium-family browser found, tracker pages behind a challenge will fail");
                None
            }
        }
    }

    pub fn trackers(&self) -> TrackerResolver {
        TrackerResolver::new(self.client.clone(), self.browser())
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.prober.clone(),
            self.quality.clone(),
            Arc::new(self.trackers()),
            self.config.recovery_settings(),
        )
    }

    pub fn segment_validator(&self) -> SegmentValidator {
        SegmentValidator::new(
            Arc::new(vodrecover::HttpExistenceCheck::new(self.client.inner().clone())),
            self.config.segment_settings(),
        )
    }
}

fn best(options: &[Quality]) -> Quality {
    options.first().copied().unwrap_or(Quality::Chunked)
}

/// Rendition picked up front with `--quality`.
struct PresetChoice(u32);

#[async_trait]
impl QualityChooser for PresetChoice {
    async fn choose(&self, options: &[Quality]) -> Quality {
        match parse_choice(&self.0.to_string(), options.len()) {
            Some(index) => options[index],
            None => {
                warn!(
                    "Quality {} not available ({} options), using {}",
                    self.0,
                    options.len(),
                    best(options)
                );
                best(options)
            }
        }
    }
}

/// Asks on stdin until a valid 1-based choice is entered.
struct PromptChoice;

#[async_trait]
impl QualityChooser for PromptChoice {
    async fn choose(&self, options: &[Quality]) -> Quality {
        eprintln!("\n🎞️  Available qualities:");
        for (i, quality) in options.iter().enumerate() {
            eprintln!("   {}. {}", i + 1, quality.label());
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            eprint!("Choose a quality: ");
            let _ = std::io::stderr().flush();

            match lines.next_line().await {
                Ok(Some(line)) => match parse_choice(&line, options.len()) {
                    Some(index) => return options[index],
                    None => eprintln!("❌ Invalid option, enter 1-{}", options.len()),
                },
                // stdin closed
                Ok(None) | Err(_) => return best(options),
            }
        }
    }
}
