//! `vodrecover` - Recover Twitch VOD playlists from their storage paths
//!
//! # Features
//!
//! - **Candidate Generation**: Deterministic storage paths from channel, broadcast id and start time
//! - **Concurrent Probing**: Bounded existence checks with retry on transient failures
//! - **Tracker Sites**: `TwitchTracker`, `StreamsCharts` and `SullyGnome` timestamp lookup,
//!   with a headless browser fallback for challenge pages
//! - **Playlists**: Quality selection, muted segment rewriting, segment availability checks
//! - **Clips**: Offset-based clip recovery in the three historic naming schemes
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use vodrecover::{
//!     BroadcastKey, Orchestrator, Prober, QualityResolver, RecoveryConfig, TrackerResolver,
//!     WebClient,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RecoveryConfig::load()?;
//!     let client = Arc::new(WebClient::new()?);
//!     let prober = Prober::http(client.inner().clone(), config.probe_settings());
//!     let trackers = Arc::new(TrackerResolver::new(client.clone(), None));
//!
//!     let orchestrator = Orchestrator::new(
//!         prober.clone(),
//!         QualityResolver::best(prober),
//!         trackers,
//!         config.recovery_settings(),
//!     );
//!     let start = vodrecover::parse_timestamp("2024-01-01 00:00:00");
//!     let key = BroadcastKey::new("shroud", "50123456789", start)?;
//!     let outcome = orchestrator.recover(&key, &[]).await?;
//!     println!("{}", outcome.vod.url);
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod candidate;
pub mod clips;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod http_client;
pub mod playlist;
pub mod probe;
pub mod quality;
pub mod recovery;
pub mod segments;
pub mod tracker;
pub mod twitch;

pub use browser::{HeadlessChrome, RenderedFetcher};
pub use candidate::{format_timestamp, generate, parse_timestamp, BroadcastKey, CandidateUrl};
pub use clips::{ClipFormat, ClipRecovery};
pub use config::RecoveryConfig;
pub use error::RecoveryError;
pub use fingerprint::{chrome_profile, firefox_profile, random_profile, safari_profile, BrowserProfile};
pub use http_client::{FetchedPage, PageFetcher, WebClient};
pub use playlist::{reconstruct, PlaylistSegment, ReconstructedPlaylist};
pub use probe::{ExistenceCheck, HttpExistenceCheck, ProbeProgress, ProbeSettings, Prober, ProgressCallback};
pub use quality::{BestQuality, Quality, QualityChooser, QualityResolver, ResolvedVod};
pub use recovery::{Advisory, Orchestrator, RecoveryOutcome, RecoverySettings, SourceAttempt};
pub use segments::{SegmentReport, SegmentSettings, SegmentStatus, SegmentValidator};
pub use tracker::{TimestampSource, TrackerLink, TrackerResolver, TrackerSite};
pub use twitch::TwitchClient;

/// Version of vodrecover
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
