//! `vodrecover` CLI - Recover Twitch VODs, clips and muted playlists

mod cmd;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vodrecover::ClipFormat;

use cmd::{cmd_clips, cmd_direct, cmd_recover, cmd_tracker, cmd_validate, Context};

#[derive(Parser)]
#[command(name = "vodrecover")]
#[command(about = "Recover Twitch VOD playlists from deterministic storage paths")]
#[command(version)]
struct Cli {
    /// Take the best available quality without asking
    #[arg(long, global = true)]
    best: bool,

    /// Take the Nth available quality (1-based, best first)
    #[arg(long, global = true, conflicts_with = "best", value_parser = clap::value_parser!(u32).range(1..))]
    quality: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recover a VOD from channel, broadcast id and start time
    Recover {
        /// Channel login
        channel: String,

        /// Broadcast (stream) id
        broadcast_id: String,

        /// Start time in UTC, "YYYY-MM-DD HH:MM:SS"
        timestamp: String,
    },

    /// Recover a VOD from a TwitchTracker, StreamsCharts or SullyGnome stream page
    Tracker {
        /// Tracker stream URL
        url: String,
    },

    /// Find clips cut from a broadcast
    Clips {
        /// Tracker stream URL (duration is read from the tracker sites)
        #[arg(conflicts_with_all = ["channel", "id", "minutes"])]
        url: Option<String>,

        /// Channel login, used to look up the duration when --minutes is absent
        #[arg(long)]
        channel: Option<String>,

        /// Broadcast (stream) id
        #[arg(long, required_unless_present = "url")]
        id: Option<String>,

        /// Broadcast length in minutes
        #[arg(long)]
        minutes: Option<u32>,

        /// Clip naming scheme: default, alternate or legacy
        #[arg(short, long, default_value = "default")]
        format: ClipFormat,
    },

    /// Check which segments of a playlist are still available
    Validate {
        /// Playlist (.m3u8) URL
        url: String,
    },

    /// Recover the source playlist of a video still listed on Twitch
    Direct {
        /// twitch.tv/videos/{id} URL
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries results only
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let ctx = Context::new(cli.best, cli.quality)?;

    match cli.command {
        Commands::Recover { channel, broadcast_id, timestamp } => {
            cmd_recover(&ctx, &channel, &broadcast_id, &timestamp).await?;
        }
        Commands::Tracker { url } => {
            cmd_tracker(&ctx, &url).await?;
        }
        Commands::Clips { url, channel, id, minutes, format } => {
            cmd_clips(&ctx, url.as_deref(), channel.as_deref(), id.as_deref(), minutes, format).await?;
        }
        Commands::Validate { url } => {
            cmd_validate(&ctx, &url).await?;
        }
        Commands::Direct { url } => {
            cmd_direct(&ctx, &url).await?;
        }
    }

    Ok(())
}
