use anyhow::{anyhow, bail, Result};

use vodrecover::clips::extract_offset;
use vodrecover::{ClipFormat, ClipRecovery, TrackerLink, TrackerSite};

use super::output::progress_line;
use super::Context;

pub async fn cmd_clips(
    ctx: &Context,
    url: Option<&str>,
    channel: Option<&str>,
    broadcast_id: Option<&str>,
    minutes: Option<u32>,
    format: ClipFormat,
) -> Result<()> {
    let (broadcast_id, minutes) = match (url, broadcast_id) {
        (Some(url), _) => {
            let link = TrackerLink::parse(url)
                .ok_or_else(|| anyhow!("unrecognized tracker URL: {url}"))?;
            let minutes = duration_of(ctx, &link).await?;
            (link.broadcast_id, minutes)
        }
        (None, Some(id)) => match (minutes, channel) {
            (Some(minutes), _) => (id.to_string(), minutes),
            (None, Some(channel)) => {
                let link = TrackerLink {
                    site: TrackerSite::TwitchTracker,
                    channel: channel.to_string(),
                    broadcast_id: id.to_string(),
                };
                (id.to_string(), duration_of(ctx, &link).await?)
            }
            (None, None) => bail!("--minutes or --channel is needed to bound the clip search"),
        },
        (None, None) => bail!("pass a tracker URL or --id"),
    };

    eprintln!("🎬 Searching {format} clips of {broadcast_id} ({minutes} min)");
    let progress = progress_line("Probing clips");
    let clips = ClipRecovery::new(ctx.prober.clone())
        .recover(&broadcast_id, minutes, format, Some(&progress))
        .await;

    // URL and offset, tab separated
    for clip in &clips {
        match extract_offset(clip) {
            Some(offset) => println!("{clip}\t{offset}"),
            None => println!("{clip}"),
        }
    }
    eprintln!("✅ {} clips found", clips.len());
    Ok(())
}

async fn duration_of(ctx: &Context, link: &TrackerLink) -> Result<u32> {
    let (site, minutes) = ctx
        .trackers()
        .resolve_duration(link)
        .await
        .ok_or_else(|| anyhow!("no tracker reported a duration for {link}, pass --minutes"))?;
    eprintln!("⏱️  Duration from {site}: {minutes} min");
    Ok(minutes)
}
