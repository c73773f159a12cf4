use anyhow::{anyhow, Result};

use vodrecover::TwitchClient;

use super::output::finish;
use super::Context;

pub async fn cmd_direct(ctx: &Context, url: &str) -> Result<()> {
    let twitch = TwitchClient::new(ctx.client.inner().clone());
    let (video, playlist) = twitch.recover(url).await?;

    if let Some(owner) = &video.owner {
        eprintln!("📺 Channel: {}", owner.login);
    }
    if let Some(title) = &video.title {
        eprintln!("📝 Title: {title}");
    }

    let vod = ctx
        .quality
        .resolve(&playlist)
        .await
        .ok_or_else(|| anyhow!("no rendition of {playlist} is reachable"))?;
    eprintln!("✅ Recovered {} playlist", vod.quality.label());
    finish(ctx, &vod).await
}
