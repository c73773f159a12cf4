use anyhow::{bail, Result};

use vodrecover::playlist::fetch_manifest;

use super::output::{progress_line, served_playlist};
use super::Context;

pub async fn cmd_validate(ctx: &Context, url: &str) -> Result<()> {
    if !url.contains(".m3u8") {
        bail!("not a playlist URL: {url}");
    }

    let raw = fetch_manifest(ctx.client.as_ref(), url).await?;
    let playlist = served_playlist(&raw, url);
    eprintln!(
        "📋 {} segments ({} muted)",
        playlist.segments.len(),
        playlist.muted_count()
    );

    let progress = progress_line("Checking segments");
    let report = ctx
        .segment_validator()
        .validate(&playlist.segments, Some(&progress))
        .await;

    println!("{}", report.status());
    if !report.missing.is_empty() {
        println!("Missing: {:?}", report.missing);
    }
    Ok(())
}
