use std::io::Write as _;

use anyhow::Result;
use tracing::warn;

use vodrecover::playlist::{base_url, fetch_manifest, manifest_is_muted, unmute_from};
use vodrecover::{
    reconstruct, ProbeProgress, ProgressCallback, ReconstructedPlaylist, RecoveryOutcome,
    ResolvedVod,
};

use super::Context;

/// Single-line progress on stderr, finished with a newline.
pub fn progress_line(label: &'static str) -> ProgressCallback {
    Box::new(move |p: ProbeProgress| {
        eprint!("\r{label}: {}/{} ({} found)", p.completed, p.total, p.reachable);
        if p.completed == p.total {
            eprintln!();
        }
        let _ = std::io::stderr().flush();
    })
}

pub fn print_outcome(outcome: &RecoveryOutcome) {
    for attempt in &outcome.attempts {
        eprintln!("   ↳ {attempt}");
    }
    for advisory in &outcome.advisories {
        eprintln!("⚠️  {advisory}");
    }
    eprintln!("✅ Recovered {} playlist", outcome.vod.quality.label());
}

/// Segments of a remote manifest as they are actually served; muted
/// broadcasts only serve the `-muted` variants.
pub fn served_playlist(raw: &str, url: &str) -> ReconstructedPlaylist {
    reconstruct(raw, base_url(url), manifest_is_muted(raw))
}

/// Rewrite muted manifests and check segments, then print where the playlist lives.
pub async fn finish(ctx: &Context, vod: &ResolvedVod) -> Result<()> {
    let raw = fetch_manifest(ctx.client.as_ref(), &vod.url).await?;
    let muted = manifest_is_muted(&raw);

    let (location, playlist) = if muted && ctx.config.unmute_video {
        let (path, playlist) =
            unmute_from(&raw, muted, &vod.url, &ctx.config.output_dir()).await?;
        eprintln!("🔇 {} muted segments rewritten", playlist.muted_count());
        (path.display().to_string(), playlist)
    } else {
        if muted {
            warn!("Video contains muted segments");
        }
        (vod.url.clone(), served_playlist(&raw, &vod.url))
    };

    if ctx.config.check_segments {
        let progress = progress_line("Checking segments");
        let report = ctx
            .segment_validator()
            .validate(&playlist.segments, Some(&progress))
            .await;
        eprintln!("📊 {}", report.status());
    }

    println!("{location}");
    Ok(())
}
