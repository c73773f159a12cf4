//! Playlist reconstruction.
//!
//! Recovered manifests list segments by relative name, and segments whose
//! audio was muted by the platform are listed under their `-unmuted` name
//! even though only the `-muted` file still exists. Rewriting gives every
//! segment an absolute URL and swaps in the muted variant where needed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info, instrument};

use crate::http_client::PageFetcher;

const PLAYLIST_FILE: &str = "index-dvr.m3u8";
const UNMUTED_MARKER: &str = "-unmuted";

/// One media segment of a rewritten playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSegment {
    /// 0-based, contiguous, in playback order.
    pub index: usize,
    pub url: String,
    pub muted: bool,
}

/// Rewritten manifest text plus the segments it lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructedPlaylist {
    pub text: String,
    pub segments: Vec<PlaylistSegment>,
}

impl ReconstructedPlaylist {
    pub fn muted_count(&self) -> usize {
        self.segments.iter().filter(|s| s.muted).count()
    }
}

/// Directory URL of a playlist: everything before `index-dvr.m3u8`.
pub fn base_url(playlist_url: &str) -> &str {
    playlist_url
        .strip_suffix(PLAYLIST_FILE)
        .unwrap_or_else(|| {
            playlist_url
                .rfind('/')
                .map_or("", |slash| &playlist_url[..=slash])
        })
}

/// Rewrite a raw manifest.
///
/// Tag and blank lines pass through unchanged. The Nth remaining line
/// becomes `{base}{N}.ts`, or `{base}{N}-muted.ts` when the broadcast is
/// muted and the line names an unmuted variant. Output is `\n`-terminated.
pub fn reconstruct(raw: &str, base: &str, muted: bool) -> ReconstructedPlaylist {
    let mut text = String::with_capacity(raw.len() * 2);
    let mut segments = Vec::new();

    for line in raw.lines() {
        if line.starts_with('#') || line.trim().is_empty() {
            text.push_str(line);
        } else {
            let index = segments.len();
            let is_muted = muted && line.contains(UNMUTED_MARKER);
            let url = if is_muted {
                format!("{base}{index}-muted.ts")
            } else {
                format!("{base}{index}.ts")
            };
            text.push_str(&url);
            segments.push(PlaylistSegment {
                index,
                url,
                muted: is_muted,
            });
        }
        text.push('\n');
    }

    ReconstructedPlaylist { text, segments }
}

/// Whether a manifest lists muted segments.
pub fn manifest_is_muted(raw: &str) -> bool {
    raw.contains("unmuted")
}

/// Fetch a manifest, trying up to five times one second apart.
pub async fn fetch_manifest(fetcher: &dyn PageFetcher, url: &str) -> Result<String> {
    fetch_manifest_with(fetcher, url, 5, Duration::from_secs(1)).await
}

#[instrument(skip(fetcher, delay))]
pub async fn fetch_manifest_with(
    fetcher: &dyn PageFetcher,
    url: &str,
    attempts: u32,
    delay: Duration,
) -> Result<String> {
    let mut last_error = None;

    for attempt in 0..attempts {
        match fetcher.fetch_page(url).await {
            Ok(page) if page.is_success() => return Ok(page.body),
            Ok(page) => last_error = Some(anyhow!("manifest fetch failed: HTTP {}", page.status)),
            Err(e) => last_error = Some(e),
        }
        debug!(attempt, "manifest fetch failed");

        if attempt + 1 < attempts {
            tokio::time::sleep(delay).await;
        }
    }

    Err(last_error
        .unwrap_or_else(|| anyhow!("manifest fetch not attempted"))
        .context(format!("failed to fetch manifest after {attempts} attempts")))
}

/// Where the rewritten manifest for a broadcast is stored.
pub fn playlist_path(dir: &Path, channel: &str, broadcast_id: &str) -> PathBuf {
    dir.join(format!("{channel}_{broadcast_id}.m3u8"))
}

/// Write a rewritten manifest as UTF-8, creating the directory if needed.
pub async fn write_playlist(path: &Path, playlist: &ReconstructedPlaylist) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, &playlist.text)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("Playlist written to {}", path.display());
    Ok(())
}

/// Fetch, rewrite and store the manifest of a recovered broadcast.
pub async fn unmute(
    fetcher: &dyn PageFetcher,
    url: &str,
    dir: &Path,
) -> Result<(PathBuf, ReconstructedPlaylist)> {
    let raw = fetch_manifest(fetcher, url).await?;
    unmute_from(&raw, manifest_is_muted(&raw), url, dir).await
}

/// Rewrite and store an already fetched manifest of the broadcast at `url`.
pub async fn unmute_from(
    raw: &str,
    muted: bool,
    url: &str,
    dir: &Path,
) -> Result<(PathBuf, ReconstructedPlaylist)> {
    let (channel, broadcast_id) =
        parse_vod_link(url).ok_or_else(|| anyhow!("not a recovered playlist URL: {url}"))?;

    let playlist = reconstruct(raw, base_url(url), muted);
    let path = playlist_path(dir, &channel, &broadcast_id);
    write_playlist(&path, &playlist).await?;
    if muted {
        info!("{} has been unmuted", path.display());
    }
    Ok((path, playlist))
}

/// Total `#EXTINF` duration of a manifest in whole minutes.
pub fn duration_minutes(raw: &str) -> u32 {
    let seconds: f64 = raw
        .lines()
        .filter_map(|line| line.strip_prefix("#EXTINF:"))
        .filter_map(|rest| rest.split(',').next())
        .filter_map(|d| d.trim().parse::<f64>().ok())
        .sum();
    (seconds / 60.0).floor() as u32
}

/// Channel and broadcast id from a recovered playlist URL.
///
/// The storage directory is `{hash}_{channel}_{id}_{epoch}`; channel names
/// may themselves contain underscores.
pub fn parse_vod_link(url: &str) -> Option<(String, String)> {
    url.split(['?', '#'])
        .next()?
        .split('/')
        .find_map(|segment| {
            let (hash, rest) = segment.split_once('_')?;
            if hash.len() != 20 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            let mut tail = rest.rsplitn(3, '_');
            let epoch = tail.next()?;
            let id = tail.next()?;
            let channel = tail.next()?;
            let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
            (numeric(epoch) && numeric(id) && !channel.is_empty())
                .then(|| (channel.to_string(), id.to_string()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::FetchedPage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    const URL: &str = "https://vod-secure.twitch.tv/48c4457049d2d7c4091f_shroud_999_1704067200/chunked/index-dvr.m3u8";
    const BASE: &str = "https://vod-secure.twitch.tv/48c4457049d2d7c4091f_shroud_999_1704067200/chunked/";

    const RAW: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:10
#EXT-X-PLAYLIST-TYPE:EVENT
#EXTINF:10.000,
0.ts
#EXTINF:10.000,
1-unmuted.ts
#EXTINF:10.000,
2-unmuted.ts
#EXTINF:4.500,
3.ts
#EXT-X-ENDLIST
";

    #[test]
    fn base_url_strips_playlist_name() {
        assert_eq!(base_url(URL), BASE);
        assert_eq!(base_url("https://host/dir/other.m3u8"), "https://host/dir/");
    }

    #[test]
    fn segments_are_numbered_contiguously() {
        let playlist = reconstruct(RAW, BASE, false);
        let indices: Vec<usize> = playlist.segments.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(playlist.segments[1].url, format!("{BASE}1.ts"));
        assert_eq!(playlist.muted_count(), 0);
    }

    #[test]
    fn muted_broadcast_uses_muted_variants() {
        let playlist = reconstruct(RAW, BASE, true);
        let urls: Vec<String> = playlist.segments.iter().map(|s| s.url.clone()).collect();
        assert_eq!(
            urls,
            vec![
                format!("{BASE}0.ts"),
                format!("{BASE}1-muted.ts"),
                format!("{BASE}2-muted.ts"),
                format!("{BASE}3.ts"),
            ]
        );
        assert_eq!(playlist.muted_count(), 2);
    }

    #[test]
    fn metadata_lines_preserved_in_order() {
        let playlist = reconstruct(RAW, BASE, true);
        let tags: Vec<&str> = playlist.text.lines().filter(|l| l.starts_with('#')).collect();
        let original: Vec<&str> = RAW.lines().filter(|l| l.starts_with('#')).collect();
        assert_eq!(tags, original);
        assert_eq!(playlist.text.lines().count(), RAW.lines().count());
    }

    #[test]
    fn rewrite_is_repeatable() {
        let first = reconstruct(RAW, BASE, true);
        let second = reconstruct(RAW, BASE, true);
        assert_eq!(first.text.as_bytes(), second.text.as_bytes());
        assert_eq!(first, second);
    }

    #[test]
    fn mute_detection() {
        assert!(manifest_is_muted(RAW));
        assert!(!manifest_is_muted("#EXTM3U\n0.ts\n"));
    }

    #[test]
    fn duration_sums_extinf() {
        assert_eq!(duration_minutes(RAW), 0);
        let long: String = (0..13).map(|i| format!("#EXTINF:10.000,\n{i}.ts\n")).collect();
        assert_eq!(duration_minutes(&long), 2);
    }

    #[test]
    fn vod_link_parsing() {
        assert_eq!(
            parse_vod_link(URL),
            Some(("shroud".to_string(), "999".to_string()))
        );
        let underscored = "https://d2nvs31859zcd8.cloudfront.net/0123456789abcdef0123_the_real_one_42_1704067200/720p60/index-dvr.m3u8";
        assert_eq!(
            parse_vod_link(underscored),
            Some(("the_real_one".to_string(), "42".to_string()))
        );
        assert_eq!(parse_vod_link("https://example.com/video.m3u8"), None);
    }

    #[test]
    fn path_from_channel_and_id() {
        assert_eq!(
            playlist_path(Path::new("/tmp/vods"), "shroud", "999"),
            PathBuf::from("/tmp/vods/shroud_999.m3u8")
        );
    }

    struct Flaky {
        failures: AtomicU32,
    }

    #[async_trait]
    impl PageFetcher for Flaky {
        async fn fetch_page(&self, _url: &str) -> Result<FetchedPage> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Ok(FetchedPage {
                    status: 503,
                    body: String::new(),
                });
            }
            Ok(FetchedPage {
                status: 200,
                body: RAW.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn manifest_fetch_retries() {
        let fetcher = Flaky {
            failures: AtomicU32::new(3),
        };
        let body = fetch_manifest_with(&fetcher, URL, 5, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(body, RAW);
    }

    #[tokio::test]
    async fn manifest_fetch_gives_up() {
        let fetcher = Flaky {
            failures: AtomicU32::new(10),
        };
        let result = fetch_manifest_with(&fetcher, URL, 5, Duration::from_millis(1)).await;
        assert!(result.is_err());
        assert_eq!(fetcher.failures.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn unmute_writes_rewritten_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Flaky {
            failures: AtomicU32::new(0),
        };
        let (path, playlist) = unmute(&fetcher, URL, dir.path()).await.unwrap();

        assert_eq!(path, dir.path().join("shroud_999.m3u8"));
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, playlist.text);
        assert!(written.contains(&format!("{BASE}1-muted.ts")));
    }

    struct Counting {
        fetches: AtomicU32,
    }

    #[async_trait]
    impl PageFetcher for Counting {
        async fn fetch_page(&self, _url: &str) -> Result<FetchedPage> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(FetchedPage {
                status: 200,
                body: RAW.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn unmute_fetches_manifest_once() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Counting {
            fetches: AtomicU32::new(0),
        };
        let (_, playlist) = unmute(&fetcher, URL, dir.path()).await.unwrap();
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(playlist.muted_count(), 2);
    }

    #[tokio::test]
    async fn unmute_from_uses_given_manifest_and_flag() {
        let dir = tempfile::tempdir().unwrap();
        let (path, playlist) = unmute_from(RAW, false, URL, dir.path()).await.unwrap();

        assert_eq!(playlist.muted_count(), 0);
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, reconstruct(RAW, BASE, false).text);
        assert!(!written.contains("-muted.ts"));

        let err = unmute_from(RAW, true, "https://host/index-dvr.m3u8", dir.path()).await;
        assert!(err.is_err());
    }
}
