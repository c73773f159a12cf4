//! Direct recovery of a video that is still listed on Twitch.
//!
//! The public GraphQL API exposes a storyboard URL for every video. Its
//! path contains the same storage directory as the playlist, one segment
//! before `storyboards`, so the playlist can be derived without probing.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};
use url::Url;

pub const GQL_ENDPOINT: &str = "https://gql.twitch.tv/gql";

/// Public client id of the Twitch web player.
const CLIENT_ID: &str = "kimne78kx3ncx6brgo4mv6wki5h1ko";

static VIDEO_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"twitch\.tv/(?:[^/]+/)?(\d+)").unwrap());

#[derive(Debug, Clone, Deserialize)]
pub struct Owner {
    pub login: String,
}

/// Fields of a video the recovery needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub broadcast_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "seekPreviewsURL")]
    pub seek_previews_url: Option<String>,
    pub owner: Option<Owner>,
}

#[derive(Debug, Deserialize)]
struct GqlResponse {
    data: Option<GqlData>,
}

#[derive(Debug, Deserialize)]
struct GqlData {
    video: Option<VideoMetadata>,
}

/// Video id from a `twitch.tv/videos/{id}` URL.
pub fn parse_video_id(url: &str) -> Option<String> {
    VIDEO_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Playlist URL derived from a storyboard URL.
pub fn playlist_from_seek_previews(seek_previews_url: &str) -> Option<String> {
    let parsed = Url::parse(seek_previews_url).ok()?;
    let host = parsed.host_str()?;
    let segments: Vec<&str> = parsed.path_segments()?.collect();
    let storyboards = segments.iter().position(|s| s.contains("storyboards"))?;
    let storage_key = segments.get(storyboards.checked_sub(1)?)?;
    if storage_key.is_empty() {
        return None;
    }
    Some(format!("https://{host}/{storage_key}/chunked/index-dvr.m3u8"))
}

fn parse_response(body: &str) -> Result<VideoMetadata> {
    let response: GqlResponse =
        serde_json::from_str(body).context("unexpected GraphQL response")?;
    response
        .data
        .and_then(|d| d.video)
        .ok_or_else(|| anyhow!("video not found"))
}

/// Minimal GraphQL client for video lookups.
pub struct TwitchClient {
    client: Client,
    retries: u32,
    delay: Duration,
}

impl TwitchClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            retries: 3,
            delay: Duration::from_secs(5),
        }
    }

    #[instrument(skip(self))]
    pub async fn video(&self, video_id: &str) -> Result<VideoMetadata> {
        let query = format!(
            r#"query {{ video(id: "{video_id}") {{ title, broadcastType, createdAt, seekPreviewsURL, owner {{ login }} }} }}"#
        );
        let mut last_error = None;

        for attempt in 0..self.retries {
            let result = self
                .client
                .post(GQL_ENDPOINT)
                .header("Client-Id", CLIENT_ID)
                .header("Accept", "application/json")
                .json(&json!({ "query": query }))
                .timeout(Duration::from_secs(30))
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    return parse_response(&resp.text().await?);
                }
                Ok(resp) => last_error = Some(anyhow!("GraphQL returned {}", resp.status())),
                Err(e) => last_error = Some(e.into()),
            }
            debug!(attempt, "GraphQL lookup failed");

            if attempt + 1 < self.retries {
                tokio::time::sleep(self.delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("GraphQL lookup not attempted")))
    }

    /// Look up a listed video and derive its source playlist.
    pub async fn recover(&self, video_url: &str) -> Result<(VideoMetadata, String)> {
        let Some(video_id) = parse_video_id(video_url) else {
            bail!("not a Twitch video URL: {video_url}");
        };
        let video = self.video(&video_id).await?;
        let Some(previews) = video.seek_previews_url.as_deref() else {
            warn!("video {video_id} has no storyboard");
            bail!("video {video_id} exposes no storyboard URL");
        };
        let playlist = playlist_from_seek_previews(previews)
            .ok_or_else(|| anyhow!("unrecognized storyboard URL: {previews}"))?;
        Ok((video, playlist))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_ids_from_urls() {
        assert_eq!(parse_video_id("https://www.twitch.tv/videos/2012345678").as_deref(), Some("2012345678"));
        assert_eq!(parse_video_id("twitch.tv/shroud/v/123").as_deref(), None);
        assert_eq!(parse_video_id("https://twitch.tv/shroud").as_deref(), None);
    }

    #[test]
    fn playlist_from_storyboard_path() {
        let previews = "https://d1m7jfoe9zdc1j.cloudfront.net/48c4457049d2d7c4091f_shroud_999_1704067200/storyboards/999-info.json";
        assert_eq!(
            playlist_from_seek_previews(previews).as_deref(),
            Some("https://d1m7jfoe9zdc1j.cloudfront.net/48c4457049d2d7c4091f_shroud_999_1704067200/chunked/index-dvr.m3u8")
        );
        assert_eq!(playlist_from_seek_previews("https://host/storyboards/x.json"), None);
        assert_eq!(playlist_from_seek_previews("not a url"), None);
    }

    #[test]
    fn response_parsing() {
        let body = r#"{"data":{"video":{
            "title":"late night",
            "broadcastType":"ARCHIVE",
            "createdAt":"2024-01-01T00:00:00Z",
            "seekPreviewsURL":"https://host/abc_shroud_999_1704067200/storyboards/999-info.json",
            "owner":{"login":"shroud"}
        }}}"#;
        let video = parse_response(body).unwrap();
        assert_eq!(video.owner.unwrap().login, "shroud");
        assert_eq!(video.broadcast_type.as_deref(), Some("ARCHIVE"));
        assert!(video.seek_previews_url.is_some());

        assert!(parse_response(r#"{"data":{"video":null}}"#).is_err());
        assert!(parse_response("<html>").is_err());
    }
}
