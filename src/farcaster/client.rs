// Neynar content client — reads Farcaster feeds over HTTP.
//
// A thin reqwest wrapper with a generic GET helper, plus the serde types for
// the v2 feed endpoint. Casts are converted into CandidatePost at the edge so
// nothing downstream depends on the API's JSON shape.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex_lite::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

use super::feed::{CandidatePost, ContentSource, FeedPage, FeedQuery};

/// Default Neynar API endpoint.
pub const DEFAULT_NEYNAR_API_URL: &str = "https://api.neynar.com";

/// Page size requested from the feed endpoint (API maximum).
const PAGE_LIMIT: &str = "100";

static URL_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid URL pattern"));

/// HTTP client for the Neynar v2 API.
pub struct NeynarClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl NeynarClient {
    /// Create a client pointing at `base_url`. Every request is bounded by `timeout`.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("autoreact/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// GET a JSON endpoint under the API root and deserialize the response.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        debug!(path = path, "Neynar GET request");

        let response = self
            .client
            .get(&url)
            .header("api_key", &self.api_key)
            .query(params)
            .send()
            .await
            .with_context(|| format!("Neynar request failed: {path}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Neynar {path} returned {status}: {body}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to deserialize {path} response"))
    }
}

#[async_trait]
impl ContentSource for NeynarClient {
    async fn recent_posts(&self, query: &FeedQuery, page_cursor: Option<&str>) -> Result<FeedPage> {
        let fids_param;
        let mut params: Vec<(&str, &str)> = match query {
            FeedQuery::Authors(fids) => {
                fids_param = fids.join(",");
                vec![
                    ("feed_type", "filter"),
                    ("filter_type", "fids"),
                    ("fids", fids_param.as_str()),
                ]
            }
            FeedQuery::Following(fid) => vec![("feed_type", "following"), ("fid", fid.as_str())],
        };
        params.push(("limit", PAGE_LIMIT));
        if let Some(cursor) = page_cursor {
            params.push(("cursor", cursor));
        }

        let response: FeedResponse = self.get_json("/v2/farcaster/feed", &params).await?;

        Ok(FeedPage {
            posts: response.casts.into_iter().map(CandidatePost::from).collect(),
            next_cursor: response.next.and_then(|n| n.cursor),
        })
    }
}

// -- Serde types for /v2/farcaster/feed --

#[derive(Debug, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    pub casts: Vec<Cast>,
    pub next: Option<NextCursor>,
}

#[derive(Debug, Deserialize)]
pub struct NextCursor {
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Cast {
    pub hash: String,
    pub parent_hash: Option<String>,
    pub author: CastAuthor,
    pub text: Option<String>,
    pub timestamp: Option<String>,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    #[serde(default)]
    pub mentioned_profiles: Vec<ProfileRef>,
}

#[derive(Debug, Deserialize)]
pub struct CastAuthor {
    pub fid: u64,
    pub username: Option<String>,
}

/// An embed is a URL, a cast reference, or a user reference. Only the
/// parts the filters need are kept.
#[derive(Debug, Deserialize)]
pub struct Embed {
    pub url: Option<String>,
    pub user: Option<ProfileRef>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileRef {
    pub fid: u64,
}

impl From<Cast> for CandidatePost {
    fn from(cast: Cast) -> Self {
        let text = cast.text.unwrap_or_default();

        let mut mentioned_fids: Vec<String> = cast
            .mentioned_profiles
            .iter()
            .map(|p| p.fid.to_string())
            .collect();
        mentioned_fids.extend(
            cast.embeds
                .iter()
                .filter_map(|e| e.user.as_ref())
                .map(|u| u.fid.to_string()),
        );

        let mut embedded_urls: Vec<String> =
            cast.embeds.iter().filter_map(|e| e.url.clone()).collect();
        embedded_urls.extend(URL_IN_TEXT.find_iter(&text).map(|m| m.as_str().to_string()));

        let created_at = cast
            .timestamp
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc));

        CandidatePost {
            hash: cast.hash,
            author_fid: cast.author.fid.to_string(),
            author_username: cast.author.username,
            parent_hash: cast.parent_hash,
            mentioned_fids,
            embedded_urls,
            text,
            created_at,
        }
    }
}
