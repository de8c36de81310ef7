// Content fetcher — candidate casts for a list, bounded by its cursor.
//
// The content API returns casts newest-first, a page at a time. We walk a
// bounded number of pages and stop as soon as the list's cursor shows up:
// everything at or before the cursor has already been considered. If the
// cursor never shows up (it aged out of the feed), every fetched cast is
// returned and the ledger filters out whatever was already handled.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::db::models::{FeedSource, MonitoringList};

/// The content API accepts at most this many FIDs per request.
pub const MAX_FIDS_PER_REQUEST: usize = 100;

/// A cast fetched for evaluation. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidatePost {
    /// Cast hash (`0x`-prefixed hex).
    pub hash: String,
    pub author_fid: String,
    pub author_username: Option<String>,
    /// Hash of the parent cast; `None` for top-level casts.
    pub parent_hash: Option<String>,
    pub mentioned_fids: Vec<String>,
    pub embedded_urls: Vec<String>,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl CandidatePost {
    pub fn is_reply(&self) -> bool {
        self.parent_hash.is_some()
    }
}

/// What to ask the content API for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedQuery {
    /// Casts authored by these FIDs.
    Authors(Vec<String>),
    /// The following feed of this FID.
    Following(String),
}

impl FeedQuery {
    /// Build the query for a list. `actor_fid` is used for following feeds.
    pub fn for_list(list: &MonitoringList, actor_fid: &str) -> Self {
        match list.contents.feed_source {
            FeedSource::Following => FeedQuery::Following(actor_fid.to_string()),
            FeedSource::SpecificUsers => {
                let fids = list.tracked_account_ids();
                if fids.len() > MAX_FIDS_PER_REQUEST {
                    warn!(
                        list_id = list.id,
                        tracked = fids.len(),
                        "List tracks more FIDs than one request allows, using the first {}",
                        MAX_FIDS_PER_REQUEST
                    );
                }
                FeedQuery::Authors(fids.iter().take(MAX_FIDS_PER_REQUEST).cloned().collect())
            }
        }
    }
}

/// One page of casts, newest first.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub posts: Vec<CandidatePost>,
    pub next_cursor: Option<String>,
}

/// The remote content API.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch one page of recent casts. `page_cursor` continues a previous page.
    async fn recent_posts(&self, query: &FeedQuery, page_cursor: Option<&str>) -> Result<FeedPage>;
}

/// Bounds on how much a single list run fetches.
#[derive(Debug, Clone)]
pub struct FetchLimits {
    pub max_pages: usize,
    pub max_posts: usize,
    /// Tighter cap when a list has no cursor yet.
    pub first_run_max_posts: usize,
    /// On a first run, casts older than list creation minus this are skipped.
    pub first_run_grace: Duration,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            max_pages: 5,
            max_posts: 200,
            first_run_max_posts: 100,
            first_run_grace: Duration::minutes(5),
        }
    }
}

/// Fetch candidate casts strictly newer than `since`, newest first.
///
/// Transport errors propagate; a partial result is never returned, so the
/// caller can't advance its cursor past casts it never saw.
pub async fn fetch_candidates(
    source: &dyn ContentSource,
    query: &FeedQuery,
    since: Option<&str>,
    list_created_at: Option<DateTime<Utc>>,
    limits: &FetchLimits,
) -> Result<Vec<CandidatePost>> {
    // First run: only casts from around list creation onwards
    let cutoff = match since {
        None => list_created_at.map(|t| t - limits.first_run_grace),
        Some(_) => None,
    };

    let mut collected: Vec<CandidatePost> = Vec::new();
    let mut page_cursor: Option<String> = None;
    let mut found_cursor = false;
    let mut pages = 0;

    while pages < limits.max_pages {
        let page = source.recent_posts(query, page_cursor.as_deref()).await?;
        pages += 1;

        debug!(
            page = pages,
            page_posts = page.posts.len(),
            "Fetched page of casts"
        );

        for post in page.posts {
            if since == Some(post.hash.as_str()) {
                found_cursor = true;
                break;
            }
            if let (Some(cutoff), Some(created_at)) = (cutoff, post.created_at) {
                if created_at < cutoff {
                    debug!(post = post.hash, "Skipping cast older than list creation");
                    continue;
                }
            }
            collected.push(post);
        }

        if found_cursor {
            break;
        }

        page_cursor = page.next_cursor;
        if page_cursor.is_none() {
            break;
        }
        if collected.len() >= limits.max_posts {
            break;
        }
        if since.is_none() && collected.len() >= limits.first_run_max_posts {
            break;
        }
    }

    if since.is_some() && !found_cursor {
        info!(
            fetched = collected.len(),
            "Cursor not found in fetched casts, considering all of them"
        );
    }

    Ok(collected)
}
