// Filter evaluator — decides whether a candidate cast qualifies for action.
//
// Pure and deterministic. Configured rules are AND-ed; each rule is an OR
// over its configured values. Empty rules don't constrain anything.

use crate::db::models::MonitoringList;
use crate::farcaster::feed::CandidatePost;

/// Why a cast was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Authored by the acting account.
    SelfAuthored,
    /// A reply, and the list only wants top-level casts.
    Reply,
    MissingMention,
    MissingUrl,
    MissingKeyword,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::SelfAuthored => "self-authored",
            Rejection::Reply => "reply",
            Rejection::MissingMention => "missing mention",
            Rejection::MissingUrl => "missing url",
            Rejection::MissingKeyword => "missing keyword",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Does `post` qualify under `list`'s rules?
pub fn matches(post: &CandidatePost, list: &MonitoringList) -> bool {
    evaluate(post, list, None).is_ok()
}

/// Evaluate `post` against `list`, also rejecting the actor's own casts
/// when `actor_fid` is given.
pub fn evaluate(
    post: &CandidatePost,
    list: &MonitoringList,
    actor_fid: Option<&str>,
) -> Result<(), Rejection> {
    let content = &list.contents;
    let filters = &content.filters;

    if actor_fid.is_some_and(|fid| fid == post.author_fid) {
        return Err(Rejection::SelfAuthored);
    }

    if content.only_top_level && post.is_reply() {
        return Err(Rejection::Reply);
    }

    if !filters.required_mention_account_ids.is_empty()
        && !post
            .mentioned_fids
            .iter()
            .any(|fid| filters.required_mention_account_ids.contains(fid))
    {
        return Err(Rejection::MissingMention);
    }

    if !filters.required_urls.is_empty()
        && !post.embedded_urls.iter().any(|url| {
            filters
                .required_urls
                .iter()
                .any(|required| url.contains(required.as_str()))
        })
    {
        return Err(Rejection::MissingUrl);
    }

    if !filters.required_keywords.is_empty() {
        let text = post.text.to_lowercase();
        let found = filters
            .required_keywords
            .iter()
            .any(|keyword| text.contains(&keyword.to_lowercase()));
        if !found {
            return Err(Rejection::MissingKeyword);
        }
    }

    Ok(())
}
