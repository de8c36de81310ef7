// Data models — Rust structs that map to database rows.
//
// These are the types that flow through the engine. They're separate from
// the database queries so other modules can use them without depending on
// rusqlite directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The `list_type` value that marks a list for automated interaction.
pub const AUTO_INTERACTION_LIST_TYPE: &str = "auto_interaction";

/// A user-owned monitoring list: which accounts to watch and what to do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringList {
    pub id: String,
    pub name: String,
    /// When the list was created. Used to bound a list's first run.
    pub created_at: Option<DateTime<Utc>>,
    pub contents: AutoInteractionContent,
}

impl MonitoringList {
    pub fn tracked_account_ids(&self) -> &[String] {
        &self.contents.tracked_account_ids
    }

    pub fn cursor(&self) -> Option<&str> {
        self.contents.last_processed_hash.as_deref()
    }
}

/// The JSON `contents` column of an auto-interaction list.
///
/// Field names follow the stored JSON so lists written by the web app load
/// unchanged. Unknown keys are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoInteractionContent {
    /// FIDs whose casts are watched.
    #[serde(rename = "fids", default)]
    pub tracked_account_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub display_names: BTreeMap<String, String>,
    /// Internal account id of the actor (resolved to a FID and key).
    pub source_account_id: String,
    pub action_type: ActionType,
    #[serde(rename = "onlyTopCasts", default)]
    pub only_top_level: bool,
    #[serde(flatten)]
    pub filters: ContentFilters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_processed_hash: Option<String>,
    #[serde(default)]
    pub feed_source: FeedSource,
}

/// Optional content requirements. Each field is an OR over its values; all
/// configured fields are AND-ed together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentFilters {
    #[serde(rename = "requireMentions", default, skip_serializing_if = "Vec::is_empty")]
    pub required_mention_account_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_keywords: Vec<String>,
}

/// Where candidate casts come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedSource {
    /// Casts authored by the tracked FIDs.
    #[default]
    SpecificUsers,
    /// The actor's own following feed.
    Following,
}

/// What a list does to each qualifying cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Like,
    Recast,
    Both,
}

impl ActionType {
    /// The individual action kinds this setting implies, likes first.
    pub fn kinds(&self) -> &'static [ActionKind] {
        match self {
            ActionType::Like => &[ActionKind::Like],
            ActionType::Recast => &[ActionKind::Recast],
            ActionType::Both => &[ActionKind::Like, ActionKind::Recast],
        }
    }
}

/// A single protocol-level reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Like,
    Recast,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Like => "like",
            ActionKind::Recast => "recast",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(ActionKind::Like),
            "recast" => Some(ActionKind::Recast),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Durable proof that an action was accepted by a hub.
/// At most one exists per (list_id, cast_hash, action).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub list_id: String,
    pub cast_hash: String,
    pub action: ActionKind,
    pub performed_at: String,
}

/// A diagnostic entry for an action that did not make it into the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedAction {
    pub id: i64,
    pub list_id: String,
    pub cast_hash: String,
    pub action: ActionKind,
    pub error_message: String,
    pub failed_at: String,
    /// A hub accepted the action but the ledger write failed.
    pub submitted: bool,
}

/// A stored signer: the actor's FID and its hex-encoded Ed25519 private key.
#[derive(Clone)]
pub struct SignerAccount {
    pub id: String,
    pub platform_account_id: String,
    pub private_key: String,
}

impl std::fmt::Debug for SignerAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerAccount")
            .field("id", &self.id)
            .field("platform_account_id", &self.platform_account_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}
