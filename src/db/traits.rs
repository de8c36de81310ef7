// Database trait — backend-agnostic async interface for all DB operations.
//
// Implementor: SqliteDatabase (wraps rusqlite behind a tokio Mutex). All
// methods are async so the engine never cares whether the backend is
// blocking or native async.
//
// The trait covers three stores the engine talks to: list configuration,
// the idempotency ledger, and signer accounts.

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use super::models::{ActionKind, ActionRecord, FailedAction, MonitoringList, SignerAccount};

/// Failure to write a ledger row.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Another invocation already recorded this (list, cast, action).
    /// Callers treat this as "already handled".
    #[error("action already recorded")]
    Conflict,
    #[error("ledger write failed: {0:#}")]
    Write(anyhow::Error),
}

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- List configuration ---

    /// Load every list of the auto-interaction type, oldest first.
    async fn list_auto_interaction_lists(&self) -> Result<Vec<MonitoringList>>;

    /// Load a single list by id. `None` if it has been deleted.
    async fn get_list(&self, list_id: &str) -> Result<Option<MonitoringList>>;

    /// Insert or replace a list.
    async fn upsert_list(&self, list: &MonitoringList) -> Result<()>;

    /// Set a list's `lastProcessedHash`. Returns false if the list no longer exists.
    async fn update_cursor(&self, list_id: &str, cursor: &str) -> Result<bool>;

    // --- Idempotency ledger ---

    /// Has this action already been taken for this list and cast? Also true
    /// for actions a hub accepted but the ledger failed to record.
    async fn has_acted(&self, list_id: &str, cast_hash: &str, kind: ActionKind) -> Result<bool>;

    /// Record an accepted action. Fails with `LedgerError::Conflict` if the
    /// key already exists.
    async fn insert_action(
        &self,
        list_id: &str,
        cast_hash: &str,
        kind: ActionKind,
    ) -> std::result::Result<(), LedgerError>;

    /// Most recent ledger rows for a list, newest first.
    async fn recent_actions(&self, list_id: &str, limit: u32) -> Result<Vec<ActionRecord>>;

    /// Total number of ledger rows.
    async fn action_count(&self) -> Result<i64>;

    // --- Failure log ---

    /// Append a failure row. Rows with `submitted` set (accepted by a hub,
    /// not recorded) are consulted by `has_acted`; the rest are diagnostic.
    async fn record_failure(
        &self,
        list_id: &str,
        cast_hash: &str,
        kind: ActionKind,
        error_message: &str,
        submitted: bool,
    ) -> Result<()>;

    /// Most recent failures for a list, newest first.
    async fn recent_failures(&self, list_id: &str, limit: u32) -> Result<Vec<FailedAction>>;

    // --- Signer accounts ---

    /// Look up a signer account by internal id.
    async fn get_signer_account(&self, account_id: &str) -> Result<Option<SignerAccount>>;

    /// Insert or replace a signer account.
    async fn upsert_signer_account(&self, account: &SignerAccount) -> Result<()>;
}
