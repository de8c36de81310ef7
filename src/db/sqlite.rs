// SqliteDatabase — rusqlite backend implementing the Database trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// The lock is never held across an external .await.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{ActionKind, ActionRecord, FailedAction, MonitoringList, SignerAccount};
use super::traits::{Database, LedgerError};

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn list_auto_interaction_lists(&self) -> Result<Vec<MonitoringList>> {
        let conn = self.conn.lock().await;
        super::queries::list_auto_interaction_lists(&conn)
    }

    async fn get_list(&self, list_id: &str) -> Result<Option<MonitoringList>> {
        let conn = self.conn.lock().await;
        super::queries::get_list(&conn, list_id)
    }

    async fn upsert_list(&self, list: &MonitoringList) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::upsert_list(&conn, list)
    }

    async fn update_cursor(&self, list_id: &str, cursor: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        super::queries::update_cursor(&conn, list_id, cursor)
    }

    async fn has_acted(&self, list_id: &str, cast_hash: &str, kind: ActionKind) -> Result<bool> {
        let conn = self.conn.lock().await;
        super::queries::has_acted(&conn, list_id, cast_hash, kind)
    }

    async fn insert_action(
        &self,
        list_id: &str,
        cast_hash: &str,
        kind: ActionKind,
    ) -> std::result::Result<(), LedgerError> {
        let conn = self.conn.lock().await;
        super::queries::insert_action(&conn, list_id, cast_hash, kind)
    }

    async fn recent_actions(&self, list_id: &str, limit: u32) -> Result<Vec<ActionRecord>> {
        let conn = self.conn.lock().await;
        super::queries::recent_actions(&conn, list_id, limit)
    }

    async fn action_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::action_count(&conn)
    }

    async fn record_failure(
        &self,
        list_id: &str,
        cast_hash: &str,
        kind: ActionKind,
        error_message: &str,
        submitted: bool,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::record_failure(&conn, list_id, cast_hash, kind, error_message, submitted)
    }

    async fn recent_failures(&self, list_id: &str, limit: u32) -> Result<Vec<FailedAction>> {
        let conn = self.conn.lock().await;
        super::queries::recent_failures(&conn, list_id, limit)
    }

    async fn get_signer_account(&self, account_id: &str) -> Result<Option<SignerAccount>> {
        let conn = self.conn.lock().await;
        super::queries::get_signer_account(&conn, account_id)
    }

    async fn upsert_signer_account(&self, account: &SignerAccount) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::upsert_signer_account(&conn, account)
    }
}
