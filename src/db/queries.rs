// Database queries — CRUD operations for all tables.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{ffi, params, Connection, OptionalExtension};
use tracing::warn;

use super::models::{
    ActionKind, ActionRecord, AutoInteractionContent, FailedAction, MonitoringList, SignerAccount,
    AUTO_INTERACTION_LIST_TYPE,
};
use super::traits::LedgerError;

// --- Lists ---

/// Raw list row before the JSON contents are decoded.
struct ListRow {
    id: String,
    name: String,
    contents: String,
    created_at: String,
}

impl ListRow {
    fn decode(self) -> Result<MonitoringList> {
        let contents: AutoInteractionContent = serde_json::from_str(&self.contents)
            .with_context(|| format!("List {} has malformed contents", self.id))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
        Ok(MonitoringList {
            id: self.id,
            name: self.name,
            created_at,
            contents,
        })
    }
}

/// Load every auto-interaction list, oldest first.
///
/// Lists whose contents don't decode are skipped with a warning so one
/// broken row can't stop the others from being processed.
pub fn list_auto_interaction_lists(conn: &Connection) -> Result<Vec<MonitoringList>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, contents, created_at
         FROM lists
         WHERE list_type = ?1
         ORDER BY created_at, id",
    )?;

    let rows = stmt.query_map(params![AUTO_INTERACTION_LIST_TYPE], |row| {
        Ok(ListRow {
            id: row.get(0)?,
            name: row.get(1)?,
            contents: row.get(2)?,
            created_at: row.get(3)?,
        })
    })?;

    let mut lists = Vec::new();
    for row in rows {
        match row?.decode() {
            Ok(list) => lists.push(list),
            Err(e) => warn!(error = %e, "Skipping unreadable list"),
        }
    }
    Ok(lists)
}

/// Load a single auto-interaction list by id.
pub fn get_list(conn: &Connection, list_id: &str) -> Result<Option<MonitoringList>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, contents, created_at
         FROM lists
         WHERE id = ?1 AND list_type = ?2",
    )?;
    let row = stmt
        .query_row(params![list_id, AUTO_INTERACTION_LIST_TYPE], |row| {
            Ok(ListRow {
                id: row.get(0)?,
                name: row.get(1)?,
                contents: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    row.map(ListRow::decode).transpose()
}

/// Insert or replace an auto-interaction list.
pub fn upsert_list(conn: &Connection, list: &MonitoringList) -> Result<()> {
    let contents = serde_json::to_string(&list.contents)?;
    let created_at = list
        .created_at
        .unwrap_or_else(Utc::now)
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string();
    conn.execute(
        "INSERT INTO lists (id, name, list_type, contents, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            name = ?2,
            list_type = ?3,
            contents = ?4",
        params![list.id, list.name, AUTO_INTERACTION_LIST_TYPE, contents, created_at],
    )?;
    Ok(())
}

/// Set `lastProcessedHash` inside a list's JSON contents.
///
/// Only the cursor key is touched, so concurrent edits to other fields made
/// by the web app survive. Returns false if the list was deleted.
pub fn update_cursor(conn: &Connection, list_id: &str, cursor: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE lists
         SET contents = json_set(contents, '$.lastProcessedHash', ?2)
         WHERE id = ?1",
        params![list_id, cursor],
    )?;
    Ok(changed > 0)
}

// --- Idempotency ledger ---

/// Check whether an action has been taken for (list, cast, kind).
///
/// True when the ledger has the row, and also when a hub accepted the action
/// but the ledger write failed: that action is on the network already and
/// must not be sent again. Such rows wait for operator follow-up.
pub fn has_acted(conn: &Connection, list_id: &str, cast_hash: &str, kind: ActionKind) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM action_history
            WHERE list_id = ?1 AND cast_hash = ?2 AND action = ?3
         ) OR EXISTS(
            SELECT 1 FROM action_failures
            WHERE list_id = ?1 AND cast_hash = ?2 AND action = ?3 AND submitted = 1
         )",
        params![list_id, cast_hash, kind.as_str()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Record an accepted action. The UNIQUE constraint turns a duplicate into
/// `LedgerError::Conflict`.
pub fn insert_action(
    conn: &Connection,
    list_id: &str,
    cast_hash: &str,
    kind: ActionKind,
) -> std::result::Result<(), LedgerError> {
    let result = conn.execute(
        "INSERT INTO action_history (list_id, cast_hash, action, performed_at)
         VALUES (?1, ?2, ?3, datetime('now'))",
        params![list_id, cast_hash, kind.as_str()],
    );

    match result {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => Err(LedgerError::Conflict),
        Err(e) => Err(LedgerError::Write(e.into())),
    }
}

/// Only the ledger key counts as a duplicate. NOT NULL, CHECK, and trigger
/// failures share the primary constraint code but are real write errors.
fn is_unique_violation(e: &rusqlite::Error) -> bool {
    e.sqlite_error().is_some_and(|err| {
        err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
            || err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    })
}

/// Most recent ledger rows for a list.
pub fn recent_actions(conn: &Connection, list_id: &str, limit: u32) -> Result<Vec<ActionRecord>> {
    let mut stmt = conn.prepare(
        "SELECT list_id, cast_hash, action, performed_at
         FROM action_history
         WHERE list_id = ?1
         ORDER BY performed_at DESC, rowid DESC
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![list_id, limit], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (list_id, cast_hash, action, performed_at) = row?;
        let Some(action) = ActionKind::parse(&action) else {
            warn!(action = action, "Unknown action kind in ledger, skipping row");
            continue;
        };
        records.push(ActionRecord {
            list_id,
            cast_hash,
            action,
            performed_at,
        });
    }
    Ok(records)
}

/// Total number of ledger rows across all lists.
pub fn action_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM action_history", [], |row| row.get(0))?;
    Ok(count)
}

// --- Failure log ---

/// Append a failure row. `submitted` marks an action a hub accepted but the
/// ledger could not record; `has_acted` treats those as done.
pub fn record_failure(
    conn: &Connection,
    list_id: &str,
    cast_hash: &str,
    kind: ActionKind,
    error_message: &str,
    submitted: bool,
) -> Result<()> {
    conn.execute(
        "INSERT INTO action_failures (list_id, cast_hash, action, error_message, submitted)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![list_id, cast_hash, kind.as_str(), error_message, submitted],
    )?;
    Ok(())
}

/// Most recent failures for a list.
pub fn recent_failures(conn: &Connection, list_id: &str, limit: u32) -> Result<Vec<FailedAction>> {
    let mut stmt = conn.prepare(
        "SELECT id, list_id, cast_hash, action, error_message, failed_at, submitted
         FROM action_failures
         WHERE list_id = ?1
         ORDER BY failed_at DESC, id DESC
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![list_id, limit], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, bool>(6)?,
        ))
    })?;

    let mut failures = Vec::new();
    for row in rows {
        let (id, list_id, cast_hash, action, error_message, failed_at, submitted) = row?;
        let Some(action) = ActionKind::parse(&action) else {
            continue;
        };
        failures.push(FailedAction {
            id,
            list_id,
            cast_hash,
            action,
            error_message,
            failed_at,
            submitted,
        });
    }
    Ok(failures)
}

// --- Signer accounts ---

/// Look up a signer account. Accounts without a key are returned as `None`.
pub fn get_signer_account(conn: &Connection, account_id: &str) -> Result<Option<SignerAccount>> {
    let mut stmt = conn.prepare(
        "SELECT id, platform_account_id, private_key FROM accounts WHERE id = ?1",
    )?;
    let row: Option<(String, String, Option<String>)> = stmt
        .query_row(params![account_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .optional()?;

    Ok(row.and_then(|(id, platform_account_id, private_key)| {
        private_key.map(|private_key| SignerAccount {
            id,
            platform_account_id,
            private_key,
        })
    }))
}

/// Insert or replace a signer account.
pub fn upsert_signer_account(conn: &Connection, account: &SignerAccount) -> Result<()> {
    conn.execute(
        "INSERT INTO accounts (id, platform_account_id, private_key)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
            platform_account_id = ?2,
            private_key = ?3",
        params![account.id, account.platform_account_id, account.private_key],
    )?;
    Ok(())
}
