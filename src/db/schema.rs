// Database schema — table creation and migrations.
//
// A `schema_version` table tracks which schema revision has been applied.
// Tables are CREATE IF NOT EXISTS and later columns go through numbered
// migrations, so startup can always call this.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// This is idempotent — safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Tracks schema version for future migrations
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- User-owned lists. Configuration lives in a JSON document so the
        -- web app can evolve list shapes without migrations here.
        CREATE TABLE IF NOT EXISTS lists (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            list_type TEXT NOT NULL,           -- 'auto_interaction', 'fids', 'search'
            contents TEXT NOT NULL,            -- JSON
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );

        -- Accounts able to sign messages (already-decrypted signer keys)
        CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            platform_account_id TEXT NOT NULL, -- Farcaster FID
            private_key TEXT                   -- hex Ed25519 key, NULL if not yet approved
        );

        -- The idempotency ledger: one row per action a hub accepted
        CREATE TABLE IF NOT EXISTS action_history (
            list_id TEXT NOT NULL,
            cast_hash TEXT NOT NULL,
            action TEXT NOT NULL,              -- 'like' or 'recast'
            performed_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (list_id, cast_hash, action)
        );

        -- Actions that failed to submit or to record
        CREATE TABLE IF NOT EXISTS action_failures (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            list_id TEXT NOT NULL,
            cast_hash TEXT NOT NULL,
            action TEXT NOT NULL,
            error_message TEXT NOT NULL,
            failed_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_lists_type
            ON lists(list_type);

        CREATE INDEX IF NOT EXISTS idx_history_performed
            ON action_history(list_id, performed_at);

        CREATE INDEX IF NOT EXISTS idx_failures_list
            ON action_failures(list_id, failed_at);
        ",
    )
    .context("Failed to create database tables")?;

    // Record initial schema version if not already set
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    // Migration v2: mark failures where the hub accepted the action but the
    // ledger write failed. Those count as acted on, so they are never resent.
    run_migration(conn, 2, |c| {
        c.execute_batch(
            "ALTER TABLE action_failures ADD COLUMN submitted INTEGER NOT NULL DEFAULT 0;
             CREATE INDEX IF NOT EXISTS idx_failures_submitted
                ON action_failures(list_id, cast_hash, action) WHERE submitted = 1;",
        )
    })?;

    Ok(())
}

/// Run a migration if it hasn't been applied yet.
/// The migration function receives the connection and should execute its SQL.
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}
