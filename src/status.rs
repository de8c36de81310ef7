// System status display — DB stats, list cursors, ledger size.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::db::Database;

/// Display system status to the terminal.
pub async fn show(db: &Arc<dyn Database>, db_path: &str, hub_urls: &[String]) -> Result<()> {
    if !Path::new(db_path).exists() {
        println!("Database: not initialized");
        println!("\nRun `autoreact init` to set up the database.");
        return Ok(());
    }

    let file_size = std::fs::metadata(db_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_path, file_size);

    let lists = db.list_auto_interaction_lists().await?;
    let never_run = lists.iter().filter(|l| l.cursor().is_none()).count();
    println!(
        "Auto-interaction lists: {} ({} not yet run)",
        lists.len(),
        never_run
    );
    if lists.is_empty() {
        println!("  Run `autoreact import-list <file>` to add one");
    }

    println!("Actions recorded: {}", db.action_count().await?);

    println!("Hubs (in fallback order):");
    for (i, url) in hub_urls.iter().enumerate() {
        println!("  {}. {}", i + 1, url);
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
