// Colored terminal output for batch reports, lists, and action history.
//
// This module handles all terminal-specific formatting. The main.rs
// commands delegate here.

use colored::Colorize;

use crate::db::models::{ActionRecord, ActionType, FailedAction, FeedSource, MonitoringList};
use crate::pipeline::batch::BatchReport;
use crate::pipeline::list::{ListReport, SkipReason};

use super::truncate_chars;

/// Display the outcome of a batch run.
pub fn display_batch_report(report: &BatchReport) {
    println!(
        "\n{}",
        format!("=== Batch Run ({} lists) ===", report.lists_attempted).bold()
    );
    println!();

    if report.lists_attempted == 0 {
        println!("No auto-interaction lists found. Import one with `autoreact import-list`.");
        return;
    }

    println!(
        "  {:<28} {:>7} {:>8} {:>5} {:>6} {:>6}  Cursor",
        "List".dimmed(),
        "Fetched".dimmed(),
        "Filtered".dimmed(),
        "Done".dimmed(),
        "OK".dimmed(),
        "Failed".dimmed(),
    );
    println!("  {}", "-".repeat(84).dimmed());

    for list in &report.reports {
        display_list_row(list);
    }

    for failure in &report.errors {
        println!(
            "  {:<28} {}",
            truncate_chars(&failure.list_name, 25),
            format!("Error: {}", failure.error).red(),
        );
    }

    println!();
    println!(
        "  Lists with actions: {}/{}",
        report.lists_with_actions, report.lists_attempted
    );
    println!("  Actions succeeded:  {}", report.actions_succeeded());

    let failed = report.actions_failed();
    if failed > 0 {
        println!("  {} {} actions failed", "!".bright_red(), failed);
    }
    if !report.errors.is_empty() {
        println!("  {} {} lists failed", "!!".red().bold(), report.errors.len());
    }
}

fn display_list_row(list: &ListReport) {
    let name = truncate_chars(&list.list_name, 25);

    if let Some(reason) = list.skipped {
        let why = match reason {
            SkipReason::Deleted => "skipped (deleted)",
            SkipReason::NoTrackedAccounts => "skipped (no FIDs)",
        };
        println!("  {:<28} {}", name, why.dimmed());
        return;
    }

    let failed = if list.failed > 0 {
        format!("{:>6}", list.failed).red().to_string()
    } else {
        format!("{:>6}", list.failed)
    };
    let succeeded = if list.succeeded > 0 {
        format!("{:>6}", list.succeeded).green().to_string()
    } else {
        format!("{:>6}", list.succeeded)
    };
    let cursor = match list.cursor_advanced_to.as_deref() {
        Some(hash) => short_hash(hash),
        None => "unchanged".dimmed().to_string(),
    };

    println!(
        "  {:<28} {:>7} {:>8} {:>5} {} {}  {}",
        name, list.fetched, list.filtered_out, list.already_done, succeeded, failed, cursor,
    );

    for failure in &list.failures {
        println!(
            "        {} {} {}",
            format!("[{}]", failure.kind).dimmed(),
            short_hash(&failure.cast_hash).dimmed(),
            truncate_chars(&failure.reason, 100).dimmed(),
        );
    }
}

/// Display configured auto-interaction lists.
pub fn display_lists(lists: &[MonitoringList]) {
    if lists.is_empty() {
        println!("No auto-interaction lists found. Import one with `autoreact import-list`.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Auto-Interaction Lists ({}) ===", lists.len()).bold()
    );
    println!();

    for list in lists {
        let content = &list.contents;
        let action = match content.action_type {
            ActionType::Like => "like",
            ActionType::Recast => "recast",
            ActionType::Both => "like + recast",
        };
        let source = match content.feed_source {
            FeedSource::SpecificUsers => format!("{} FIDs", list.tracked_account_ids().len()),
            FeedSource::Following => "following feed".to_string(),
        };

        println!("  {} {}", list.name.bold(), format!("({})", list.id).dimmed());
        println!("    Action:   {action}, from {source}");
        println!("    Account:  {}", content.source_account_id);
        if content.only_top_level {
            println!("    Replies:  excluded");
        }

        let filters = &content.filters;
        if !filters.required_mention_account_ids.is_empty() {
            println!("    Mentions: {}", filters.required_mention_account_ids.join(", "));
        }
        if !filters.required_urls.is_empty() {
            println!("    URLs:     {}", filters.required_urls.join(", "));
        }
        if !filters.required_keywords.is_empty() {
            println!("    Keywords: {}", filters.required_keywords.join(", "));
        }

        match list.cursor() {
            Some(hash) => println!("    Cursor:   {}", short_hash(hash)),
            None => println!("    Cursor:   {}", "not yet run".dimmed()),
        }
        println!();
    }
}

/// Display a list's recent ledger rows and failures.
pub fn display_history(list: &MonitoringList, actions: &[ActionRecord], failures: &[FailedAction]) {
    println!(
        "\n{}",
        format!("=== History: {} ===", list.name).bold()
    );

    println!("\n  {}", "Performed".bold());
    if actions.is_empty() {
        println!("  {}", "none yet".dimmed());
    }
    for action in actions {
        println!(
            "  {}  {:<6}  {}",
            action.performed_at.dimmed(),
            action.action.as_str().green(),
            action.cast_hash,
        );
    }

    if !failures.is_empty() {
        println!("\n  {}", "Failed".bold());
        for failure in failures {
            let marker = if failure.submitted { "  (on hub, not in ledger)" } else { "" };
            println!(
                "  {}  {:<6}  {}{}",
                failure.failed_at.dimmed(),
                failure.action.as_str().red(),
                failure.cast_hash,
                marker.yellow(),
            );
            println!(
                "        {}",
                truncate_chars(&failure.error_message, 100).dimmed()
            );
        }
    }
    println!();
}

/// First 10 characters of a hash, enough to tell casts apart in a table.
fn short_hash(hash: &str) -> String {
    truncate_chars(hash, 10)
}
