// Batch driver: runs every auto-interaction list with per-list isolation.
//
// A list that errors (or panics) is reported and the batch moves on. The
// only thing that fails the whole batch is not being able to load the lists
// in the first place.
//
// Lists run `concurrency` at a time. Results come back in list order either
// way, so the report reads the same as a sequential run.

use anyhow::Result;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{error, info};

use super::list::{ListProcessor, ListReport};

/// A list whose run ended in an error.
#[derive(Debug, Clone, Serialize)]
pub struct ListFailure {
    pub list_id: String,
    pub list_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub lists_attempted: usize,
    /// Lists where at least one action succeeded.
    pub lists_with_actions: usize,
    pub reports: Vec<ListReport>,
    pub errors: Vec<ListFailure>,
}

impl BatchReport {
    pub fn actions_succeeded(&self) -> usize {
        self.reports.iter().map(|r| r.succeeded).sum()
    }

    pub fn actions_failed(&self) -> usize {
        self.reports.iter().map(|r| r.failed).sum()
    }
}

/// Run every auto-interaction list once.
pub async fn run(
    processor: &ListProcessor,
    concurrency: usize,
    show_progress: bool,
) -> Result<BatchReport> {
    let lists = processor.database().list_auto_interaction_lists().await?;

    info!(
        lists = lists.len(),
        concurrency = concurrency,
        "Starting auto-interaction batch"
    );

    let pb = if show_progress {
        let pb = ProgressBar::new(lists.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  Lists [{bar:30}] {pos}/{len} ({eta})")
                .unwrap(),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let outcomes: Vec<_> = stream::iter(lists.iter().map(|list| {
        let pb = &pb;
        async move {
            let outcome = AssertUnwindSafe(processor.process(list))
                .catch_unwind()
                .await;
            pb.inc(1);
            (list, outcome)
        }
    }))
    .buffered(concurrency.max(1))
    .collect()
    .await;
    pb.finish_and_clear();

    let mut report = BatchReport {
        lists_attempted: lists.len(),
        ..Default::default()
    };

    for (list, outcome) in outcomes {
        let message = match outcome {
            Ok(Ok(list_report)) => {
                if list_report.succeeded > 0 {
                    report.lists_with_actions += 1;
                }
                report.reports.push(list_report);
                continue;
            }
            Ok(Err(e)) => e.to_string(),
            Err(panic) => format!("list processing panicked: {}", panic_message(panic.as_ref())),
        };

        error!(list_id = list.id, name = list.name, error = %message, "List failed");
        report.errors.push(ListFailure {
            list_id: list.id.clone(),
            list_name: list.name.clone(),
            error: message,
        });
    }

    info!(
        lists_attempted = report.lists_attempted,
        lists_with_actions = report.lists_with_actions,
        errors = report.errors.len(),
        "Batch complete"
    );

    Ok(report)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
