// List processor: fetch -> filter -> dedupe -> act -> record -> advance cursor.
//
// Runs one monitoring list end to end. Failures are contained at the
// smallest scope that makes sense: a failed action doesn't stop the other
// action kind or the next cast. Only key resolution and fetching abort the
// whole list, and both happen before anything is submitted.
//
// The cursor moves once, after every candidate has been handled, and only
// if at least one action landed in the ledger. A run killed halfway leaves
// the old cursor in place, and the ledger suppresses whatever it already did.
// An action a hub accepted but the ledger couldn't record is logged as a
// submitted failure, which the ledger check also treats as done.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::db::models::{ActionKind, MonitoringList};
use crate::db::{Database, LedgerError};
use crate::farcaster::feed::{self, CandidatePost, ContentSource, FeedQuery, FetchLimits};
use crate::farcaster::hubs::ActionSubmitter;
use crate::filter;
use crate::keys::{KeyError, SignerKey, SigningKeyProvider};
use crate::output::truncate_chars;

/// Errors that abort one list's run. Nothing has been submitted when the
/// first two occur.
#[derive(Debug, Error)]
pub enum ListError {
    #[error("could not resolve signer for account {account_id}: {source}")]
    KeyResolution {
        account_id: String,
        #[source]
        source: KeyError,
    },
    #[error("failed to fetch casts: {0:#}")]
    Fetch(anyhow::Error),
    #[error("list store error: {0:#}")]
    Store(anyhow::Error),
}

/// Why a list was not processed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Deleted between loading and processing.
    Deleted,
    NoTrackedAccounts,
}

/// A single action that did not make it into the ledger this run.
#[derive(Debug, Clone, Serialize)]
pub struct ActionFailure {
    pub cast_hash: String,
    pub kind: ActionKind,
    pub reason: String,
}

/// Outcome of one list's run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListReport {
    pub list_id: String,
    pub list_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
    pub fetched: usize,
    pub filtered_out: usize,
    /// Actions skipped because the ledger already had them.
    pub already_done: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor_advanced_to: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ActionFailure>,
}

impl ListReport {
    fn new(list: &MonitoringList) -> Self {
        Self {
            list_id: list.id.clone(),
            list_name: list.name.clone(),
            ..Default::default()
        }
    }

    fn skipped(list: &MonitoringList, reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::new(list)
        }
    }
}

/// Outcome of one action kind on one cast.
enum ActionOutcome {
    AlreadyDone,
    Ledgered,
    Failed { reason: String, submitted: bool },
}

impl ActionOutcome {
    fn not_sent(reason: String) -> Self {
        Self::Failed {
            reason,
            submitted: false,
        }
    }
}

/// Everything a list run talks to.
pub struct ListProcessor {
    db: Arc<dyn Database>,
    content: Arc<dyn ContentSource>,
    keys: Arc<dyn SigningKeyProvider>,
    submitter: ActionSubmitter,
    limits: FetchLimits,
}

impl ListProcessor {
    pub fn new(
        db: Arc<dyn Database>,
        content: Arc<dyn ContentSource>,
        keys: Arc<dyn SigningKeyProvider>,
        submitter: ActionSubmitter,
    ) -> Self {
        Self {
            db,
            content,
            keys,
            submitter,
            limits: FetchLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: FetchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    /// Process one list.
    ///
    /// The list is re-read first so a list deleted after the batch loaded it
    /// is a no-op, and the cursor is the latest persisted one.
    pub async fn process(&self, loaded: &MonitoringList) -> Result<ListReport, ListError> {
        let Some(list) = self.db.get_list(&loaded.id).await.map_err(ListError::Store)? else {
            info!(list_id = loaded.id, "List was deleted before processing, skipping");
            return Ok(ListReport::skipped(loaded, SkipReason::Deleted));
        };

        if list.tracked_account_ids().is_empty() {
            info!(list_id = list.id, "No FIDs to monitor, skipping");
            return Ok(ListReport::skipped(&list, SkipReason::NoTrackedAccounts));
        }

        let account_id = &list.contents.source_account_id;
        let signer = self
            .keys
            .resolve_key(account_id)
            .await
            .map_err(|source| ListError::KeyResolution {
                account_id: account_id.clone(),
                source,
            })?;

        info!(
            list_id = list.id,
            name = list.name,
            actor = signer.fid,
            cursor = list.cursor().unwrap_or("none"),
            "Processing list"
        );

        let query = FeedQuery::for_list(&list, &signer.fid);
        let candidates = feed::fetch_candidates(
            self.content.as_ref(),
            &query,
            list.cursor(),
            list.created_at,
            &self.limits,
        )
        .await
        .map_err(ListError::Fetch)?;

        let mut report = ListReport::new(&list);
        report.fetched = candidates.len();
        let mut any_ledgered = false;

        for post in &candidates {
            if let Err(reason) = filter::evaluate(post, &list, Some(&signer.fid)) {
                debug!(
                    list_id = list.id,
                    post = post.hash,
                    author = post.author_username.as_deref().unwrap_or(&post.author_fid),
                    reason = %reason,
                    "Filtered out"
                );
                report.filtered_out += 1;
                continue;
            }

            debug!(
                list_id = list.id,
                post = post.hash,
                text = truncate_chars(&post.text, 80),
                "Cast passed filters"
            );

            for &kind in list.contents.action_type.kinds() {
                match self.act(&list, &signer, post, kind, &mut report).await {
                    ActionOutcome::AlreadyDone => report.already_done += 1,
                    ActionOutcome::Ledgered => {
                        report.succeeded += 1;
                        any_ledgered = true;
                    }
                    ActionOutcome::Failed { reason, submitted } => {
                        report.failed += 1;
                        if let Err(e) = self
                            .db
                            .record_failure(&list.id, &post.hash, kind, &reason, submitted)
                            .await
                        {
                            warn!(list_id = list.id, error = %e, "Failed to log action failure");
                        }
                        report.failures.push(ActionFailure {
                            cast_hash: post.hash.clone(),
                            kind,
                            reason,
                        });
                    }
                }
            }
        }

        if any_ledgered {
            if let Some(newest) = candidates.first() {
                self.advance_cursor(&list, &newest.hash, &mut report).await?;
            }
        }

        info!(
            list_id = list.id,
            fetched = report.fetched,
            filtered_out = report.filtered_out,
            already_done = report.already_done,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "List processed"
        );

        Ok(report)
    }

    /// Check the ledger, submit, and record one action kind for one cast.
    async fn act(
        &self,
        list: &MonitoringList,
        signer: &SignerKey,
        post: &CandidatePost,
        kind: ActionKind,
        report: &mut ListReport,
    ) -> ActionOutcome {
        match self.db.has_acted(&list.id, &post.hash, kind).await {
            Ok(true) => {
                debug!(list_id = list.id, post = post.hash, kind = %kind, "Already done, skipping");
                return ActionOutcome::AlreadyDone;
            }
            Ok(false) => {}
            Err(e) => {
                // Unknown ledger state: submitting could duplicate
                warn!(list_id = list.id, post = post.hash, kind = %kind, error = %e, "Ledger check failed");
                return ActionOutcome::not_sent(format!("ledger check failed: {e:#}"));
            }
        }

        report.attempted += 1;
        if let Err(e) = self.submitter.submit(kind, signer, post).await {
            warn!(list_id = list.id, post = post.hash, kind = %kind, error = %e, "Submission failed");
            return ActionOutcome::not_sent(e.to_string());
        }

        match self.db.insert_action(&list.id, &post.hash, kind).await {
            Ok(()) => ActionOutcome::Ledgered,
            Err(LedgerError::Conflict) => {
                debug!(list_id = list.id, post = post.hash, kind = %kind, "Recorded by a concurrent run");
                ActionOutcome::Ledgered
            }
            Err(LedgerError::Write(e)) => {
                // Already on the network; resubmitting would double the action
                error!(
                    list_id = list.id,
                    post = post.hash,
                    kind = %kind,
                    error = %e,
                    "Action submitted but not recorded, needs operator follow-up"
                );
                ActionOutcome::Failed {
                    reason: format!("submitted but not recorded: {e:#}"),
                    submitted: true,
                }
            }
        }
    }

    async fn advance_cursor(
        &self,
        list: &MonitoringList,
        newest: &str,
        report: &mut ListReport,
    ) -> Result<(), ListError> {
        if list.cursor() == Some(newest) {
            return Ok(());
        }

        let updated = self
            .db
            .update_cursor(&list.id, newest)
            .await
            .map_err(ListError::Store)?;

        if updated {
            info!(list_id = list.id, cursor = newest, "Advanced cursor");
            report.cursor_advanced_to = Some(newest.to_string());
        } else {
            info!(list_id = list.id, "List deleted during processing, cursor not saved");
        }
        Ok(())
    }
}
