// Composition tests — a list run from fetch to ledger to cursor.
//
// These wire the real processor, submitter, filter, and SQLite ledger
// together, with an in-memory database and fake feed/hub endpoints. No
// network or filesystem access.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use autoreact::db::models::{
    ActionKind, ActionRecord, ActionType, AutoInteractionContent, ContentFilters, FailedAction,
    FeedSource, MonitoringList, SignerAccount,
};
use autoreact::db::{self, Database, LedgerError};
use autoreact::farcaster::feed::{CandidatePost, ContentSource, FeedPage, FeedQuery};
use autoreact::farcaster::hubs::{ActionSubmitter, RelayEndpoint};
use autoreact::farcaster::message::FarcasterNetwork;
use autoreact::keys::DatabaseKeyProvider;
use autoreact::pipeline::batch;
use autoreact::pipeline::list::{ListError, ListProcessor, SkipReason};

const ACTOR_FID: &str = "1234";
const BROKEN_FID: &str = "666";
const PANICKING_FID: &str = "13";

// ============================================================
// Fakes
// ============================================================

/// Single-page feed, newest first. Fails for queries that include BROKEN_FID
/// and panics for PANICKING_FID.
struct FakeFeed {
    posts: Mutex<Vec<CandidatePost>>,
}

impl FakeFeed {
    fn new(posts: Vec<CandidatePost>) -> Arc<Self> {
        Arc::new(Self {
            posts: Mutex::new(posts),
        })
    }

    fn publish(&self, post: CandidatePost) {
        self.posts.lock().unwrap().insert(0, post);
    }
}

#[async_trait]
impl ContentSource for FakeFeed {
    async fn recent_posts(&self, query: &FeedQuery, _page_cursor: Option<&str>) -> Result<FeedPage> {
        let authors = match query {
            FeedQuery::Authors(fids) => fids.clone(),
            FeedQuery::Following(_) => anyhow::bail!("following feed not supported here"),
        };
        if authors.iter().any(|f| f == BROKEN_FID) {
            anyhow::bail!("feed API returned 500");
        }
        if authors.iter().any(|f| f == PANICKING_FID) {
            panic!("cast payload could not be decoded");
        }
        let posts = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| authors.contains(&p.author_fid))
            .cloned()
            .collect();
        Ok(FeedPage {
            posts,
            next_cursor: None,
        })
    }
}

struct FakeRelay {
    accept: AtomicBool,
    calls: AtomicUsize,
}

impl FakeRelay {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            accept: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelayEndpoint for FakeRelay {
    fn name(&self) -> &str {
        "fake-hub"
    }

    async fn submit_message(&self, encoded: &[u8]) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(!encoded.is_empty());
        if self.accept.load(Ordering::SeqCst) {
            Ok(())
        } else {
            anyhow::bail!("hub returned 400: invalid signer")
        }
    }
}

/// Real SQLite store underneath, with the ledger check or the ledger write
/// forced to misbehave the way a concurrent run or a full disk would.
struct FlakyLedger {
    inner: Arc<dyn Database>,
    forget_acted: bool,
    fail_writes: bool,
}

#[async_trait]
impl Database for FlakyLedger {
    async fn table_count(&self) -> Result<i64> {
        self.inner.table_count().await
    }

    async fn list_auto_interaction_lists(&self) -> Result<Vec<MonitoringList>> {
        self.inner.list_auto_interaction_lists().await
    }

    async fn get_list(&self, list_id: &str) -> Result<Option<MonitoringList>> {
        self.inner.get_list(list_id).await
    }

    async fn upsert_list(&self, list: &MonitoringList) -> Result<()> {
        self.inner.upsert_list(list).await
    }

    async fn update_cursor(&self, list_id: &str, cursor: &str) -> Result<bool> {
        self.inner.update_cursor(list_id, cursor).await
    }

    async fn has_acted(&self, list_id: &str, cast_hash: &str, kind: ActionKind) -> Result<bool> {
        if self.forget_acted {
            return Ok(false);
        }
        self.inner.has_acted(list_id, cast_hash, kind).await
    }

    async fn insert_action(
        &self,
        list_id: &str,
        cast_hash: &str,
        kind: ActionKind,
    ) -> std::result::Result<(), LedgerError> {
        if self.fail_writes {
            return Err(LedgerError::Write(anyhow::anyhow!("disk I/O error")));
        }
        self.inner.insert_action(list_id, cast_hash, kind).await
    }

    async fn recent_actions(&self, list_id: &str, limit: u32) -> Result<Vec<ActionRecord>> {
        self.inner.recent_actions(list_id, limit).await
    }

    async fn action_count(&self) -> Result<i64> {
        self.inner.action_count().await
    }

    async fn record_failure(
        &self,
        list_id: &str,
        cast_hash: &str,
        kind: ActionKind,
        error_message: &str,
        submitted: bool,
    ) -> Result<()> {
        self.inner
            .record_failure(list_id, cast_hash, kind, error_message, submitted)
            .await
    }

    async fn recent_failures(&self, list_id: &str, limit: u32) -> Result<Vec<FailedAction>> {
        self.inner.recent_failures(list_id, limit).await
    }

    async fn get_signer_account(&self, account_id: &str) -> Result<Option<SignerAccount>> {
        self.inner.get_signer_account(account_id).await
    }

    async fn upsert_signer_account(&self, account: &SignerAccount) -> Result<()> {
        self.inner.upsert_signer_account(account).await
    }
}

// ============================================================
// Helpers
// ============================================================

fn cast_hash(n: u8) -> String {
    format!("0x{}", format!("{n:02x}").repeat(20))
}

fn cast(n: u8, author: &str) -> CandidatePost {
    CandidatePost {
        hash: cast_hash(n),
        author_fid: author.to_string(),
        text: format!("cast number {n}"),
        ..Default::default()
    }
}

fn list(id: &str, fids: &[&str], action_type: ActionType) -> MonitoringList {
    MonitoringList {
        id: id.to_string(),
        name: format!("List {id}"),
        created_at: None,
        contents: AutoInteractionContent {
            tracked_account_ids: fids.iter().map(|f| f.to_string()).collect(),
            display_names: BTreeMap::new(),
            source_account_id: "acct-1".to_string(),
            action_type,
            only_top_level: false,
            filters: ContentFilters::default(),
            last_processed_hash: None,
            feed_source: FeedSource::SpecificUsers,
        },
    }
}

struct Harness {
    db: Arc<dyn Database>,
    feed: Arc<FakeFeed>,
    relay: Arc<FakeRelay>,
    processor: ListProcessor,
}

async fn harness(posts: Vec<CandidatePost>, with_signer: bool) -> Harness {
    let db = db::open_in_memory().unwrap();
    if with_signer {
        db.upsert_signer_account(&SignerAccount {
            id: "acct-1".to_string(),
            platform_account_id: ACTOR_FID.to_string(),
            private_key: "07".repeat(32),
        })
        .await
        .unwrap();
    }

    let feed = FakeFeed::new(posts);
    let relay = FakeRelay::new();
    let processor = processor_over(Arc::clone(&db), &feed, &relay);

    Harness {
        db,
        feed,
        relay,
        processor,
    }
}

fn processor_over(db: Arc<dyn Database>, feed: &Arc<FakeFeed>, relay: &Arc<FakeRelay>) -> ListProcessor {
    let submitter = ActionSubmitter::new(
        vec![Arc::clone(relay) as Arc<dyn RelayEndpoint>],
        FarcasterNetwork::Mainnet,
        Duration::from_secs(2),
    );
    ListProcessor::new(
        Arc::clone(&db),
        Arc::clone(feed) as Arc<dyn ContentSource>,
        Arc::new(DatabaseKeyProvider::new(db)),
        submitter,
    )
}

/// A processor whose ledger goes through `FlakyLedger` over the harness store.
fn flaky_processor(h: &Harness, forget_acted: bool, fail_writes: bool) -> ListProcessor {
    let flaky: Arc<dyn Database> = Arc::new(FlakyLedger {
        inner: Arc::clone(&h.db),
        forget_acted,
        fail_writes,
    });
    processor_over(flaky, &h.feed, &h.relay)
}

async fn stored_cursor(db: &Arc<dyn Database>, list_id: &str) -> Option<String> {
    db.get_list(list_id)
        .await
        .unwrap()
        .and_then(|l| l.contents.last_processed_hash)
}

// ============================================================
// Idempotency and cursor
// ============================================================

#[tokio::test]
async fn repeated_runs_never_duplicate_actions() {
    let h = harness(vec![cast(2, "5650"), cast(1, "5650")], true).await;
    let l = list("a", &["5650"], ActionType::Both);
    h.db.upsert_list(&l).await.unwrap();

    let first = h.processor.process(&l).await.unwrap();
    assert_eq!(first.fetched, 2);
    assert_eq!(first.succeeded, 4);
    assert_eq!(h.relay.calls(), 4);
    assert_eq!(first.cursor_advanced_to.as_deref(), Some(cast_hash(2).as_str()));
    assert_eq!(stored_cursor(&h.db, "a").await, Some(cast_hash(2)));

    // Nothing new: the cursor cuts the feed down to nothing
    let second = h.processor.process(&l).await.unwrap();
    assert_eq!(second.fetched, 0);
    assert_eq!(h.relay.calls(), 4);
    assert_eq!(stored_cursor(&h.db, "a").await, Some(cast_hash(2)));

    // One new cast: only it is acted on
    h.feed.publish(cast(3, "5650"));
    let third = h.processor.process(&l).await.unwrap();
    assert_eq!(third.fetched, 1);
    assert_eq!(third.succeeded, 2);
    assert_eq!(h.relay.calls(), 6);
    assert_eq!(h.db.action_count().await.unwrap(), 6);
    assert_eq!(stored_cursor(&h.db, "a").await, Some(cast_hash(3)));
}

#[tokio::test]
async fn ledger_suppresses_repeats_when_the_cursor_is_lost() {
    let h = harness(vec![cast(2, "5650"), cast(1, "5650")], true).await;
    let l = list("a", &["5650"], ActionType::Like);
    h.db.upsert_list(&l).await.unwrap();

    h.processor.process(&l).await.unwrap();
    assert_eq!(h.relay.calls(), 2);

    // Reset the list as if the cursor was never saved
    h.db.upsert_list(&l).await.unwrap();

    let again = h.processor.process(&l).await.unwrap();
    assert_eq!(again.fetched, 2);
    assert_eq!(again.already_done, 2);
    assert_eq!(again.attempted, 0);
    assert_eq!(h.relay.calls(), 2);
    // Nothing new was ledgered, so the cursor is left alone
    assert!(again.cursor_advanced_to.is_none());
    assert_eq!(stored_cursor(&h.db, "a").await, None);
}

#[tokio::test]
async fn both_records_like_and_recast_separately() {
    let h = harness(vec![cast(1, "5650")], true).await;
    let l = list("a", &["5650"], ActionType::Both);
    h.db.upsert_list(&l).await.unwrap();

    h.processor.process(&l).await.unwrap();

    let hash = cast_hash(1);
    assert!(h.db.has_acted("a", &hash, ActionKind::Like).await.unwrap());
    assert!(h.db.has_acted("a", &hash, ActionKind::Recast).await.unwrap());
    assert!(!h.db.has_acted("other", &hash, ActionKind::Like).await.unwrap());
}

// ============================================================
// Failures
// ============================================================

#[tokio::test]
async fn exhausted_relays_leave_no_record_and_no_cursor() {
    let h = harness(vec![cast(2, "5650"), cast(1, "5650")], true).await;
    let l = list("a", &["5650"], ActionType::Like);
    h.db.upsert_list(&l).await.unwrap();
    h.relay.accept.store(false, Ordering::SeqCst);

    let report = h.processor.process(&l).await.unwrap();
    assert_eq!(report.attempted, 2);
    assert_eq!(report.failed, 2);
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures[0].reason.contains("invalid signer"));
    assert_eq!(h.db.action_count().await.unwrap(), 0);
    assert_eq!(stored_cursor(&h.db, "a").await, None);
    assert_eq!(h.db.recent_failures("a", 10).await.unwrap().len(), 2);

    // The next run picks the same casts up again
    h.relay.accept.store(true, Ordering::SeqCst);
    let retry = h.processor.process(&l).await.unwrap();
    assert_eq!(retry.succeeded, 2);
    assert_eq!(stored_cursor(&h.db, "a").await, Some(cast_hash(2)));
}

#[tokio::test]
async fn concurrent_record_counts_as_ledgered() {
    let h = harness(vec![cast(1, "5650")], true).await;
    let l = list("a", &["5650"], ActionType::Like);
    h.db.upsert_list(&l).await.unwrap();
    // Another run records the action between our ledger check and our write
    h.db.insert_action("a", &cast_hash(1), ActionKind::Like)
        .await
        .unwrap();
    let processor = flaky_processor(&h, true, false);

    let report = processor.process(&l).await.unwrap();
    assert_eq!(report.attempted, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 0);
    assert!(report.failures.is_empty());
    assert_eq!(h.db.action_count().await.unwrap(), 1);
    assert_eq!(stored_cursor(&h.db, "a").await, Some(cast_hash(1)));
}

#[tokio::test]
async fn submitted_but_unrecorded_action_is_never_resent() {
    let h = harness(vec![cast(1, "5650")], true).await;
    let l = list("a", &["5650"], ActionType::Like);
    h.db.upsert_list(&l).await.unwrap();
    let processor = flaky_processor(&h, false, true);

    let report = processor.process(&l).await.unwrap();
    assert_eq!(h.relay.calls(), 1);
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failed, 1);
    assert!(report.failures[0].reason.contains("submitted but not recorded"));
    assert_eq!(h.db.action_count().await.unwrap(), 0);
    assert_eq!(stored_cursor(&h.db, "a").await, None);

    let failures = h.db.recent_failures("a", 10).await.unwrap();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].submitted);

    // The cursor never moved, so the cast comes back, but the hub already has it
    let again = processor.process(&l).await.unwrap();
    assert_eq!(again.fetched, 1);
    assert_eq!(again.already_done, 1);
    assert_eq!(again.attempted, 0);
    assert_eq!(h.relay.calls(), 1);
}

#[tokio::test]
async fn missing_signer_aborts_before_fetching() {
    let h = harness(vec![cast(1, "5650")], false).await;
    let l = list("a", &["5650"], ActionType::Like);
    h.db.upsert_list(&l).await.unwrap();

    let err = h.processor.process(&l).await.unwrap_err();
    assert!(matches!(err, ListError::KeyResolution { .. }));
    assert_eq!(h.relay.calls(), 0);
    assert_eq!(stored_cursor(&h.db, "a").await, None);
}

#[tokio::test]
async fn fetch_failure_leaves_cursor_untouched() {
    let h = harness(vec![cast(1, "5650")], true).await;
    let mut l = list("a", &[BROKEN_FID], ActionType::Like);
    l.contents.last_processed_hash = Some(cast_hash(9));
    h.db.upsert_list(&l).await.unwrap();

    let err = h.processor.process(&l).await.unwrap_err();
    assert!(matches!(err, ListError::Fetch(_)));
    assert_eq!(stored_cursor(&h.db, "a").await, Some(cast_hash(9)));
}

// ============================================================
// Skips and filtering
// ============================================================

#[tokio::test]
async fn deleted_list_is_a_noop() {
    let h = harness(vec![cast(1, "5650")], true).await;
    // Loaded by the batch, then deleted before processing
    let l = list("gone", &["5650"], ActionType::Like);

    let report = h.processor.process(&l).await.unwrap();
    assert_eq!(report.skipped, Some(SkipReason::Deleted));
    assert_eq!(h.relay.calls(), 0);
}

#[tokio::test]
async fn list_without_tracked_accounts_is_skipped() {
    let h = harness(vec![cast(1, "5650")], true).await;
    let l = list("empty", &[], ActionType::Like);
    h.db.upsert_list(&l).await.unwrap();

    let report = h.processor.process(&l).await.unwrap();
    assert_eq!(report.skipped, Some(SkipReason::NoTrackedAccounts));
    assert_eq!(h.relay.calls(), 0);
}

#[tokio::test]
async fn filtered_and_own_casts_are_not_acted_on() {
    let mut reply = cast(3, "5650");
    reply.parent_hash = Some(cast_hash(9));
    let own = cast(2, ACTOR_FID);
    let h = harness(vec![reply, own, cast(1, "5650")], true).await;

    let mut l = list("a", &["5650", ACTOR_FID], ActionType::Like);
    l.contents.only_top_level = true;
    h.db.upsert_list(&l).await.unwrap();

    let report = h.processor.process(&l).await.unwrap();
    assert_eq!(report.fetched, 3);
    assert_eq!(report.filtered_out, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(h.relay.calls(), 1);
    // The cursor still moves to the newest fetched cast
    assert_eq!(stored_cursor(&h.db, "a").await, Some(cast_hash(3)));
}

// ============================================================
// Batch
// ============================================================

#[tokio::test]
async fn batch_isolates_a_failing_list() {
    let h = harness(vec![cast(1, "5650")], true).await;
    h.db
        .upsert_list(&list("broken", &[BROKEN_FID], ActionType::Like))
        .await
        .unwrap();
    h.db
        .upsert_list(&list("healthy", &["5650"], ActionType::Like))
        .await
        .unwrap();

    let report = batch::run(&h.processor, 1, false).await.unwrap();
    assert_eq!(report.lists_attempted, 2);
    assert_eq!(report.lists_with_actions, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].list_id, "broken");
    assert!(report.errors[0].error.contains("500"));
    assert_eq!(report.reports.len(), 1);
    assert_eq!(report.reports[0].list_id, "healthy");
    assert_eq!(report.actions_succeeded(), 1);
}

#[tokio::test]
async fn batch_contains_a_panicking_list() {
    let h = harness(vec![cast(1, "5650")], true).await;
    h.db
        .upsert_list(&list("explodes", &[PANICKING_FID], ActionType::Like))
        .await
        .unwrap();
    h.db
        .upsert_list(&list("healthy", &["5650"], ActionType::Like))
        .await
        .unwrap();

    let report = batch::run(&h.processor, 1, false).await.unwrap();
    assert_eq!(report.lists_attempted, 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].list_id, "explodes");
    assert!(report.errors[0].error.contains("panicked"));
    assert!(report.errors[0].error.contains("could not be decoded"));
    assert_eq!(report.reports.len(), 1);
    assert_eq!(report.reports[0].list_id, "healthy");
    assert_eq!(report.actions_succeeded(), 1);
    assert_eq!(stored_cursor(&h.db, "healthy").await, Some(cast_hash(1)));
}

#[tokio::test]
async fn concurrent_batch_matches_sequential_results() {
    let h = harness(vec![cast(2, "5650"), cast(1, "7777")], true).await;
    for (id, fid) in [("one", "5650"), ("two", "7777"), ("three", "5650")] {
        h.db
            .upsert_list(&list(id, &[fid], ActionType::Like))
            .await
            .unwrap();
    }

    let report = batch::run(&h.processor, 3, false).await.unwrap();
    assert_eq!(report.lists_attempted, 3);
    assert_eq!(report.lists_with_actions, 3);
    assert!(report.errors.is_empty());
    // Same cast on two lists is two separate ledger rows
    assert_eq!(h.db.action_count().await.unwrap(), 3);
    assert_eq!(h.relay.calls(), 3);
}

#[tokio::test]
async fn empty_batch_reports_nothing() {
    let h = harness(vec![], true).await;
    let report = batch::run(&h.processor, 1, false).await.unwrap();
    assert_eq!(report.lists_attempted, 0);
    assert!(report.reports.is_empty());
    assert!(report.errors.is_empty());
}
