//! Incremental, offset-paginated business feed.
//!
//! [`FeedController`] is the only owner of feed state and the only caller of
//! the [`CollectionSource`]. Every operation is split in two: a synchronous
//! `start_*` that checks and sets the in-flight flag and hands out a
//! [`PageTicket`], and an async [`FeedController::complete`] that fetches and
//! applies the page. A ticket issued under an older generation (filter
//! changed, feed torn down) is discarded on arrival.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, warn};

use crate::api::types::BusinessRecord;
use crate::api::{ApiError, BusinessPage, CollectionSource, FeedFilter};

pub mod debounce;
pub mod driver;
pub mod trigger;

pub use driver::{FeedIntent, FeedUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    Idle,
    LoadingInitial,
    Ready,
    LoadingMore,
    Exhausted,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketKind {
    Initial,
    More,
}

/// Permission to run exactly one fetch against the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTicket {
    pub generation: u64,
    pub kind: TicketKind,
    pub filter: FeedFilter,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    Loaded { received: usize, len: usize, status: FeedStatus },
    /// The operation was not allowed in the current state.
    Ignored,
    /// The response belonged to a superseded generation and was dropped.
    Stale,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedSnapshot {
    pub status: FeedStatus,
    pub filter: FeedFilter,
    pub items: Vec<BusinessRecord>,
    pub total: Option<u64>,
    pub next_page: u32,
    pub in_flight: bool,
    pub exhausted: bool,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct FeedState {
    items: Vec<BusinessRecord>,
    total: Option<u64>,
    next_page: u32,
    in_flight: bool,
    exhausted: bool,
    filter: FeedFilter,
    generation: u64,
    status: FeedStatus,
    last_error: Option<String>,
}

impl FeedState {
    fn new() -> Self {
        FeedState {
            items: Vec::new(),
            total: None,
            next_page: 0,
            in_flight: false,
            exhausted: false,
            filter: FeedFilter::default(),
            generation: 0,
            status: FeedStatus::Idle,
            last_error: None,
        }
    }

    // Full reset under a new generation; anything still in flight goes stale.
    fn reset(&mut self, filter: FeedFilter) {
        self.items.clear();
        self.total = None;
        self.next_page = 0;
        self.exhausted = false;
        self.filter = filter;
        self.generation += 1;
        self.in_flight = false;
        self.last_error = None;
        self.status = FeedStatus::Idle;
    }

    fn begin_initial(&mut self, filter: FeedFilter, page_size: u32) -> PageTicket {
        self.reset(filter);
        self.in_flight = true;
        self.status = FeedStatus::LoadingInitial;
        PageTicket {
            generation: self.generation,
            kind: TicketKind::Initial,
            filter: self.filter.clone(),
            limit: page_size,
            offset: 0,
        }
    }

    fn begin_more(&mut self, page_size: u32) -> Option<PageTicket> {
        if self.status != FeedStatus::Ready || self.in_flight {
            return None;
        }
        self.in_flight = true;
        self.status = FeedStatus::LoadingMore;
        Some(PageTicket {
            generation: self.generation,
            kind: TicketKind::More,
            filter: self.filter.clone(),
            limit: page_size,
            offset: self.next_page.saturating_mul(page_size),
        })
    }

    fn apply(&mut self, ticket: &PageTicket, result: Result<BusinessPage, ApiError>) -> Result<FeedOutcome, ApiError> {
        if ticket.generation != self.generation || !self.in_flight {
            debug!(generation = ticket.generation, current = self.generation, "dropping stale page");
            return Ok(FeedOutcome::Stale);
        }
        self.in_flight = false;

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                self.status = FeedStatus::Error;
                self.last_error = Some(e.message());
                return Err(e);
            }
        };

        let received = page.items.len();
        match ticket.kind {
            TicketKind::Initial => {
                self.items = page.items;
                self.total = Some(page.total);
                self.next_page = 1;
                self.exhausted = received < ticket.limit as usize;
            }
            TicketKind::More if received == 0 => {
                self.total = Some(page.total);
                self.exhausted = true;
            }
            TicketKind::More => {
                let overlap = overlapping_ids(&self.items, &page.items);
                if overlap > 0 {
                    warn!(overlap, offset = ticket.offset, "page overlaps records already loaded");
                }
                self.items.extend(page.items);
                self.next_page += 1;
                self.total = Some(page.total);
                self.exhausted = received < ticket.limit as usize;
            }
        }
        self.last_error = None;
        self.status = if self.exhausted { FeedStatus::Exhausted } else { FeedStatus::Ready };
        debug!(received, len = self.items.len(), status = ?self.status, "page applied");
        Ok(FeedOutcome::Loaded { received, len: self.items.len(), status: self.status })
    }

    fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            status: self.status,
            filter: self.filter.clone(),
            items: self.items.clone(),
            total: self.total,
            next_page: self.next_page,
            in_flight: self.in_flight,
            exhausted: self.exhausted,
            last_error: self.last_error.clone(),
        }
    }
}

// Offset windows can shift under concurrent inserts; overlap is reported,
// not corrected.
fn overlapping_ids(loaded: &[BusinessRecord], incoming: &[BusinessRecord]) -> usize {
    let seen: HashSet<&str> = loaded.iter().map(|r| r.id.as_str()).collect();
    incoming.iter().filter(|r| seen.contains(r.id.as_str())).count()
}

pub struct FeedController<S> {
    source: S,
    page_size: u32,
    state: Mutex<FeedState>,
}

impl<S: CollectionSource> FeedController<S> {
    pub fn new(source: S, page_size: u32) -> Self {
        FeedController { source, page_size: page_size.max(1), state: Mutex::new(FeedState::new()) }
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().expect("feed state mutex poisoned")
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.lock().snapshot()
    }

    pub fn status(&self) -> FeedStatus {
        self.lock().status
    }

    pub fn start_initialize(&self, filter: FeedFilter) -> PageTicket {
        self.lock().begin_initial(filter, self.page_size)
    }

    pub fn start_more(&self) -> Option<PageTicket> {
        self.lock().begin_more(self.page_size)
    }

    /// Retry after a failure: reload from scratch when nothing was loaded,
    /// otherwise fetch the page that failed.
    pub fn start_retry(&self) -> Option<PageTicket> {
        let mut st = self.lock();
        if st.status != FeedStatus::Error {
            return None;
        }
        if st.items.is_empty() {
            let filter = st.filter.clone();
            return Some(st.begin_initial(filter, self.page_size));
        }
        st.status = FeedStatus::Ready;
        st.begin_more(self.page_size)
    }

    pub async fn complete(&self, ticket: PageTicket) -> Result<FeedOutcome, ApiError> {
        let result = self.source.fetch_page(&ticket.filter, ticket.limit, ticket.offset).await;
        self.lock().apply(&ticket, result)
    }

    pub async fn initialize(&self, filter: FeedFilter) -> Result<FeedOutcome, ApiError> {
        let ticket = self.start_initialize(filter);
        self.complete(ticket).await
    }

    /// No-op unless the feed is `Ready`.
    pub async fn request_more(&self) -> Result<FeedOutcome, ApiError> {
        let ticket = self.start_more();
        match ticket {
            Some(t) => self.complete(t).await,
            None => Ok(FeedOutcome::Ignored),
        }
    }

    /// Full reset under `filter`; nothing from the previous filter is reused.
    pub async fn change_filter(&self, filter: FeedFilter) -> Result<FeedOutcome, ApiError> {
        self.initialize(filter).await
    }

    pub async fn retry(&self) -> Result<FeedOutcome, ApiError> {
        let ticket = self.start_retry();
        match ticket {
            Some(t) => self.complete(t).await,
            None => Ok(FeedOutcome::Ignored),
        }
    }

    /// Drops all state. A response still in flight will be ignored.
    pub fn teardown(&self) {
        self.lock().reset(FeedFilter::default());
    }
}


#[cfg(test)]
mod tests {
    use super::gated::GatedSource;
    use super::*;
    use crate::api::mock::{page, MockSource};
    use reqwest::StatusCode;

    fn server_error() -> ApiError {
        ApiError::Status { status: StatusCode::INTERNAL_SERVER_ERROR, message: Some("Database connection failed".into()), fallback: "Failed to fetch businesses" }
    }

    fn ids(snap: &FeedSnapshot) -> Vec<String> {
        snap.items.iter().map(|r| r.id.clone()).collect()
    }

    #[tokio::test]
    async fn pages_until_short_page_then_exhausted() {
        let src = MockSource::new();
        src.push_response(Ok(page("b", 0, 12, 40)));
        src.push_response(Ok(page("b", 12, 12, 40)));
        src.push_response(Ok(page("b", 24, 12, 40)));
        src.push_response(Ok(page("b", 36, 4, 40)));
        let feed = FeedController::new(src, 12);

        let out = feed.initialize(FeedFilter::default()).await.unwrap();
        assert_eq!(out, FeedOutcome::Loaded { received: 12, len: 12, status: FeedStatus::Ready });
        let snap = feed.snapshot();
        assert_eq!(snap.next_page, 1);
        assert_eq!(snap.total, Some(40));

        feed.request_more().await.unwrap();
        assert_eq!((feed.snapshot().items.len(), feed.status()), (24, FeedStatus::Ready));
        feed.request_more().await.unwrap();
        assert_eq!((feed.snapshot().items.len(), feed.status()), (36, FeedStatus::Ready));
        feed.request_more().await.unwrap();
        assert_eq!((feed.snapshot().items.len(), feed.status()), (40, FeedStatus::Exhausted));

        assert_eq!(feed.request_more().await.unwrap(), FeedOutcome::Ignored);
        assert_eq!(feed.snapshot().items.len(), 40);

        let offsets: Vec<u32> = feed.source.calls().iter().map(|c| c.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24, 36]);
        assert!(feed.source.calls().iter().all(|c| c.limit == 12));

        let snap = feed.snapshot();
        let unique: HashSet<&str> = snap.items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(unique.len(), snap.items.len());
        assert_eq!(snap.items[0].id, "b-0");
        assert_eq!(snap.items[39].id, "b-39");
    }

    #[tokio::test]
    async fn empty_follow_up_page_exhausts_without_advancing() {
        let src = MockSource::new();
        src.push_response(Ok(page("b", 0, 3, 3)));
        src.push_response(Ok(page("b", 0, 0, 3)));
        let feed = FeedController::new(src, 3);

        feed.initialize(FeedFilter::default()).await.unwrap();
        assert_eq!(feed.status(), FeedStatus::Ready);
        let out = feed.request_more().await.unwrap();
        assert_eq!(out, FeedOutcome::Loaded { received: 0, len: 3, status: FeedStatus::Exhausted });
        let snap = feed.snapshot();
        assert_eq!(snap.next_page, 1);
        assert!(snap.exhausted);
    }

    #[tokio::test]
    async fn short_first_page_is_exhausted_immediately() {
        let src = MockSource::new();
        src.push_response(Ok(page("b", 0, 5, 5)));
        let feed = FeedController::new(src, 12);
        feed.initialize(FeedFilter::default()).await.unwrap();
        assert_eq!(feed.status(), FeedStatus::Exhausted);
        assert_eq!(feed.request_more().await.unwrap(), FeedOutcome::Ignored);
        assert_eq!(feed.source.calls().len(), 1);
    }

    #[tokio::test]
    async fn request_more_outside_ready_leaves_state_untouched() {
        let src = MockSource::new();
        let feed = FeedController::new(src, 12);

        let before = feed.snapshot();
        assert_eq!(before.status, FeedStatus::Idle);
        for _ in 0..3 {
            assert_eq!(feed.request_more().await.unwrap(), FeedOutcome::Ignored);
        }
        let after = feed.snapshot();
        assert_eq!(after.status, before.status);
        assert_eq!(after.next_page, before.next_page);
        assert!(after.items.is_empty());
        assert!(feed.source.calls().is_empty());
    }

    #[tokio::test]
    async fn trigger_while_loading_is_a_no_op() {
        let src = GatedSource::default();
        src.push_open(Ok(page("b", 0, 2, 10)));
        let open = src.push_gated(Ok(page("b", 2, 2, 10)));
        let feed = FeedController::new(src, 2);
        feed.initialize(FeedFilter::default()).await.unwrap();

        let (first, _) = tokio::join!(feed.request_more(), async {
            tokio::task::yield_now().await;
            let snap = feed.snapshot();
            assert_eq!(snap.status, FeedStatus::LoadingMore);
            assert!(snap.in_flight);
            assert_eq!(feed.request_more().await.unwrap(), FeedOutcome::Ignored);
            assert_eq!(feed.request_more().await.unwrap(), FeedOutcome::Ignored);
            open.send(()).unwrap();
        });

        assert_eq!(first.unwrap(), FeedOutcome::Loaded { received: 2, len: 4, status: FeedStatus::Ready });
        assert_eq!(feed.source.calls().len(), 2);
    }

    #[tokio::test]
    async fn response_after_filter_change_is_discarded() {
        let src = GatedSource::default();
        src.push_open(Ok(page("old", 0, 2, 10)));
        let open = src.push_gated(Ok(page("old", 2, 2, 10)));
        src.push_open(Ok(page("new", 0, 1, 1)));
        let feed = FeedController::new(src, 2);
        feed.initialize(FeedFilter::new(Some("ma".into()), None)).await.unwrap();

        let new_filter = FeedFilter::new(Some("mar".into()), None);
        let (late, changed) = tokio::join!(feed.request_more(), async {
            tokio::task::yield_now().await;
            assert!(feed.snapshot().in_flight);
            let out = feed.change_filter(new_filter.clone()).await;
            open.send(()).unwrap();
            out
        });

        assert_eq!(changed.unwrap(), FeedOutcome::Loaded { received: 1, len: 1, status: FeedStatus::Exhausted });
        assert_eq!(late.unwrap(), FeedOutcome::Stale);
        let snap = feed.snapshot();
        assert_eq!(ids(&snap), vec!["new-0"]);
        assert_eq!(snap.filter, new_filter);
        assert_eq!(snap.total, Some(1));

        let calls = feed.source.calls();
        assert_eq!(calls[2].offset, 0);
        assert_eq!(calls[2].filter.query.as_deref(), Some("mar"));
    }

    #[tokio::test]
    async fn teardown_ignores_late_response() {
        let src = GatedSource::default();
        let open = src.push_gated(Ok(page("b", 0, 2, 10)));
        let feed = FeedController::new(src, 2);

        let (late, _) = tokio::join!(feed.initialize(FeedFilter::default()), async {
            tokio::task::yield_now().await;
            feed.teardown();
            open.send(()).unwrap();
        });
        assert_eq!(late.unwrap(), FeedOutcome::Stale);
        let snap = feed.snapshot();
        assert_eq!(snap.status, FeedStatus::Idle);
        assert!(snap.items.is_empty());
        assert!(!snap.in_flight);
    }

    #[tokio::test]
    async fn filter_change_resets_to_first_page_of_new_filter() {
        let src = MockSource::new();
        src.push_response(Ok(page("all", 0, 3, 30)));
        src.push_response(Ok(page("all", 3, 3, 30)));
        src.push_response(Ok(page("food", 0, 3, 7)));
        let feed = FeedController::new(src, 3);

        feed.initialize(FeedFilter::default()).await.unwrap();
        feed.request_more().await.unwrap();
        assert_eq!(feed.snapshot().items.len(), 6);

        let food = FeedFilter::new(None, Some("Food & Drink".into()));
        feed.change_filter(food.clone()).await.unwrap();
        let snap = feed.snapshot();
        assert_eq!(ids(&snap), vec!["food-0", "food-1", "food-2"]);
        assert_eq!(snap.total, Some(7));
        assert_eq!(snap.next_page, 1);
        assert_eq!(snap.status, FeedStatus::Ready);

        let last = feed.source.calls().pop().unwrap();
        assert_eq!(last.offset, 0);
        assert_eq!(last.filter, food);
    }

    #[tokio::test]
    async fn reapplying_the_same_filter_reproduces_the_first_page() {
        let src = MockSource::new();
        src.push_response(Ok(page("b", 0, 4, 9)));
        src.push_response(Ok(page("b", 4, 4, 9)));
        src.push_response(Ok(page("b", 0, 4, 9)));
        let feed = FeedController::new(src, 4);
        let filter = FeedFilter::new(Some("shop".into()), None);

        feed.initialize(filter.clone()).await.unwrap();
        let first = ids(&feed.snapshot());
        feed.request_more().await.unwrap();
        feed.change_filter(filter).await.unwrap();
        assert_eq!(ids(&feed.snapshot()), first);
    }

    #[tokio::test]
    async fn failed_initial_load_leaves_feed_empty_and_retry_reloads() {
        let src = MockSource::new();
        src.push_response(Err(server_error()));
        src.push_response(Ok(page("b", 0, 2, 2)));
        let feed = FeedController::new(src, 2);
        let filter = FeedFilter::new(None, Some("Retail".into()));

        let err = feed.initialize(filter.clone()).await.unwrap_err();
        assert_eq!(err.message(), "Database connection failed");
        let snap = feed.snapshot();
        assert_eq!(snap.status, FeedStatus::Error);
        assert!(snap.items.is_empty());
        assert_eq!(snap.last_error.as_deref(), Some("Database connection failed"));
        assert_eq!(feed.request_more().await.unwrap(), FeedOutcome::Ignored);

        feed.retry().await.unwrap();
        let snap = feed.snapshot();
        assert_eq!(snap.items.len(), 2);
        assert!(snap.last_error.is_none());
        let calls = feed.source.calls();
        assert_eq!(calls[1].offset, 0);
        assert_eq!(calls[1].filter, filter);
    }

    #[tokio::test]
    async fn failed_follow_up_keeps_loaded_items_and_retry_resumes() {
        let src = MockSource::new();
        src.push_response(Ok(page("b", 0, 2, 6)));
        src.push_response(Err(ApiError::Timeout));
        src.push_response(Ok(page("b", 2, 2, 6)));
        let feed = FeedController::new(src, 2);

        feed.initialize(FeedFilter::default()).await.unwrap();
        assert!(feed.request_more().await.is_err());
        let snap = feed.snapshot();
        assert_eq!(snap.status, FeedStatus::Error);
        assert_eq!(ids(&snap), vec!["b-0", "b-1"]);
        assert_eq!(snap.next_page, 1);

        assert_eq!(feed.request_more().await.unwrap(), FeedOutcome::Ignored);
        let out = feed.retry().await.unwrap();
        assert_eq!(out, FeedOutcome::Loaded { received: 2, len: 4, status: FeedStatus::Ready });
        assert_eq!(feed.source.calls()[2].offset, 2);
    }

    #[tokio::test]
    async fn retry_outside_error_is_ignored() {
        let src = MockSource::new();
        src.push_response(Ok(page("b", 0, 2, 6)));
        let feed = FeedController::new(src, 2);
        assert_eq!(feed.retry().await.unwrap(), FeedOutcome::Ignored);
        feed.initialize(FeedFilter::default()).await.unwrap();
        assert_eq!(feed.retry().await.unwrap(), FeedOutcome::Ignored);
        assert_eq!(feed.source.calls().len(), 1);
    }

    #[tokio::test]
    async fn offset_drift_duplicates_are_kept_in_arrival_order() {
        let src = MockSource::new();
        src.push_response(Ok(page("b", 0, 3, 10)));
        src.push_response(Ok(page("b", 2, 3, 11)));
        let feed = FeedController::new(src, 3);

        feed.initialize(FeedFilter::default()).await.unwrap();
        feed.request_more().await.unwrap();
        let snap = feed.snapshot();
        assert_eq!(ids(&snap), vec!["b-0", "b-1", "b-2", "b-2", "b-3", "b-4"]);
        assert_eq!(snap.total, Some(11));
    }
}
