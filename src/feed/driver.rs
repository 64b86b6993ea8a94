use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::api::{ApiError, CollectionSource, FeedFilter};

use super::{FeedController, FeedOutcome, FeedSnapshot, PageTicket};

/// Requests produced by the view side (scroll trigger, search box, user).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedIntent {
    More,
    Filter(FeedFilter),
    Retry,
}

/// What the view gets back after a page lands or fails.
#[derive(Debug, Clone)]
pub enum FeedUpdate {
    Changed(FeedSnapshot),
    Failed { message: String, snapshot: FeedSnapshot },
}

/// Consumes intents until the channel closes.
///
/// The check-and-set half of each operation runs here, in intent order; only
/// the fetch is spawned. So a `More` arriving while a page is loading is
/// dropped by the in-flight guard instead of queueing, and a `Filter`
/// supersedes whatever is in flight.
pub async fn drive<S>(
    feed: Arc<FeedController<S>>,
    mut intents: mpsc::Receiver<FeedIntent>,
    updates: mpsc::UnboundedSender<FeedUpdate>,
) where
    S: CollectionSource + 'static,
{
    let mut tasks = JoinSet::new();
    loop {
        tokio::select! {
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "feed fetch task failed");
                }
            }
            next = intents.recv() => {
                let Some(intent) = next else { break };
                let Some(ticket) = start(&feed, &intent) else {
                    debug!(?intent, status = ?feed.status(), "intent ignored");
                    continue;
                };
                let feed = feed.clone();
                let updates = updates.clone();
                tasks.spawn(async move {
                    let res = feed.complete(ticket).await;
                    report(&feed, res, &updates);
                });
            }
        }
    }
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "feed fetch task failed");
        }
    }
}

fn start<S: CollectionSource>(feed: &FeedController<S>, intent: &FeedIntent) -> Option<PageTicket> {
    match intent {
        FeedIntent::More => feed.start_more(),
        FeedIntent::Filter(f) => Some(feed.start_initialize(f.clone())),
        FeedIntent::Retry => feed.start_retry(),
    }
}

fn report<S: CollectionSource>(
    feed: &FeedController<S>,
    res: Result<FeedOutcome, ApiError>,
    updates: &mpsc::UnboundedSender<FeedUpdate>,
) {
    let update = match res {
        Ok(FeedOutcome::Loaded { received, len, status }) => {
            debug!(received, len, ?status, "page landed");
            FeedUpdate::Changed(feed.snapshot())
        }
        Ok(FeedOutcome::Ignored) | Ok(FeedOutcome::Stale) => return,
        Err(e) => {
            warn!(error = %e, retryable = e.is_retryable(), "feed fetch failed");
            FeedUpdate::Failed { message: e.message(), snapshot: feed.snapshot() }
        }
    };
    let _ = updates.send(update);
}
