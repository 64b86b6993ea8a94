use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::warn;

use crate::api::{ApiClient, ApiError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[async_trait]
pub trait CountSource: Send + Sync {
    async fn new_count(&self) -> Result<u64, ApiError>;
}

#[async_trait]
impl CountSource for ApiClient {
    async fn new_count(&self) -> Result<u64, ApiError> {
        ApiClient::new_count(self).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CountChange {
    Initial { count: u64 },
    Increased { from: u64, to: u64 },
    Decreased { from: u64, to: u64 },
}

/// Tracks the last seen new-listing count and reports changes only.
#[derive(Debug, Default)]
pub struct NewCountWatcher {
    last: Option<u64>,
}

impl NewCountWatcher {
    pub fn observe(&mut self, count: u64) -> Option<CountChange> {
        let change = match self.last {
            None => Some(CountChange::Initial { count }),
            Some(prev) if count > prev => Some(CountChange::Increased { from: prev, to: count }),
            Some(prev) if count < prev => Some(CountChange::Decreased { from: prev, to: count }),
            Some(_) => None,
        };
        self.last = Some(count);
        change
    }
}

/// Polls until the receiver goes away. A 401 ends polling with the error;
/// anything else is logged and the next tick tries again.
pub async fn poll<C: CountSource>(source: &C, every: Duration, events: mpsc::Sender<CountChange>) -> Result<(), ApiError> {
    let mut watcher = NewCountWatcher::default();
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match source.new_count().await {
            Ok(count) => {
                if let Some(change) = watcher.observe(count) {
                    if events.send(change).await.is_err() {
                        return Ok(());
                    }
                }
            }
            Err(e) if e.is_unauthorized() => return Err(e),
            Err(e) => warn!(error = %e, "new-count poll failed"),
        }
        if events.is_closed() {
            return Ok(());
        }
    }
}
