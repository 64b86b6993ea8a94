use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

pub const ADMIN_SEARCH_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy)]
pub struct DebounceConfig {
    pub delay: Duration,
    /// Propagate an empty value without waiting.
    pub flush_on_clear: bool,
}

impl DebounceConfig {
    pub fn new(delay: Duration) -> Self {
        DebounceConfig { delay, flush_on_clear: true }
    }
}

/// Producer side of a running debouncer. Dropping every handle stops the
/// task; a value still waiting out its delay is discarded.
#[derive(Clone)]
pub struct DebounceHandle {
    input: mpsc::UnboundedSender<String>,
}

impl DebounceHandle {
    pub fn on_change(&self, raw: impl Into<String>) {
        let _ = self.input.send(raw.into());
    }
}

pub struct Debouncer;

impl Debouncer {
    /// Starts a trailing-edge debouncer that forwards settled values to `out`.
    pub fn spawn(cfg: DebounceConfig, out: mpsc::Sender<String>) -> (DebounceHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(cfg, rx, out));
        (DebounceHandle { input: tx }, task)
    }
}

async fn run(cfg: DebounceConfig, mut input: mpsc::UnboundedReceiver<String>, out: mpsc::Sender<String>) {
    let mut pending: Option<(String, Instant)> = None;
    loop {
        let deadline = pending.as_ref().map(|(_, at)| *at);
        tokio::select! {
            next = input.recv() => match next {
                Some(value) if value.is_empty() && cfg.flush_on_clear => {
                    pending = None;
                    if out.send(value).await.is_err() { return; }
                }
                Some(value) => pending = Some((value, Instant::now() + cfg.delay)),
                None => return,
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some((value, _)) = pending.take() {
                    if out.send(value).await.is_err() { return; }
                }
            }
        }
    }
}
