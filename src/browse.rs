use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::api::types::BusinessRecord;
use crate::api::{ApiClient, FeedFilter};
use crate::feed::debounce::{DebounceConfig, Debouncer, ADMIN_SEARCH_DELAY};
use crate::feed::trigger::{ScrollPosition, ScrollTrigger, DEFAULT_THRESHOLD_PX};
use crate::feed::{driver, FeedController, FeedIntent, FeedSnapshot, FeedStatus, FeedUpdate};
use crate::output::types::Meta;
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::browse::{Browse, Phase as BrowsePhase};
use crate::telemetry::{self};

// Logical height of one rendered row.
const ROW_PX: f64 = 40.0;

/// biz browse
#[derive(Args)]
pub struct BrowseCmd {
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long, short)]
    pub query: Option<String>,
    /// Records per page (defaults to BIZ_PAGE_SIZE or 12)
    #[arg(long)]
    pub page_size: Option<u32>,
    /// Load this many pages and exit instead of reading commands from stdin
    #[arg(long)]
    pub pages: Option<u32>,
    /// Rows per screen
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    /// Distance from the bottom, in px, that triggers the next page
    #[arg(long, default_value_t = DEFAULT_THRESHOLD_PX)]
    pub threshold: f64,
}

#[derive(Serialize)]
struct BrowseResult {
    filter: FeedFilter,
    status: FeedStatus,
    total: Option<u64>,
    loaded: usize,
    items: Vec<BusinessRecord>,
}

impl From<FeedSnapshot> for BrowseResult {
    fn from(s: FeedSnapshot) -> Self {
        BrowseResult { filter: s.filter, status: s.status, total: s.total, loaded: s.items.len(), items: s.items }
    }
}

pub async fn run(api: ApiClient, args: BrowseCmd) -> Result<()> {
    let log = telemetry::browse();
    let _g = log.root_span_kv([
        ("category", format!("{:?}", args.category)),
        ("query", format!("{:?}", args.query)),
        ("pages", format!("{:?}", args.pages)),
    ]).entered();

    let page_size = args.page_size.unwrap_or(api.config().page_size);
    let filter = FeedFilter::new(args.query.clone(), args.category.clone());
    match args.pages {
        Some(pages) => load_pages(api, page_size, filter, pages).await,
        None => interactive(api, page_size, filter, &args).await,
    }
}

async fn load_pages(api: ApiClient, page_size: u32, filter: FeedFilter, pages: u32) -> Result<()> {
    let log = telemetry::browse();
    let started = Instant::now();
    let meta = Meta::for_api(api.base()).with_page_size(page_size);
    let feed = FeedController::new(api, page_size);
    {
        let _s = log.span(&BrowsePhase::Initial).entered();
        if let Err(e) = feed.initialize(filter).await {
            log.failure(&e.message(), false);
            return Err(e.into());
        }
    }
    for _ in 1..pages {
        let _s = log.span(&BrowsePhase::More).entered();
        if feed.status() != FeedStatus::Ready { break; }
        if let Err(e) = feed.request_more().await {
            // keep what we have; the listing below is still valid
            log.failure(&e.message(), false);
            break;
        }
    }

    let snap = feed.snapshot();
    for (i, rec) in snap.items.iter().enumerate() { log.info(format_row(i + 1, rec)); }
    log.page(snap.items.len(), snap.total, snap.status);
    if telemetry::config::json_mode() {
        log.result_with(&BrowseResult::from(snap), meta.timed(started))?;
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Down,
    Up,
    Search(String),
    Category(Option<String>),
    Retry,
    Quit,
    Help,
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    let line = line.trim_end_matches(['\r', '\n']);
    if let Some(term) = line.strip_prefix('/') {
        return Command::Search(term.to_string());
    }
    let trimmed = line.trim();
    match trimmed {
        "" | "j" => Command::Down,
        "k" => Command::Up,
        "r" => Command::Retry,
        "q" => Command::Quit,
        "?" | "h" => Command::Help,
        "c" => Command::Category(None),
        _ => match trimmed.strip_prefix("c ") {
            Some(name) if !name.trim().is_empty() => Command::Category(Some(name.trim().to_string())),
            _ => Command::Unknown(trimmed.to_string()),
        },
    }
}

fn format_row(n: usize, rec: &BusinessRecord) -> String {
    let star = if rec.featured { " ★" } else { "" };
    let mut row = format!("[{n}] {}{star} — {}", rec.name, rec.category);
    if !rec.location.is_empty() { row.push_str(&format!(" · {}", rec.location)); }
    if let Some(tel) = rec.tel.as_deref().filter(|t| !t.is_empty()) { row.push_str(&format!(" · {tel}")); }
    row
}

/// Scroll state of the terminal "page": `cursor` rows have been shown.
struct Viewport {
    rows: usize,
    cursor: usize,
}

impl Viewport {
    fn position(&self, len: usize) -> ScrollPosition {
        let top = self.cursor.saturating_sub(self.rows);
        ScrollPosition {
            scroll_top: top as f64 * ROW_PX,
            scroll_height: len.max(self.cursor) as f64 * ROW_PX,
            client_height: self.rows as f64 * ROW_PX,
        }
    }

    /// Next screen of rows, advancing the cursor.
    fn down(&mut self, len: usize) -> Range<usize> {
        let start = self.cursor.min(len);
        let end = (start + self.rows).min(len);
        self.cursor = end;
        start..end
    }

    fn up(&mut self, len: usize) -> Range<usize> {
        let end = self.cursor.saturating_sub(self.rows).max(self.rows.min(len));
        self.cursor = end;
        end.saturating_sub(self.rows)..end
    }
}

/// What one input or update puts on the terminal.
#[derive(Debug, Default, PartialEq)]
struct Screen {
    header: Option<String>,
    rows: Vec<String>,
    status: Option<(usize, Option<u64>, FeedStatus)>,
    failure: Option<String>,
    more: bool,
}

/// View side of the feed: what is on screen, under which filter, and
/// where the viewport sits.
struct BrowseView {
    view: Viewport,
    trigger: ScrollTrigger,
    filter: FeedFilter,
    shown: Option<FeedSnapshot>,
}

impl BrowseView {
    fn new(rows: usize, threshold: f64, filter: FeedFilter) -> Self {
        BrowseView {
            view: Viewport { rows: rows.max(1), cursor: 0 },
            trigger: ScrollTrigger::new(threshold),
            filter,
            shown: None,
        }
    }

    fn len(&self) -> usize {
        self.shown.as_ref().map_or(0, |s| s.items.len())
    }

    /// Switches to `filter`. Rows of the previous filter are dropped right
    /// away, before the first page of the new one arrives.
    fn switch_filter(&mut self, filter: FeedFilter) -> FeedIntent {
        self.filter = filter.clone();
        self.shown = None;
        self.view.cursor = 0;
        self.trigger.rearm();
        FeedIntent::Filter(filter)
    }

    fn rows(&self, range: Range<usize>) -> Vec<String> {
        let Some(snap) = &self.shown else { return Vec::new() };
        range.filter_map(|i| snap.items.get(i).map(|rec| format_row(i + 1, rec))).collect()
    }

    fn down(&mut self) -> Screen {
        let len = self.len();
        let range = self.view.down(len);
        let more = self.trigger.observe(self.view.position(len));
        Screen { rows: self.rows(range), more, ..Default::default() }
    }

    fn up(&mut self) -> Screen {
        let len = self.len();
        let range = self.view.up(len);
        self.trigger.observe(self.view.position(len));
        Screen { rows: self.rows(range), ..Default::default() }
    }

    fn apply(&mut self, update: FeedUpdate) -> Screen {
        match update {
            // queued before the last filter switch
            FeedUpdate::Changed(snap) | FeedUpdate::Failed { snapshot: snap, .. } if snap.filter != self.filter => {
                Screen::default()
            }
            FeedUpdate::Changed(snap) => {
                let replaced = self.shown.as_ref().map_or(true, |prev| prev.items.is_empty() || snap.items.len() < self.view.cursor);
                let mut screen = Screen { status: Some((snap.items.len(), snap.total, snap.status)), ..Default::default() };
                self.shown = Some(snap);
                if replaced {
                    self.view.cursor = 0;
                    self.trigger.rearm();
                    screen.header = Some(format!("— results for {} —", describe(&self.filter)));
                    let range = self.view.down(self.len());
                    screen.rows = self.rows(range);
                }
                screen.more = self.trigger.observe(self.view.position(self.len()));
                screen
            }
            FeedUpdate::Failed { message, snapshot } => {
                let status = Some((snapshot.items.len(), snapshot.total, snapshot.status));
                self.shown = Some(snapshot);
                Screen { status, failure: Some(message), ..Default::default() }
            }
        }
    }
}

async fn interactive(api: ApiClient, page_size: u32, initial: FeedFilter, args: &BrowseCmd) -> Result<()> {
    let log = telemetry::browse();
    let feed = Arc::new(FeedController::new(api, page_size));
    let (intent_tx, intent_rx) = mpsc::channel::<FeedIntent>(16);
    let (update_tx, mut updates) = mpsc::unbounded_channel::<FeedUpdate>();
    let (query_tx, mut queries) = mpsc::channel::<String>(4);
    let driver = tokio::spawn(driver::drive(feed.clone(), intent_rx, update_tx));
    let (search, search_task) = Debouncer::spawn(DebounceConfig::new(ADMIN_SEARCH_DELAY), query_tx);

    let mut view = BrowseView::new(args.rows, args.threshold, initial.clone());
    log.info(HELP);
    intent_tx.send(view.switch_filter(initial)).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let screen = tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Command::Down => view.down(),
                    Command::Up => view.up(),
                    Command::Search(term) => {
                        let _s = log.span_kv(&BrowsePhase::Search, [("term", term.clone())]).entered();
                        search.on_change(term);
                        continue;
                    }
                    Command::Category(cat) => {
                        let next = view.filter.with_category(cat);
                        intent_tx.send(view.switch_filter(next)).await?;
                        continue;
                    }
                    Command::Retry => { intent_tx.send(FeedIntent::Retry).await?; continue; }
                    Command::Quit => break,
                    Command::Help => { log.info(HELP); continue; }
                    Command::Unknown(other) => { log.warn(format!("unknown command: {other}")); continue; }
                }
            }
            Some(term) = queries.recv() => {
                let query = if term.is_empty() { None } else { Some(term) };
                if query != view.filter.query {
                    let next = view.filter.with_query(query);
                    intent_tx.send(view.switch_filter(next)).await?;
                }
                continue;
            }
            Some(update) = updates.recv() => {
                let _s = log.span(&BrowsePhase::Render).entered();
                view.apply(update)
            }
            else => break,
        };
        show(&log, &screen);
        if screen.more { intent_tx.send(FeedIntent::More).await?; }
    }

    drop(search);
    drop(intent_tx);
    let _ = search_task.await;
    let snap = feed.snapshot();
    // a page still loading is not worth waiting for
    feed.teardown();
    driver.abort();
    let _ = driver.await;
    if telemetry::config::json_mode() {
        log.result(&BrowseResult::from(snap))?;
    }
    Ok(())
}

const HELP: &str = "j/enter: scroll down · k: up · /text: search · c NAME: category · r: retry · q: quit";

fn show(log: &LogCtx<Browse>, screen: &Screen) {
    if let Some(h) = &screen.header { log.info(h); }
    for row in &screen.rows { log.info(row); }
    if let Some((len, total, status)) = screen.status { log.page(len, total, status); }
    if let Some(msg) = &screen.failure { log.failure(msg, true); }
}

fn describe(filter: &FeedFilter) -> String {
    match (filter.query.as_deref(), filter.category.as_deref()) {
        (None, None) => "all businesses".to_string(),
        (Some(q), None) => format!("\"{q}\""),
        (None, Some(c)) => format!("category {c}"),
        (Some(q), Some(c)) => format!("\"{q}\" in {c}"),
    }
}
