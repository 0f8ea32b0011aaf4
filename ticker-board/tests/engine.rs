use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};
use ticker_board::{
    Band, BoardEngine, Direction, EngineConfig, EngineError, Exchange, Field, FetchError,
    PushEvent, SnapshotFetcher, SnapshotRequest, StaticCapabilities, SymbolRecord, ViewMode,
    ViewSelection, ViewState,
};
use tokio::{sync::broadcast, time::sleep};

type Snapshot = Result<Vec<SymbolRecord>, FetchError>;

/// In-memory [`SnapshotFetcher`] replaying scripted responses per exchange. The last scripted
/// response for an exchange repeats; unscripted exchanges answer with an empty board.
#[derive(Clone, Default)]
struct ScriptedFetcher {
    script: Arc<Mutex<Script>>,
}

#[derive(Default)]
struct Script {
    responses: HashMap<Exchange, VecDeque<Snapshot>>,
    delays: HashMap<Exchange, Duration>,
    calls: Vec<SnapshotRequest>,
}

impl ScriptedFetcher {
    fn respond(self, exchange: Exchange, responses: Vec<Snapshot>) -> Self {
        self.script
            .lock()
            .responses
            .insert(exchange, responses.into());
        self
    }

    fn delay(self, exchange: Exchange, delay: Duration) -> Self {
        self.script.lock().delays.insert(exchange, delay);
        self
    }

    fn calls(&self) -> Vec<SnapshotRequest> {
        self.script.lock().calls.clone()
    }

    fn call_count(&self) -> usize {
        self.script.lock().calls.len()
    }
}

#[async_trait]
impl SnapshotFetcher for ScriptedFetcher {
    async fn fetch_snapshot(&self, request: &SnapshotRequest) -> Snapshot {
        let (delay, response) = {
            let mut script = self.script.lock();
            script.calls.push(request.clone());

            let delay = script
                .delays
                .get(&request.exchange)
                .copied()
                .unwrap_or_default();
            let response = match script.responses.get_mut(&request.exchange) {
                Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
                Some(queue) => queue.front().cloned().unwrap_or(Ok(Vec::new())),
                None => Ok(Vec::new()),
            };
            (delay, response)
        };

        if !delay.is_zero() {
            sleep(delay).await;
        }
        response
    }
}

fn record(symbol: &str, match_price: f64) -> SymbolRecord {
    SymbolRecord::new(symbol)
        .with_bounds(10.0, 10.7, 9.3)
        .with(Field::MatchPrice, match_price)
        .with(Field::MatchVolume, 1200.0)
        .with(Field::BidPrice1, 9.9)
        .with(Field::BidVolume1, 5000.0)
        .with(Field::TotalVolume, 1_234_500.0)
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn start(fetcher: &ScriptedFetcher, selection: ViewSelection) -> BoardEngine {
    init_logging();
    BoardEngine::start(
        fetcher.clone(),
        Arc::new(StaticCapabilities::all()),
        EngineConfig::default().with_watchlist(["VNM", "FPT"]),
        selection,
    )
}

/// Let every ready task run without crossing any armed timer.
async fn settle() {
    sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn test_initial_load_is_ready_without_transitions() {
    let fetcher =
        ScriptedFetcher::default().respond(Exchange::Hose, vec![Ok(vec![record("AAA", 10.0)])]);
    let engine = start(&fetcher, ViewSelection::board(Exchange::Hose));

    assert_eq!(engine.view_model().state, ViewState::Loading);
    settle().await;

    let view = engine.view_model();
    assert_eq!(view.state, ViewState::Ready);
    assert!(view.updated_at.is_some());
    assert_eq!(fetcher.call_count(), 1);

    let row = &view.symbols["AAA"];
    assert_eq!(row.reference.as_str(), "10");
    assert_eq!(row.ceiling.as_str(), "10.7");
    assert_eq!(row.floor.as_str(), "9.3");

    let cell = row.field(Field::MatchPrice).unwrap();
    assert_eq!(cell.value.as_str(), "10");
    assert_eq!(cell.band, Band::AtReference);
    assert_eq!(row.field(Field::TotalVolume).unwrap().value.as_str(), "1,234,500");
    assert_eq!(row.field(Field::BidVolume1).unwrap().band, Band::BelowReference);

    // First sighting of every field is never animated
    assert!(row.fields.values().all(|cell| cell.transition.is_none()));
}

#[tokio::test(start_paused = true)]
async fn test_price_increase_animates_then_expires() {
    let fetcher = ScriptedFetcher::default().respond(
        Exchange::Hose,
        vec![Ok(vec![record("AAA", 10.0)]), Ok(vec![record("AAA", 10.2)])],
    );
    let engine = start(&fetcher, ViewSelection::board(Exchange::Hose));
    settle().await;

    engine
        .on_push_event(PushEvent::new("HOSE", "2024-05-02T02:15:00Z"))
        .unwrap();
    sleep(Duration::from_millis(1010)).await;

    let view = engine.view_model();
    let cell = view.symbols["AAA"].field(Field::MatchPrice).unwrap().clone();
    assert_eq!(fetcher.call_count(), 2);
    assert_eq!(cell.value.as_str(), "10.2");
    assert_eq!(cell.band, Band::AboveReference);
    assert_eq!(cell.transition, Some(Direction::Increase));

    // Untouched fields stay still
    let bid = view.symbols["AAA"].field(Field::BidPrice1).unwrap();
    assert_eq!(bid.transition, None);

    sleep(Duration::from_secs(1)).await;

    let cell = engine.view_model().symbols["AAA"]
        .field(Field::MatchPrice)
        .unwrap()
        .clone();
    assert_eq!(cell.transition, None);
    assert_eq!(cell.band, Band::AboveReference);
}

#[tokio::test(start_paused = true)]
async fn test_identical_snapshot_is_idempotent() {
    let fetcher =
        ScriptedFetcher::default().respond(Exchange::Hose, vec![Ok(vec![record("AAA", 10.3)])]);
    let engine = start(&fetcher, ViewSelection::board(Exchange::Hose));
    settle().await;
    let before = engine.view_model();

    engine.refresh().unwrap();
    settle().await;
    let after = engine.view_model();

    assert_eq!(fetcher.call_count(), 2);
    assert_eq!(before.symbols, after.symbols);
    assert!(
        after.symbols["AAA"]
            .fields
            .values()
            .all(|cell| cell.transition.is_none())
    );
}

#[tokio::test(start_paused = true)]
async fn test_band_tie_break_prefers_reference() {
    let record = SymbolRecord::new("TIE")
        .with_bounds(10.0, 10.0, 9.0)
        .with(Field::MatchPrice, 10.0)
        .with(Field::AskPrice1, 9.0);
    let fetcher = ScriptedFetcher::default().respond(Exchange::Hose, vec![Ok(vec![record])]);
    let engine = start(&fetcher, ViewSelection::board(Exchange::Hose));
    settle().await;

    let view = engine.view_model();
    let row = &view.symbols["TIE"];
    assert_eq!(row.field(Field::MatchPrice).unwrap().band, Band::AtReference);
    assert_eq!(row.field(Field::AskPrice1).unwrap().band, Band::AtFloor);
    assert_eq!(row.field(Field::BidPrice1).unwrap().band, Band::Unknown);
}

#[tokio::test(start_paused = true)]
async fn test_push_burst_is_debounced_into_one_fetch() {
    let fetcher =
        ScriptedFetcher::default().respond(Exchange::Hose, vec![Ok(vec![record("AAA", 10.0)])]);
    let engine = start(&fetcher, ViewSelection::board(Exchange::Hose));
    settle().await;
    assert_eq!(fetcher.call_count(), 1);

    for _ in 0..5 {
        engine.on_push_event(PushEvent::new("HOSE", "")).unwrap();
        sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(fetcher.call_count(), 1);

    // Quiet window restarts with every event: 250ms after the last one nothing has fired yet
    sleep(Duration::from_millis(500)).await;
    assert_eq!(fetcher.call_count(), 1);

    sleep(Duration::from_millis(600)).await;
    assert_eq!(fetcher.call_count(), 2);

    sleep(Duration::from_secs(3)).await;
    assert_eq!(fetcher.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_push_for_inactive_exchange_is_ignored() {
    let fetcher =
        ScriptedFetcher::default().respond(Exchange::Hose, vec![Ok(vec![record("AAA", 10.0)])]);
    let engine = start(&fetcher, ViewSelection::board(Exchange::Hose));
    settle().await;

    let before = engine.view_model();
    let updates = engine.updates();
    let revision = *updates.borrow();

    engine.on_push_event(PushEvent::new("HNX", "")).unwrap();
    engine.on_push_event(PushEvent::new("UPCOM", "")).unwrap();
    sleep(Duration::from_secs(3)).await;

    assert_eq!(fetcher.call_count(), 1);
    assert_eq!(*updates.borrow(), revision);
    assert_eq!(engine.view_model(), before);
}

#[tokio::test(start_paused = true)]
async fn test_attached_feed_follows_selection() {
    let fetcher = ScriptedFetcher::default()
        .respond(Exchange::Hose, vec![Ok(vec![record("AAA", 10.0)])])
        .respond(Exchange::Hnx, vec![Ok(vec![record("BBB", 10.0)])]);
    let engine = start(&fetcher, ViewSelection::board(Exchange::Hose));

    let (feed, feed_rx) = broadcast::channel(16);
    engine.attach_push_feed(feed_rx);
    settle().await;

    feed.send(PushEvent::new("HNX", "")).unwrap();
    sleep(Duration::from_secs(2)).await;
    assert_eq!(fetcher.call_count(), 1);

    feed.send(PushEvent::new("HOSE", "")).unwrap();
    sleep(Duration::from_secs(2)).await;
    assert_eq!(fetcher.call_count(), 2);

    engine.set_view_selection(Exchange::Hnx, ViewMode::Board);
    settle().await;
    assert_eq!(fetcher.call_count(), 3);

    feed.send(PushEvent::new("HOSE", "")).unwrap();
    sleep(Duration::from_secs(2)).await;
    assert_eq!(fetcher.call_count(), 3);

    feed.send(PushEvent::new("hnx", "")).unwrap();
    sleep(Duration::from_secs(2)).await;

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[3].exchange, Exchange::Hnx);
}

#[tokio::test(start_paused = true)]
async fn test_selection_change_drops_superseded_response() {
    let fetcher = ScriptedFetcher::default()
        .respond(Exchange::Hose, vec![Ok(vec![record("OLD", 10.0)])])
        .delay(Exchange::Hose, Duration::from_millis(500))
        .respond(Exchange::Hnx, vec![Ok(vec![record("NEW", 10.0)])]);
    let engine = start(&fetcher, ViewSelection::board(Exchange::Hose));
    settle().await;

    let selection = engine.set_view_selection(Exchange::Hnx, ViewMode::Board);
    assert_eq!(selection, ViewSelection::board(Exchange::Hnx));
    assert_eq!(engine.view_model().state, ViewState::Loading);

    sleep(Duration::from_secs(1)).await;

    let view = engine.view_model();
    assert_eq!(view.state, ViewState::Ready);
    assert_eq!(view.selection, ViewSelection::board(Exchange::Hnx));
    assert!(view.symbols.contains_key("NEW"));
    assert!(!view.symbols.contains_key("OLD"));
}

#[tokio::test(start_paused = true)]
async fn test_fetch_requested_in_flight_is_queued() {
    let fetcher = ScriptedFetcher::default()
        .respond(
            Exchange::Hose,
            vec![Ok(vec![record("AAA", 10.0)]), Ok(vec![record("AAA", 9.8)])],
        )
        .delay(Exchange::Hose, Duration::from_secs(2));
    let engine = start(&fetcher, ViewSelection::board(Exchange::Hose));
    settle().await;

    engine.refresh().unwrap();
    engine.refresh().unwrap();
    settle().await;
    assert_eq!(fetcher.call_count(), 1);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(fetcher.call_count(), 2);
    assert_eq!(engine.view_model().state, ViewState::Ready);

    sleep(Duration::from_secs(2)).await;
    let view = engine.view_model();
    let cell = view.symbols["AAA"].field(Field::MatchPrice).unwrap();
    assert_eq!(fetcher.call_count(), 2);
    assert_eq!(cell.value.as_str(), "9.8");
    assert_eq!(cell.transition, Some(Direction::Decrease));
}

#[tokio::test(start_paused = true)]
async fn test_secondary_no_data_retried_once_then_empty() {
    let fetcher = ScriptedFetcher::default().respond(Exchange::Hnx, vec![Err(FetchError::NoData)]);
    let engine = start(&fetcher, ViewSelection::board(Exchange::Hnx));
    settle().await;

    assert_eq!(fetcher.call_count(), 1);
    assert_eq!(engine.view_model().state, ViewState::Loading);

    sleep(Duration::from_millis(2000)).await;

    let view = engine.view_model();
    assert_eq!(fetcher.call_count(), 2);
    assert_eq!(view.state, ViewState::Empty);
    assert_eq!(view.last_error, Some(FetchError::NoData));
    assert!(view.symbols.is_empty());

    sleep(Duration::from_secs(10)).await;
    assert_eq!(fetcher.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_secondary_no_data_recovers_on_retry() {
    let fetcher = ScriptedFetcher::default().respond(
        Exchange::Hnx,
        vec![Err(FetchError::NoData), Ok(vec![record("BBB", 10.5)])],
    );
    let engine = start(&fetcher, ViewSelection::board(Exchange::Hnx));
    sleep(Duration::from_millis(2010)).await;

    let view = engine.view_model();
    assert_eq!(fetcher.call_count(), 2);
    assert_eq!(view.state, ViewState::Ready);
    assert_eq!(
        view.symbols["BBB"].field(Field::MatchPrice).unwrap().band,
        Band::AboveReference
    );
}

#[tokio::test(start_paused = true)]
async fn test_refresh_during_pending_retry_gets_own_retry() {
    let fetcher = ScriptedFetcher::default().respond(
        Exchange::Hnx,
        vec![
            Err(FetchError::NoData),
            Err(FetchError::NoData),
            Ok(vec![record("BBB", 10.5)]),
        ],
    );
    let engine = start(&fetcher, ViewSelection::board(Exchange::Hnx));
    settle().await;
    assert_eq!(engine.view_model().state, ViewState::Loading);

    engine.refresh().unwrap();
    settle().await;

    assert_eq!(fetcher.call_count(), 2);
    assert_eq!(engine.view_model().state, ViewState::Loading);

    sleep(Duration::from_millis(2000)).await;

    let view = engine.view_model();
    assert_eq!(fetcher.call_count(), 3);
    assert_eq!(view.state, ViewState::Ready);
    assert!(view.symbols.contains_key("BBB"));
}

#[tokio::test(start_paused = true)]
async fn test_push_during_pending_retry_gets_own_retry() {
    let fetcher = ScriptedFetcher::default().respond(
        Exchange::Hnx,
        vec![
            Err(FetchError::NoData),
            Err(FetchError::NoData),
            Ok(vec![record("BBB", 10.5)]),
        ],
    );
    let engine = start(&fetcher, ViewSelection::board(Exchange::Hnx));
    settle().await;

    engine.on_push_event(PushEvent::new("HNX", "")).unwrap();
    sleep(Duration::from_millis(1010)).await;

    assert_eq!(fetcher.call_count(), 2);
    assert_eq!(engine.view_model().state, ViewState::Loading);

    sleep(Duration::from_millis(2000)).await;

    assert_eq!(fetcher.call_count(), 3);
    assert_eq!(engine.view_model().state, ViewState::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_primary_no_data_is_empty_without_retry() {
    let fetcher =
        ScriptedFetcher::default().respond(Exchange::Hose, vec![Err(FetchError::NoData)]);
    let engine = start(&fetcher, ViewSelection::board(Exchange::Hose));
    settle().await;

    assert_eq!(engine.view_model().state, ViewState::Empty);
    sleep(Duration::from_secs(5)).await;
    assert_eq!(fetcher.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failure_clears_board_and_reports_error() {
    let fetcher = ScriptedFetcher::default().respond(
        Exchange::Hose,
        vec![Ok(vec![record("AAA", 10.0)]), Err(FetchError::Status(500))],
    );
    let engine = start(&fetcher, ViewSelection::board(Exchange::Hose));
    settle().await;
    assert_eq!(engine.view_model().state, ViewState::Ready);

    engine.refresh().unwrap();
    settle().await;

    let view = engine.view_model();
    assert_eq!(view.state, ViewState::Error);
    assert_eq!(view.last_error, Some(FetchError::Status(500)));
    assert!(view.symbols.is_empty());

    // No automatic retry for real failures
    sleep(Duration::from_secs(5)).await;
    assert_eq!(fetcher.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_watchlist_falls_back_without_capability() {
    let fetcher = ScriptedFetcher::default();
    let engine = BoardEngine::start(
        fetcher.clone(),
        Arc::new(StaticCapabilities::none()),
        EngineConfig::default(),
        ViewSelection::board(Exchange::Hose),
    );
    settle().await;

    let selection = engine.set_view_selection(Exchange::Hose, ViewMode::Watchlist);
    settle().await;

    assert_eq!(selection, ViewSelection::board(Exchange::Hose));
    assert_eq!(fetcher.call_count(), 1);
    assert!(fetcher.calls().iter().all(|call| call.mode == ViewMode::Board));
}

#[tokio::test(start_paused = true)]
async fn test_watchlist_requests_configured_symbols() {
    let fetcher =
        ScriptedFetcher::default().respond(Exchange::Hose, vec![Ok(vec![record("VNM", 10.0)])]);
    let engine = start(&fetcher, ViewSelection::board(Exchange::Hose));
    settle().await;

    let selection = engine.set_view_selection(Exchange::Hose, ViewMode::Watchlist);
    assert_eq!(selection, ViewSelection::watchlist(Exchange::Hose));
    settle().await;

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].mode, ViewMode::Watchlist);
    assert_eq!(
        calls[1].symbols,
        Some(vec!["VNM".to_string(), "FPT".to_string()])
    );

    // Mode toggle resets the board: the reload is a first sighting, not a change
    let view = engine.view_model();
    assert_eq!(view.state, ViewState::Ready);
    assert!(
        view.symbols["VNM"]
            .fields
            .values()
            .all(|cell| cell.transition.is_none())
    );
}

#[tokio::test(start_paused = true)]
async fn test_reselecting_active_selection_is_noop() {
    let fetcher =
        ScriptedFetcher::default().respond(Exchange::Hose, vec![Ok(vec![record("AAA", 10.0)])]);
    let engine = start(&fetcher, ViewSelection::board(Exchange::Hose));
    settle().await;

    engine.set_view_selection(Exchange::Hose, ViewMode::Board);
    settle().await;

    assert_eq!(fetcher.call_count(), 1);
    assert_eq!(engine.view_model().state, ViewState::Ready);
    assert_eq!(engine.view_model().symbols.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_updates_and_shutdown() {
    let fetcher =
        ScriptedFetcher::default().respond(Exchange::Hose, vec![Ok(vec![record("AAA", 10.0)])]);
    let engine = start(&fetcher, ViewSelection::board(Exchange::Hose));

    let mut updates = engine.updates();
    updates.changed().await.unwrap();
    assert!(*updates.borrow_and_update() > 0);
    assert_eq!(engine.view_model().state, ViewState::Ready);

    engine.shutdown();
    engine.shutdown();

    assert!(engine.is_closed());
    assert_eq!(engine.refresh(), Err(EngineError::Closed));
    assert_eq!(
        engine.on_push_event(PushEvent::new("HOSE", "")),
        Err(EngineError::Closed)
    );

    let view = engine.view_model();
    assert_eq!(view.state, ViewState::Loading);
    assert!(view.symbols.is_empty());

    sleep(Duration::from_secs(2)).await;
    assert_eq!(fetcher.call_count(), 1);
}
