use crate::{
    capability::CapabilityCheck,
    coalescer::{Command, EventCoalescer, PushSubscription},
    config::EngineConfig,
    controller::{SelectionChange, ViewController, ViewModel},
    error::EngineError,
    fetch::SnapshotFetcher,
    model::{Exchange, PushEvent, ViewMode, ViewSelection},
};
use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info};

/// Live price board for one view session.
///
/// Owns the [`ViewController`] and the coalescer task that feeds it. Must be started inside a
/// Tokio runtime; an initial fetch for the starting selection is issued immediately.
///
/// ```no_run
/// use std::sync::Arc;
/// use ticker_board::{
///     BoardEngine, EngineConfig, Exchange, HttpSnapshotFetcher, StaticCapabilities, ViewMode,
///     ViewSelection,
/// };
///
/// # async fn run() {
/// let engine = BoardEngine::start(
///     HttpSnapshotFetcher::new("http://127.0.0.1:8080"),
///     Arc::new(StaticCapabilities::all()),
///     EngineConfig::default(),
///     ViewSelection::default(),
/// );
///
/// engine.set_view_selection(Exchange::Hnx, ViewMode::Board);
/// let view = engine.view_model();
/// # }
/// ```
pub struct BoardEngine {
    controller: Arc<Mutex<ViewController>>,
    commands: mpsc::UnboundedSender<Command>,
    revision: watch::Receiver<u64>,
    push_source: Mutex<Option<broadcast::Receiver<PushEvent>>>,
    subscription: Mutex<Option<PushSubscription>>,
    task: JoinHandle<()>,
    closed: AtomicBool,
}

impl BoardEngine {
    pub fn start<F>(
        fetcher: F,
        capabilities: Arc<dyn CapabilityCheck>,
        config: EngineConfig,
        selection: ViewSelection,
    ) -> Self
    where
        F: SnapshotFetcher,
    {
        let controller = Arc::new(Mutex::new(ViewController::new(
            selection,
            capabilities,
            config.transition_ttl,
        )));
        info!(selection = %controller.lock().selection(), "starting board engine");

        let (commands, revision, task) =
            EventCoalescer::spawn(Arc::clone(&controller), Arc::new(fetcher), config);

        Self {
            controller,
            commands,
            revision,
            push_source: Mutex::new(None),
            subscription: Mutex::new(None),
            task,
            closed: AtomicBool::new(false),
        }
    }

    pub fn selection(&self) -> ViewSelection {
        self.controller.lock().selection()
    }

    /// Current view model, with bands recomputed and expired transitions hidden.
    pub fn view_model(&self) -> ViewModel {
        self.controller.lock().view_model(Instant::now())
    }

    /// Switch exchange and/or mode, returning the selection actually entered.
    pub fn set_view_selection(&self, exchange: Exchange, mode: ViewMode) -> ViewSelection {
        if self.is_closed() {
            return self.selection();
        }

        let change = self
            .controller
            .lock()
            .set_selection(ViewSelection::new(exchange, mode));

        if let SelectionChange::Changed(selection) = change {
            let _ = self.commands.send(Command::SelectionChanged(selection));
            self.resubscribe(selection);
        }
        change.selection()
    }

    /// Fetch the active selection now, bypassing the debounce window.
    pub fn refresh(&self) -> Result<(), EngineError> {
        self.send(Command::Refresh)
    }

    /// Feed one push event. Events for an exchange other than the active one are ignored.
    pub fn on_push_event(&self, event: PushEvent) -> Result<(), EngineError> {
        self.send(Command::Push(event))
    }

    /// Listen to a push-event stream. The subscription follows every selection change.
    pub fn attach_push_feed(&self, events: broadcast::Receiver<PushEvent>) {
        if self.is_closed() {
            return;
        }

        *self.push_source.lock() = Some(events);
        self.resubscribe(self.selection());
    }

    /// Revision counter bumped after every state change.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.revision.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop the coalescer and push subscription and clear the view. Idempotent.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let _ = self.commands.send(Command::Shutdown);
        self.subscription.lock().take();
        self.push_source.lock().take();
        self.controller.lock().teardown();
        info!("board engine shut down");
    }

    fn send(&self, command: Command) -> Result<(), EngineError> {
        if self.is_closed() {
            return Err(EngineError::Closed);
        }
        self.commands.send(command).map_err(|_| EngineError::Closed)
    }

    fn resubscribe(&self, selection: ViewSelection) {
        let events = match self.push_source.lock().as_ref() {
            Some(source) => source.resubscribe(),
            None => return,
        };

        debug!(%selection, "subscribing to push events");
        let subscription = PushSubscription::spawn(events, selection, self.commands.clone());
        // Replacing drops, and so stops, the previous subscription
        *self.subscription.lock() = Some(subscription);
    }
}

impl Drop for BoardEngine {
    fn drop(&mut self) {
        self.shutdown();
        self.task.abort();
    }
}

impl std::fmt::Debug for BoardEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardEngine")
            .field("selection", &self.selection())
            .field("closed", &self.is_closed())
            .finish()
    }
}
