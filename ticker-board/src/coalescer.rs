//! Push-event coalescing and fetch scheduling.
//!
//! A single task owns every timer and the in-flight gate for the active selection:
//! - push events for the active exchange re-arm a debounce window; only the last one of a
//!   burst leads to a fetch
//! - at most one fetch is in flight; a fetch requested meanwhile is queued and issued once the
//!   previous result has been merged
//! - a "no data yet" answer from the secondary exchange is retried a bounded number of times
//!   after a fixed delay, everything else is handed to the [`ViewController`] as is
//!
//! Merge, classification and transition work happens synchronously under the controller lock,
//! which is never held across an `.await`.

use crate::{
    config::EngineConfig,
    controller::{FetchTicket, ViewController},
    error::FetchError,
    fetch::{SnapshotFetcher, SnapshotRequest},
    model::{PushEvent, SymbolRecord, ViewSelection},
};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tracing::{debug, info, warn};

/// Instructions for the coalescer task.
#[derive(Debug)]
pub enum Command {
    Push(PushEvent),
    /// Fetch now, bypassing the debounce window.
    Refresh,
    /// The controller switched selection; drop everything scheduled for the old one.
    SelectionChanged(ViewSelection),
    Shutdown,
}

#[derive(Debug)]
struct FetchDone {
    ticket: FetchTicket,
    result: Result<Vec<SymbolRecord>, FetchError>,
}

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    selection: ViewSelection,
    deadline: Instant,
}

#[derive(Debug)]
struct InFlight {
    ticket: FetchTicket,
    handle: JoinHandle<()>,
}

pub struct EventCoalescer<F> {
    controller: Arc<Mutex<ViewController>>,
    fetcher: Arc<F>,
    config: EngineConfig,
    revision: watch::Sender<u64>,
    results_tx: mpsc::UnboundedSender<FetchDone>,
    debounce: Option<Scheduled>,
    retry: Option<Scheduled>,
    in_flight: Option<InFlight>,
    queued: bool,
    no_data_streak: u32,
}

impl<F> EventCoalescer<F>
where
    F: SnapshotFetcher,
{
    /// Spawn the coalescer task. An initial fetch for the controller's selection is issued
    /// immediately.
    pub fn spawn(
        controller: Arc<Mutex<ViewController>>,
        fetcher: Arc<F>,
        config: EngineConfig,
    ) -> (
        mpsc::UnboundedSender<Command>,
        watch::Receiver<u64>,
        JoinHandle<()>,
    ) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let (revision_tx, revision_rx) = watch::channel(0);

        let coalescer = Self {
            controller,
            fetcher,
            config,
            revision: revision_tx,
            results_tx,
            debounce: None,
            retry: None,
            in_flight: None,
            queued: false,
            no_data_streak: 0,
        };

        let handle = tokio::spawn(coalescer.run(command_rx, results_rx));
        (command_tx, revision_rx, handle)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut results: mpsc::UnboundedReceiver<FetchDone>,
    ) {
        self.request_fetch();

        loop {
            let debounce = self.debounce;
            let retry = self.retry;
            let fallback = Instant::now();

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Push(event)) => self.on_push(event),
                    Some(Command::Refresh) => {
                        self.debounce = None;
                        self.no_data_streak = 0;
                        self.request_fetch();
                    }
                    Some(Command::SelectionChanged(selection)) => self.on_selection_changed(selection),
                    Some(Command::Shutdown) | None => break,
                },
                Some(done) = results.recv() => self.on_fetch_done(done),
                _ = sleep_until(debounce.map_or(fallback, |d| d.deadline)), if debounce.is_some() => {
                    self.debounce = None;
                    self.fire(debounce, "debounced push");
                }
                _ = sleep_until(retry.map_or(fallback, |r| r.deadline)), if retry.is_some() => {
                    self.retry = None;
                    self.fire(retry, "no-data retry");
                }
            }
        }

        if let Some(in_flight) = self.in_flight.take() {
            in_flight.handle.abort();
        }
        debug!("event coalescer stopped");
    }

    fn active_selection(&self) -> ViewSelection {
        self.controller.lock().selection()
    }

    fn on_push(&mut self, event: PushEvent) {
        let exchange = match event.exchange() {
            Ok(exchange) => exchange,
            Err(error) => {
                warn!(%error, "ignoring push event");
                return;
            }
        };

        let selection = self.active_selection();
        if exchange != selection.exchange {
            debug!(%exchange, active = %selection, "ignoring push event for inactive exchange");
            return;
        }

        if let Some(time) = event.time() {
            let lag_ms = (Utc::now() - time).num_milliseconds();
            debug!(%exchange, lag_ms, "push event received");
        }

        // A new trigger earns its own no-data retry budget
        self.no_data_streak = 0;
        self.debounce = Some(Scheduled {
            selection,
            deadline: Instant::now() + self.config.debounce_window,
        });
    }

    fn on_selection_changed(&mut self, selection: ViewSelection) {
        self.debounce = None;
        self.retry = None;
        self.queued = false;
        self.no_data_streak = 0;

        let superseded = self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| !self.controller.lock().is_current(&in_flight.ticket));
        if superseded {
            if let Some(in_flight) = self.in_flight.take() {
                debug!(selection = %in_flight.ticket.selection, "cancelling in-flight fetch");
                in_flight.handle.abort();
            }
        }

        debug!(%selection, "loading new selection");
        self.bump();
        self.request_fetch();
    }

    /// A timer fired; fetch if it still belongs to the active selection.
    fn fire(&mut self, scheduled: Option<Scheduled>, reason: &'static str) {
        let Some(scheduled) = scheduled else {
            return;
        };

        if scheduled.selection != self.active_selection() {
            debug!(selection = %scheduled.selection, reason, "dropping timer for old selection");
            return;
        }

        debug!(selection = %scheduled.selection, reason, "timer fired");
        self.request_fetch();
    }

    /// Issue a fetch for the active selection, or queue it behind the one in flight.
    fn request_fetch(&mut self) {
        if let Some(in_flight) = &self.in_flight {
            if self.controller.lock().is_current(&in_flight.ticket) {
                debug!("fetch already in flight, queueing");
                self.queued = true;
                return;
            }
            in_flight.handle.abort();
            self.in_flight = None;
        }

        let ticket = self.controller.lock().begin_fetch();
        let request = SnapshotRequest::for_selection(ticket.selection, &self.config.watchlist);
        info!(selection = %ticket.selection, "issuing snapshot fetch");

        let fetcher = Arc::clone(&self.fetcher);
        let results_tx = self.results_tx.clone();
        let handle = tokio::spawn(async move {
            let result = fetcher.fetch_snapshot(&request).await;
            let _ = results_tx.send(FetchDone { ticket, result });
        });

        self.retry = None;
        self.in_flight = Some(InFlight { ticket, handle });
    }

    fn on_fetch_done(&mut self, done: FetchDone) {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.ticket == done.ticket)
        {
            self.in_flight = None;
        }

        let now = Instant::now();
        let FetchDone { ticket, result } = done;

        {
            let mut controller = self.controller.lock();
            if !controller.is_current(&ticket) {
                debug!(selection = %ticket.selection, "dropping response for superseded request");
                drop(controller);
                self.drain_queue();
                return;
            }

            match result {
                Err(error) if self.should_retry(&ticket, &error) => {
                    self.no_data_streak += 1;
                    warn!(
                        selection = %ticket.selection,
                        attempt = self.no_data_streak,
                        delay_ms = self.config.no_data_retry_delay.as_millis() as u64,
                        "no data yet, scheduling retry"
                    );
                    self.retry = Some(Scheduled {
                        selection: ticket.selection,
                        deadline: now + self.config.no_data_retry_delay,
                    });
                }
                result => {
                    self.no_data_streak = 0;
                    if result.is_ok() {
                        self.retry = None;
                    }
                    controller.apply(ticket, result, now);
                }
            }
        }

        self.bump();
        self.drain_queue();
    }

    fn should_retry(&self, ticket: &FetchTicket, error: &FetchError) -> bool {
        error.is_no_data()
            && ticket.selection.exchange.is_secondary()
            && self.no_data_streak < self.config.no_data_retry_limit
    }

    fn drain_queue(&mut self) {
        if self.queued && self.in_flight.is_none() {
            self.queued = false;
            self.request_fetch();
        }
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision = revision.wrapping_add(1));
    }
}

/// Live subscription of the coalescer to a push-event stream, scoped to one selection.
///
/// Events for other exchanges are filtered out before they reach the coalescer. Dropping the
/// subscription stops it.
#[derive(Debug)]
pub struct PushSubscription {
    selection: ViewSelection,
    handle: JoinHandle<()>,
}

impl PushSubscription {
    pub fn spawn(
        mut events: broadcast::Receiver<PushEvent>,
        selection: ViewSelection,
        commands: mpsc::UnboundedSender<Command>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if event.exchange().ok() != Some(selection.exchange) {
                            continue;
                        }
                        if commands.send(Command::Push(event)).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, %selection, "push subscription lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(%selection, "push source closed");
                        break;
                    }
                }
            }
        });

        Self { selection, handle }
    }

    pub fn selection(&self) -> ViewSelection {
        self.selection
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for PushSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
