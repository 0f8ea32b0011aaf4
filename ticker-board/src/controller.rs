//! View controller: owns the active selection, its symbol cache and transitions, and the
//! `Loading → Ready | Empty | Error` lifecycle.
//!
//! All methods are synchronous and run to completion; fetch results are matched to the
//! selection that issued them through [`FetchTicket`]s so a superseded response can never be
//! merged into a newer view.

use crate::{
    cache::{MergeOutcome, SymbolCache, SymbolView},
    capability::{CapabilityCheck, WATCHLIST_FEATURE},
    error::FetchError,
    model::{SymbolRecord, ViewMode, ViewSelection},
    transition::TransitionTracker,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Lifecycle state exposed to presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewState {
    Loading,
    Ready,
    Empty,
    Error,
}

impl ViewState {
    pub fn label(&self) -> &'static str {
        match self {
            ViewState::Loading => "LOADING",
            ViewState::Ready => "LIVE",
            ViewState::Empty => "NO DATA",
            ViewState::Error => "ERROR",
        }
    }
}

/// Fully classified, animation-ready snapshot for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    pub state: ViewState,
    pub selection: ViewSelection,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_error: Option<FetchError>,
    pub symbols: IndexMap<SmolStr, SymbolView>,
}

/// Identifies the selection and request a fetch was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    pub selection: ViewSelection,
    epoch: u64,
    seq: u64,
}

/// What happened to a fetch result handed to [`ViewController::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Merged(MergeOutcome),
    Failed(FetchError),
    /// Result belonged to a superseded request or selection and was dropped.
    Stale,
}

/// Result of [`ViewController::set_selection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    Changed(ViewSelection),
    Unchanged(ViewSelection),
}

impl SelectionChange {
    /// Selection actually in effect after the call.
    pub fn selection(&self) -> ViewSelection {
        match self {
            SelectionChange::Changed(selection) | SelectionChange::Unchanged(selection) => {
                *selection
            }
        }
    }
}

pub struct ViewController {
    selection: ViewSelection,
    state: ViewState,
    cache: SymbolCache,
    tracker: TransitionTracker,
    capabilities: Arc<dyn CapabilityCheck>,
    epoch: u64,
    next_seq: u64,
    last_applied_seq: u64,
    updated_at: Option<DateTime<Utc>>,
    last_error: Option<FetchError>,
}

impl ViewController {
    pub fn new(
        selection: ViewSelection,
        capabilities: Arc<dyn CapabilityCheck>,
        transition_ttl: Duration,
    ) -> Self {
        let mut controller = Self {
            selection,
            state: ViewState::Loading,
            cache: SymbolCache::new(),
            tracker: TransitionTracker::new(transition_ttl),
            capabilities,
            epoch: 0,
            next_seq: 0,
            last_applied_seq: 0,
            updated_at: None,
            last_error: None,
        };
        controller.selection = controller.resolve(selection);
        controller
    }

    pub fn selection(&self) -> ViewSelection {
        self.selection
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    /// Apply the capability gate: watchlist mode falls back to board mode when not granted.
    pub fn resolve(&self, requested: ViewSelection) -> ViewSelection {
        if requested.mode == ViewMode::Watchlist
            && !self.capabilities.has_feature(WATCHLIST_FEATURE)
        {
            warn!(
                exchange = %requested.exchange,
                "watchlist capability not granted, falling back to board mode"
            );
            ViewSelection::board(requested.exchange)
        } else {
            requested
        }
    }

    /// Switch exchange and/or mode. A real change wipes every cache and returns to `Loading`;
    /// responses to requests issued before the change become stale.
    pub fn set_selection(&mut self, requested: ViewSelection) -> SelectionChange {
        let selection = self.resolve(requested);
        if selection == self.selection {
            return SelectionChange::Unchanged(selection);
        }

        info!(from = %self.selection, to = %selection, "view selection changed");
        self.selection = selection;
        self.reset();
        SelectionChange::Changed(selection)
    }

    /// Issue a ticket for a fetch of the active selection.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.next_seq += 1;
        FetchTicket {
            selection: self.selection,
            epoch: self.epoch,
            seq: self.next_seq,
        }
    }

    /// Whether a result for `ticket` may still be applied.
    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.epoch == self.epoch && ticket.seq > self.last_applied_seq
    }

    /// Merge a fetch result, or clear the view on failure.
    pub fn apply(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<SymbolRecord>, FetchError>,
        now: Instant,
    ) -> ApplyOutcome {
        if !self.is_current(&ticket) {
            debug!(selection = %ticket.selection, "dropping response for superseded request");
            return ApplyOutcome::Stale;
        }
        self.last_applied_seq = ticket.seq;

        match result {
            Ok(snapshot) => {
                let outcome = self.cache.merge(&snapshot, &mut self.tracker, now);
                self.tracker.sweep(now);
                self.state = if self.cache.is_empty() {
                    ViewState::Empty
                } else {
                    ViewState::Ready
                };
                self.updated_at = Some(Utc::now());
                self.last_error = None;

                debug!(
                    selection = %self.selection,
                    records = snapshot.len(),
                    inserted = outcome.inserted,
                    updated = outcome.updated,
                    skipped = outcome.skipped.len(),
                    transitions = outcome.transitions.len(),
                    "merged snapshot"
                );
                ApplyOutcome::Merged(outcome)
            }
            Err(fetch_error) => {
                self.fail(fetch_error.clone());
                ApplyOutcome::Failed(fetch_error)
            }
        }
    }

    /// Clear on failure: stale prices must never be shown as live.
    fn fail(&mut self, fetch_error: FetchError) {
        self.cache.clear();
        self.tracker.clear();

        if fetch_error.is_no_data() {
            info!(selection = %self.selection, "no data for selection");
            self.state = ViewState::Empty;
        } else {
            error!(selection = %self.selection, error = %fetch_error, "snapshot fetch failed");
            self.state = ViewState::Error;
        }
        self.last_error = Some(fetch_error);
    }

    pub fn view_model(&self, now: Instant) -> ViewModel {
        ViewModel {
            state: self.state,
            selection: self.selection,
            updated_at: self.updated_at,
            last_error: self.last_error.clone(),
            symbols: self.cache.views(&self.tracker, now),
        }
    }

    pub fn cache(&self) -> &SymbolCache {
        &self.cache
    }

    /// Forget everything and invalidate outstanding tickets. Used on teardown.
    pub fn teardown(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.cache.clear();
        self.tracker.clear();
        self.state = ViewState::Loading;
        self.epoch += 1;
        self.last_applied_seq = 0;
        self.next_seq = 0;
        self.updated_at = None;
        self.last_error = None;
    }
}
