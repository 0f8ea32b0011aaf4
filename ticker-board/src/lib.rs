//! Ticker Board - live price board reconciliation engine.
//!
//! Turns a stream of "something changed on this exchange" push events plus on-demand snapshot
//! fetches into a consistent, classified and animatable board of symbols:
//! - push bursts are debounced into a single snapshot fetch per quiet window
//! - snapshots are diffed field-by-field against the previous values of the active selection
//! - every price-bearing cell is classified against the symbol's ceiling, floor and reference
//! - changed cells carry a short-lived increase / decrease / equal transition
//!
//! The engine is transport agnostic: snapshots come from any [`SnapshotFetcher`] and push events
//! from any `tokio::sync::broadcast` channel. [`HttpSnapshotFetcher`] and [`PushFeed`] are the
//! bundled HTTP and WebSocket adapters.

/// Field formatting into canonical display strings.
pub mod format;

/// Price-band classification against session bounds.
pub mod band;

/// Short-lived change transitions.
pub mod transition;

/// Per-selection symbol cache and diff merger.
pub mod cache;

/// Selection lifecycle and view-model assembly.
pub mod controller;

/// Push-event debouncing and fetch scheduling.
pub mod coalescer;

/// Outbound facade.
pub mod engine;

/// Snapshot fetch collaborator and its HTTP adapter.
pub mod fetch;

/// WebSocket push-event feed.
pub mod feed;

/// Capability gate for watchlist mode.
pub mod capability;

pub mod config;
pub mod error;
pub mod model;

pub use band::Band;
pub use cache::{FieldView, SymbolView};
pub use capability::{CapabilityCheck, StaticCapabilities, WATCHLIST_FEATURE};
pub use coalescer::PushSubscription;
pub use config::EngineConfig;
pub use controller::{ViewModel, ViewState};
pub use engine::BoardEngine;
pub use error::{EngineError, FetchError, RecordError};
pub use feed::{FeedStatus, PushFeed, PushFeedConfig, PushFeedHandle};
pub use fetch::{HttpSnapshotFetcher, SnapshotFetcher, SnapshotRequest};
pub use format::{DisplayValue, NO_DATA};
pub use model::{
    Exchange, Field, FieldKind, PushEvent, RawValue, SymbolRecord, ViewMode, ViewSelection,
};
pub use transition::Direction;
