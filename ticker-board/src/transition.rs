//! Short-lived up/down/equal tags produced when a merged field value changes.
//!
//! Transitions are pure data with an absolute expiry; presentation maps them to whatever visual
//! cue it likes. Expired tags are never reported, whether or not [`TransitionTracker::sweep`]
//! has run yet.

use crate::{format::DisplayValue, model::Field};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{collections::HashMap, time::Duration};
use tokio::time::Instant;

/// How long a transition stays visible.
pub const DEFAULT_TRANSITION_TTL: Duration = Duration::from_secs(1);

/// Direction of a field change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Direction {
    Increase,
    Decrease,
    Equal,
}

impl Direction {
    pub fn arrow(&self) -> &'static str {
        match self {
            Direction::Increase => "▲",
            Direction::Decrease => "▼",
            Direction::Equal => "=",
        }
    }
}

/// An active transition tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub direction: Direction,
    pub expires_at: Instant,
}

impl Transition {
    pub fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// A transition produced by a merge, reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    pub symbol: SmolStr,
    pub field: Field,
    pub direction: Direction,
}

/// Holds the most recent transition per (symbol, field). Newer transitions overwrite older ones.
#[derive(Debug)]
pub struct TransitionTracker {
    ttl: Duration,
    active: HashMap<(SmolStr, Field), Transition>,
}

impl TransitionTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            active: HashMap::new(),
        }
    }

    /// Compare a new value against the previously rendered one and record a transition.
    ///
    /// Returns `None` when either side is not numeric (including first sight of a field, where
    /// there is no previous value) and for fields that are never animated.
    pub fn observe(
        &mut self,
        symbol: &SmolStr,
        field: Field,
        new_value: &DisplayValue,
        previous_value: Option<&DisplayValue>,
        now: Instant,
    ) -> Option<Direction> {
        if !field.is_animated() {
            return None;
        }

        let new_value = new_value.as_f64()?;
        let previous_value = previous_value?.as_f64()?;

        let direction = if new_value > previous_value {
            Direction::Increase
        } else if new_value < previous_value {
            Direction::Decrease
        } else {
            Direction::Equal
        };

        self.active.insert(
            (symbol.clone(), field),
            Transition {
                direction,
                expires_at: now + self.ttl,
            },
        );

        Some(direction)
    }

    /// Live transition for a cell, if any.
    pub fn get(&self, symbol: &str, field: Field, now: Instant) -> Option<Transition> {
        self.active
            .get(&(SmolStr::new(symbol), field))
            .filter(|transition| transition.is_live(now))
            .copied()
    }

    /// Drop expired transitions, returning how many were removed.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.active.len();
        self.active.retain(|_, transition| transition.is_live(now));
        before - self.active.len()
    }

    /// Number of stored transitions, live or not yet swept.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }
}

impl Default for TransitionTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSITION_TTL)
    }
}
