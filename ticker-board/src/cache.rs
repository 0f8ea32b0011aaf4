//! Per-symbol cache of formatted board values and the diff merger that feeds it.
//!
//! The merger is the only writer of the previous-value cache, which is in turn the only input
//! the [`TransitionTracker`] compares against.

use crate::{
    band::{Band, classify},
    error::RecordError,
    format::{DisplayValue, format, format_field},
    model::{Field, SymbolRecord},
    transition::{Direction, TransitionEvent, TransitionTracker},
};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::collections::HashMap;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Ceiling, floor and reference for one symbol. Fixed for the session once first seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBounds {
    pub reference: DisplayValue,
    pub ceiling: DisplayValue,
    pub floor: DisplayValue,
}

impl SessionBounds {
    /// Format the record's bounds, rejecting the record if any bound is missing.
    pub fn from_record(record: &SymbolRecord) -> Result<Self, RecordError> {
        let bounds = Self {
            reference: format(record.reference.as_ref()),
            ceiling: format(record.ceiling.as_ref()),
            floor: format(record.floor.as_ref()),
        };

        let complete = [&bounds.reference, &bounds.ceiling, &bounds.floor]
            .iter()
            .all(|bound| bound.as_f64().is_some());

        if complete {
            Ok(bounds)
        } else {
            Err(RecordError::MissingBounds(record.symbol.clone()))
        }
    }

    pub fn classify(&self, value: &DisplayValue) -> Band {
        classify(value, &self.reference, &self.ceiling, &self.floor)
    }
}

/// Current cached values for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRow {
    pub symbol: SmolStr,
    pub bounds: SessionBounds,
    pub fields: IndexMap<Field, DisplayValue>,
}

impl SymbolRow {
    pub fn value(&self, field: Field) -> &DisplayValue {
        self.fields.get(&field).unwrap_or(&DisplayValue::NoData)
    }

    /// Band used to colour `field`: the band of its source price, or neutral.
    pub fn band(&self, field: Field) -> Band {
        field
            .band_source()
            .map(|source| self.bounds.classify(self.value(source)))
            .unwrap_or(Band::Unknown)
    }
}

/// One classified, animation-ready cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldView {
    pub value: DisplayValue,
    pub band: Band,
    pub transition: Option<Direction>,
}

/// One classified row of the view model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolView {
    pub symbol: SmolStr,
    pub reference: DisplayValue,
    pub ceiling: DisplayValue,
    pub floor: DisplayValue,
    pub fields: IndexMap<Field, FieldView>,
}

impl SymbolView {
    pub fn field(&self, field: Field) -> Option<&FieldView> {
        self.fields.get(&field)
    }
}

/// Result of merging one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Whether this merge populated an empty cache.
    pub initial: bool,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: Vec<RecordError>,
    pub transitions: Vec<TransitionEvent>,
}

/// Symbol cache for the active view selection, in upstream board order.
#[derive(Debug, Default)]
pub struct SymbolCache {
    rows: IndexMap<SmolStr, SymbolRow>,
    previous: HashMap<(SmolStr, Field), DisplayValue>,
}

impl SymbolCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a snapshot field by field.
    ///
    /// Populating an empty cache never produces transitions. Symbols missing from `snapshot`
    /// are kept as they are. Re-merging an identical snapshot changes nothing.
    pub fn merge(
        &mut self,
        snapshot: &[SymbolRecord],
        tracker: &mut TransitionTracker,
        now: Instant,
    ) -> MergeOutcome {
        let mut outcome = MergeOutcome {
            initial: self.rows.is_empty(),
            ..Default::default()
        };

        for record in snapshot {
            let symbol = SmolStr::new(record.symbol.trim());
            if symbol.is_empty() {
                warn!("skipping snapshot record without a symbol");
                outcome.skipped.push(RecordError::MissingSymbol);
                continue;
            }

            let bounds = match SessionBounds::from_record(record) {
                Ok(bounds) => bounds,
                Err(error) => {
                    warn!(%symbol, %error, "skipping malformed snapshot record");
                    outcome.skipped.push(error);
                    continue;
                }
            };

            let values = Field::ALL
                .map(|field| (field, format_field(field.kind(), record.raw(field))));

            let Some(row) = self.rows.get_mut(&symbol) else {
                for (field, value) in &values {
                    self.previous.insert((symbol.clone(), *field), value.clone());
                }
                self.rows.insert(
                    symbol.clone(),
                    SymbolRow {
                        symbol,
                        bounds,
                        fields: values.into_iter().collect(),
                    },
                );
                outcome.inserted += 1;
                continue;
            };

            if row.bounds != bounds {
                debug!(%symbol, "ignoring session bounds change until next selection reset");
            }

            let mut changed = false;
            for (field, value) in values {
                let key = (symbol.clone(), field);
                let old = match self.previous.get(&key) {
                    Some(old) if *old == value => continue,
                    old => old.cloned(),
                };

                if !outcome.initial {
                    if let Some(direction) =
                        tracker.observe(&symbol, field, &value, old.as_ref(), now)
                    {
                        outcome.transitions.push(TransitionEvent {
                            symbol: symbol.clone(),
                            field,
                            direction,
                        });
                    }
                }

                self.previous.insert(key, value.clone());
                row.fields.insert(field, value);
                changed = true;
            }

            if changed {
                outcome.updated += 1;
            }
        }

        outcome
    }

    /// Classified view of every cached symbol. Bands are recomputed, expired transitions hidden.
    pub fn views(&self, tracker: &TransitionTracker, now: Instant) -> IndexMap<SmolStr, SymbolView> {
        self.rows
            .values()
            .map(|row| {
                let fields = row
                    .fields
                    .iter()
                    .map(|(field, value)| {
                        let view = FieldView {
                            value: value.clone(),
                            band: row.band(*field),
                            transition: tracker
                                .get(&row.symbol, *field, now)
                                .map(|transition| transition.direction),
                        };
                        (*field, view)
                    })
                    .collect();

                let view = SymbolView {
                    symbol: row.symbol.clone(),
                    reference: row.bounds.reference.clone(),
                    ceiling: row.bounds.ceiling.clone(),
                    floor: row.bounds.floor.clone(),
                    fields,
                };
                (row.symbol.clone(), view)
            })
            .collect()
    }

    pub fn row(&self, symbol: &str) -> Option<&SymbolRow> {
        self.rows.get(symbol)
    }

    /// Last rendered value for a cell, as seen by the transition tracker.
    pub fn previous_value(&self, symbol: &str, field: Field) -> Option<&DisplayValue> {
        self.previous.get(&(SmolStr::new(symbol), field))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Drop every row and previous value.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.previous.clear();
    }
}
