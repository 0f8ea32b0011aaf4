//! Board data model: exchanges, view selections, fields and raw snapshot records.

pub mod exchange;
pub mod field;
pub mod record;

pub use exchange::{Exchange, ParseExchangeError, PushEvent, ViewMode, ViewSelection};
pub use field::{Field, FieldKind};
pub use record::{RawValue, SymbolRecord, parse_number};
