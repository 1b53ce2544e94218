//! Store-agnostic types and traits used by the copy engine.
//!
//! - [`schema`]: qualified table names and column metadata
//! - [`value`]: untyped cell values
//! - [`identifier`]: identifier validation and quoting
//! - [`traits`]: the source/target seams the engine is written against

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use identifier::QuoteMode;
pub use schema::{Column, QualifiedName, TableDefinition};
pub use traits::{BatchWriter, InsertOutcome, RowSink, SourceStore, TargetStore};
pub use value::{Row, SqlValue};
