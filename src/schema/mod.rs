//! Relational schema discovery
//!
//! This module infers column types from scalar values, widens conflicting
//! guesses, and evolves destination table definitions as new rows arrive.

pub mod evolve;
pub mod inference;
pub mod types;

pub use evolve::SchemaEvolver;
pub use inference::{widen, TypeInferencer, DEFAULT_MAX_VARCHAR_LENGTH};
pub use types::{ColumnDef, TableDef, TypeTag};
