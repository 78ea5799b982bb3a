//! Document melting - reduce nested documents to relational rows
//!
//! This module turns one nested document into a flat row plus the array
//! fields that must become child tables, and decides which destination
//! table the row belongs to.

pub mod flatten;
pub mod naming;

pub use flatten::{ArrayElement, ArrayField, Flattened, Flattener, DEFAULT_ARRAY_THRESHOLD};
pub use naming::{default_naming_rules, NamingRule, TableNamer, DEFAULT_KEY_FIELD};
