//! Relational destination stores
//!
//! The exporter only talks to a [`RelationalStore`]. Two implementations
//! ship with the crate: [`SqliteStore`] for real exports and
//! [`MemoryStore`] for dry runs and tests.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::StoreResult;
use crate::schema::TableDef;
use crate::types::FlatRow;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOptions {
    /// Replace an existing row with the same primary key instead of failing
    pub replace_on_conflict: bool,
}

impl InsertOptions {
    pub fn replace() -> Self {
        InsertOptions {
            replace_on_conflict: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Remove every row, ignoring the conditions
    pub truncate: bool,
}

impl DeleteOptions {
    pub fn truncate() -> Self {
        DeleteOptions { truncate: true }
    }
}

/// Capabilities the exporter needs from a destination database
pub trait RelationalStore {
    /// The current definition of `name`, or `None` if the table does not exist
    fn table_def(&mut self, name: &str) -> StoreResult<Option<TableDef>>;

    /// Create `name` or alter it to match `def`
    fn set_table_def(&mut self, name: &str, def: &TableDef) -> StoreResult<()>;

    fn insert(&mut self, table: &str, row: &FlatRow, options: InsertOptions) -> StoreResult<()>;

    /// Delete rows whose columns equal every value in `conditions`.
    /// Returns the number of rows removed.
    fn delete(
        &mut self,
        table: &str,
        conditions: &FlatRow,
        options: DeleteOptions,
    ) -> StoreResult<u64>;
}

impl<S: RelationalStore + ?Sized> RelationalStore for &mut S {
    fn table_def(&mut self, name: &str) -> StoreResult<Option<TableDef>> {
        (**self).table_def(name)
    }

    fn set_table_def(&mut self, name: &str, def: &TableDef) -> StoreResult<()> {
        (**self).set_table_def(name, def)
    }

    fn insert(&mut self, table: &str, row: &FlatRow, options: InsertOptions) -> StoreResult<()> {
        (**self).insert(table, row, options)
    }

    fn delete(
        &mut self,
        table: &str,
        conditions: &FlatRow,
        options: DeleteOptions,
    ) -> StoreResult<u64> {
        (**self).delete(table, conditions, options)
    }
}

impl<S: RelationalStore + ?Sized> RelationalStore for Box<S> {
    fn table_def(&mut self, name: &str) -> StoreResult<Option<TableDef>> {
        (**self).table_def(name)
    }

    fn set_table_def(&mut self, name: &str, def: &TableDef) -> StoreResult<()> {
        (**self).set_table_def(name, def)
    }

    fn insert(&mut self, table: &str, row: &FlatRow, options: InsertOptions) -> StoreResult<()> {
        (**self).insert(table, row, options)
    }

    fn delete(
        &mut self,
        table: &str,
        conditions: &FlatRow,
        options: DeleteOptions,
    ) -> StoreResult<u64> {
        (**self).delete(table, conditions, options)
    }
}
