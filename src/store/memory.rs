use crate::error::{StoreError, StoreResult};
use crate::schema::TableDef;
use crate::store::{DeleteOptions, InsertOptions, RelationalStore};
use crate::types::{FlatRow, Scalar};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    def: TableDef,
    rows: Vec<FlatRow>,
}

/// A relational store held entirely in memory.
///
/// Rows are checked against the table definition the way a real database
/// would: unknown tables and columns are rejected, and primary keys are
/// unique.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, MemoryTable>,
    def_reads: u64,
    def_writes: u64,
    truncations: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows currently stored in `table`, in insertion order
    pub fn rows(&self, table: &str) -> &[FlatRow] {
        self.tables
            .get(table)
            .map(|t| t.rows.as_slice())
            .unwrap_or(&[])
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Every table definition, keyed by table name
    pub fn definitions(&self) -> BTreeMap<String, TableDef> {
        self.tables
            .iter()
            .map(|(name, t)| (name.clone(), t.def.clone()))
            .collect()
    }

    /// Number of `table_def` calls served
    pub fn def_reads(&self) -> u64 {
        self.def_reads
    }

    /// Number of `set_table_def` calls served
    pub fn def_writes(&self) -> u64 {
        self.def_writes
    }

    pub fn truncations(&self) -> u64 {
        self.truncations
    }
}

fn key_of(row: &FlatRow, pk: &[String]) -> Option<Vec<Scalar>> {
    pk.iter().map(|c| row.get(c).cloned()).collect()
}

fn matches(row: &FlatRow, conditions: &FlatRow) -> bool {
    conditions
        .iter()
        .all(|(column, value)| row.get(column) == Some(value))
}

impl RelationalStore for MemoryStore {
    fn table_def(&mut self, name: &str) -> StoreResult<Option<TableDef>> {
        self.def_reads += 1;
        Ok(self.tables.get(name).map(|t| t.def.clone()))
    }

    fn set_table_def(&mut self, name: &str, def: &TableDef) -> StoreResult<()> {
        self.def_writes += 1;
        self.tables.entry(name.to_string()).or_default().def = def.clone();
        Ok(())
    }

    fn insert(&mut self, table: &str, row: &FlatRow, options: InsertOptions) -> StoreResult<()> {
        let entry = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::MissingTable(table.to_string()))?;

        if let Some(column) = row.keys().find(|c| !entry.def.columns.contains_key(*c)) {
            return Err(StoreError::UnknownColumn {
                table: table.to_string(),
                column: column.clone(),
            });
        }

        let key = entry
            .def
            .primary_key
            .as_deref()
            .and_then(|pk| key_of(row, pk).map(|k| (pk.to_vec(), k)));

        if let Some((pk, key)) = key {
            let existing = entry
                .rows
                .iter()
                .position(|r| key_of(r, &pk).as_ref() == Some(&key));

            if let Some(pos) = existing {
                if !options.replace_on_conflict {
                    return Err(StoreError::DuplicateKey {
                        table: table.to_string(),
                        key: key
                            .iter()
                            .map(|s| s.to_string())
                            .collect::<Vec<_>>()
                            .join(", "),
                    });
                }
                entry.rows[pos] = row.clone();
                return Ok(());
            }
        }

        entry.rows.push(row.clone());
        Ok(())
    }

    fn delete(
        &mut self,
        table: &str,
        conditions: &FlatRow,
        options: DeleteOptions,
    ) -> StoreResult<u64> {
        let entry = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::MissingTable(table.to_string()))?;

        let before = entry.rows.len();
        if options.truncate {
            self.truncations += 1;
            entry.rows.clear();
        } else {
            entry.rows.retain(|r| !matches(r, conditions));
        }
        Ok((before - entry.rows.len()) as u64)
    }
}
