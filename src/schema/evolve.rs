use crate::error::Result;
use crate::schema::inference::{widen, TypeInferencer};
use crate::schema::types::{ColumnDef, TableDef};
use crate::store::RelationalStore;
use crate::types::FlatRow;
use tracing::debug;

/// Keeps destination table definitions wide enough for every row written
#[derive(Debug, Clone, Default)]
pub struct SchemaEvolver {
    inferencer: TypeInferencer,
}

impl SchemaEvolver {
    pub fn new(inferencer: TypeInferencer) -> Self {
        SchemaEvolver { inferencer }
    }

    /// Compute the definition `existing` must become to hold `row`.
    ///
    /// Returns `None` when the row adds no column and changes no type.
    pub fn evolve(&self, existing: Option<TableDef>, row: &FlatRow) -> Result<Option<TableDef>> {
        let mut def = existing.unwrap_or_default();
        let mut changed = false;

        for (name, value) in row {
            let guessed = self
                .inferencer
                .guess(value)
                .map_err(|e| e.with_context(name, row))?;

            match def.columns.get_mut(name) {
                None => {
                    def.columns
                        .insert(name.clone(), ColumnDef::new(name.clone(), guessed));
                    changed = true;
                }
                Some(column) if column.column_type != guessed => {
                    let widened = widen(column.column_type, guessed);
                    if widened != column.column_type {
                        column.column_type = widened;
                        changed = true;
                    }
                }
                Some(_) => {}
            }
        }

        if !changed {
            return Ok(None);
        }

        def.primary_key = def.derive_primary_key();
        Ok(Some(def))
    }

    /// Make sure `table` can hold `row`, writing the new definition through
    /// the store when anything changed. Returns whether a write happened.
    pub fn ensure_structure<S: RelationalStore + ?Sized>(
        &self,
        store: &mut S,
        table: &str,
        row: &FlatRow,
    ) -> Result<bool> {
        let existing = store.table_def(table)?;
        let created = existing.is_none();

        match self.evolve(existing, row)? {
            Some(def) => {
                debug!(table, created, columns = def.columns.len(), "updating table definition");
                store.set_table_def(table, &def)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::schema::types::TypeTag;
    use crate::store::MemoryStore;
    use crate::types::{ObjectId, Scalar};

    fn row(pairs: &[(&str, Scalar)]) -> FlatRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_creates_table_with_id_primary_key() {
        let evolver = SchemaEvolver::default();
        let mut store = MemoryStore::new();

        let r = row(&[
            ("_id", Scalar::ObjectId(ObjectId::new("507f1f77bcf86cd799439011"))),
            ("name", Scalar::from("Alice")),
            ("age", Scalar::Int(30)),
        ]);
        assert!(evolver.ensure_structure(&mut store, "users", &r).unwrap());

        let def = store.table_def("users").unwrap().unwrap();
        assert_eq!(def.column_type("_id"), Some(TypeTag::Varchar(24)));
        assert_eq!(def.column_type("name"), Some(TypeTag::Varchar(50)));
        assert_eq!(def.column_type("age"), Some(TypeTag::Int));
        assert_eq!(def.primary_key, Some(vec!["_id".to_string()]));
        assert!(def.columns.values().all(|c| !c.required));
    }

    #[test]
    fn test_child_table_composite_key() {
        let evolver = SchemaEvolver::default();
        let r = row(&[
            ("_parentid", Scalar::from("p1")),
            ("_index", Scalar::Int(0)),
            ("tags", Scalar::from("rust")),
        ]);

        let def = evolver.evolve(None, &r).unwrap().unwrap();
        assert_eq!(
            def.primary_key,
            Some(vec!["_parentid".to_string(), "_index".to_string()])
        );
    }

    #[test]
    fn test_widens_existing_columns() {
        let evolver = SchemaEvolver::default();
        let mut store = MemoryStore::new();

        evolver
            .ensure_structure(&mut store, "t", &row(&[("n", Scalar::Int(1))]))
            .unwrap();
        evolver
            .ensure_structure(&mut store, "t", &row(&[("n", Scalar::Double(1.5))]))
            .unwrap();
        assert_eq!(
            store.table_def("t").unwrap().unwrap().column_type("n"),
            Some(TypeTag::Double)
        );

        // Narrower values never shrink the column again
        let changed = evolver
            .ensure_structure(&mut store, "t", &row(&[("n", Scalar::Int(2))]))
            .unwrap();
        assert!(!changed);
        assert_eq!(
            store.table_def("t").unwrap().unwrap().column_type("n"),
            Some(TypeTag::Double)
        );
    }

    #[test]
    fn test_retype_alone_triggers_write() {
        let evolver = SchemaEvolver::default();
        let mut store = MemoryStore::new();

        evolver
            .ensure_structure(&mut store, "t", &row(&[("s", Scalar::from("short"))]))
            .unwrap();
        let long = "x".repeat(80);
        assert!(evolver
            .ensure_structure(&mut store, "t", &row(&[("s", Scalar::String(long))]))
            .unwrap());
        assert_eq!(
            store.table_def("t").unwrap().unwrap().column_type("s"),
            Some(TypeTag::Varchar(100))
        );
    }

    #[test]
    fn test_unchanged_row_is_one_read_no_write() {
        let evolver = SchemaEvolver::default();
        let mut store = MemoryStore::new();
        let r = row(&[("a", Scalar::Int(1)), ("b", Scalar::from("x"))]);

        evolver.ensure_structure(&mut store, "t", &r).unwrap();
        let (reads, writes) = (store.def_reads(), store.def_writes());
        assert_eq!((reads, writes), (1, 1));

        assert!(!evolver.ensure_structure(&mut store, "t", &r).unwrap());
        assert_eq!(store.def_reads(), reads + 1);
        assert_eq!(store.def_writes(), writes);
    }

    #[test]
    fn test_unknown_type_carries_field_and_row() {
        let evolver = SchemaEvolver::default();
        let r = row(&[("flag", Scalar::Bool(false))]);

        match evolver.evolve(None, &r) {
            Err(Error::UnknownType { value, field, row }) => {
                assert_eq!(value, "false");
                assert_eq!(field.as_deref(), Some("flag"));
                assert!(row.unwrap().contains("\"flag\""));
            }
            other => panic!("expected UnknownType, got {:?}", other),
        }
    }
}
