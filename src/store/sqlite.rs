//! SQLite destination store.
//!
//! Table definitions are read back from the database itself with
//! `PRAGMA table_info`, so repeated runs against the same file continue
//! from the schema the previous run left behind. New columns are added in
//! place; a retyped column or a changed primary key rebuilds the table.

use crate::error::{StoreError, StoreResult};
use crate::schema::{ColumnDef, TableDef, TypeTag};
use crate::store::{DeleteOptions, InsertOptions, RelationalStore};
use crate::types::{iso8601, FlatRow, Scalar};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Prefix of the scratch table used while rebuilding a table
const REBUILD_PREFIX: &str = "_docmelt_rebuild_";

pub struct SqliteStore {
    conn: Connection,
    /// Definitions last read from or written to the database
    known: HashMap<String, TableDef>,
    introspections: u64,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Ok(Self::with_connection(Connection::open(path)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::with_connection(Connection::open_in_memory()?))
    }

    fn with_connection(conn: Connection) -> Self {
        SqliteStore {
            conn,
            known: HashMap::new(),
            introspections: 0,
        }
    }

    /// Number of `PRAGMA table_info` queries issued
    pub fn introspections(&self) -> u64 {
        self.introspections
    }

    pub fn table_names(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Every row of `table` in insertion order
    pub fn rows(&self, table: &str) -> StoreResult<Vec<FlatRow>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {} ORDER BY rowid", quote_ident(table)))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let rows = stmt
            .query_map([], |row| {
                let mut flat = FlatRow::new();
                for (i, name) in columns.iter().enumerate() {
                    flat.insert(name.clone(), scalar_from_sql(row.get_ref(i)?));
                }
                Ok(flat)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn create_table(conn: &Connection, name: &str, def: &TableDef) -> StoreResult<()> {
        conn.execute_batch(&create_table_sql(name, def))?;
        Ok(())
    }

    fn table_exists(&self, name: &str) -> StoreResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// A scratch table name that is not in use
    fn staging_name(&self) -> StoreResult<String> {
        let mut n = 0u32;
        loop {
            let candidate = format!("{}{}", REBUILD_PREFIX, n);
            if !self.table_exists(&candidate)? {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    fn rebuild_table(&mut self, name: &str, current: &TableDef, def: &TableDef) -> StoreResult<()> {
        let staging = self.staging_name()?;
        let shared: Vec<String> = current
            .columns
            .keys()
            .filter(|c| def.columns.contains_key(*c))
            .map(|c| quote_ident(c))
            .collect();

        let tx = self.conn.transaction()?;
        Self::create_table(&tx, &staging, def)?;
        if !shared.is_empty() {
            let columns = shared.join(", ");
            tx.execute_batch(&format!(
                "INSERT OR REPLACE INTO {} ({}) SELECT {} FROM {};",
                quote_ident(&staging),
                columns,
                columns,
                quote_ident(name)
            ))?;
        }
        tx.execute_batch(&format!(
            "DROP TABLE {}; ALTER TABLE {} RENAME TO {};",
            quote_ident(name),
            quote_ident(&staging),
            quote_ident(name)
        ))?;
        tx.commit()?;
        Ok(())
    }

    /// Read a definition from the database and remember it
    fn introspect(&mut self, name: &str) -> StoreResult<Option<TableDef>> {
        self.introspections += 1;
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(name)))?;
        let infos = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    row.get::<_, bool>(3)?,
                    row.get::<_, i64>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if infos.is_empty() {
            self.known.remove(name);
            return Ok(None);
        }

        let mut def = TableDef::new();
        let mut pk: Vec<(i64, String)> = Vec::new();
        for (column, declared, not_null, pk_pos) in infos {
            let column_type: TypeTag =
                declared
                    .parse()
                    .map_err(|column_type| StoreError::UnsupportedColumnType {
                        table: name.to_string(),
                        column: column.clone(),
                        column_type,
                    })?;
            if pk_pos > 0 {
                pk.push((pk_pos, column.clone()));
            }
            def.columns.insert(
                column.clone(),
                ColumnDef {
                    name: column,
                    column_type,
                    required: not_null,
                },
            );
        }

        pk.sort();
        if !pk.is_empty() {
            def.primary_key = Some(pk.into_iter().map(|(_, c)| c).collect());
        }
        self.known.insert(name.to_string(), def.clone());
        Ok(Some(def))
    }

    /// The remembered definition of `name`, introspected on first use
    fn current_def(&mut self, name: &str) -> StoreResult<Option<TableDef>> {
        match self.known.get(name) {
            Some(def) => Ok(Some(def.clone())),
            None => self.introspect(name),
        }
    }

    fn apply_table_def(&mut self, name: &str, def: &TableDef) -> StoreResult<()> {
        let Some(current) = self.current_def(name)? else {
            debug!(table = name, "creating table");
            return Self::create_table(&self.conn, name, def);
        };

        let needs_rebuild = current.primary_key != def.primary_key
            || current.columns.iter().any(|(column, existing)| {
                def.columns.get(column).map_or(true, |wanted| {
                    wanted.column_type != existing.column_type || wanted.required != existing.required
                })
            });

        if needs_rebuild {
            debug!(table = name, "rebuilding table");
            return self.rebuild_table(name, &current, def);
        }

        for column in def.columns.values() {
            if !current.columns.contains_key(&column.name) {
                debug!(table = name, column = %column.name, column_type = %column.column_type, "adding column");
                self.conn.execute_batch(&format!(
                    "ALTER TABLE {} ADD COLUMN {};",
                    quote_ident(name),
                    column_sql(column)
                ))?;
            }
        }
        Ok(())
    }

    /// Remove the row a replacing insert would collide with when its key
    /// holds a NULL; SQLite never considers NULL keys equal
    fn remove_null_keyed(&mut self, table: &str, row: &FlatRow) -> StoreResult<()> {
        if !row.values().any(Scalar::is_null) {
            return Ok(());
        }
        let Some(pk) = self.current_def(table)?.and_then(|def| def.primary_key) else {
            return Ok(());
        };

        let key: FlatRow = pk
            .iter()
            .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
            .collect();
        if key.len() == pk.len() && key.values().any(Scalar::is_null) {
            self.delete(table, &key, DeleteOptions::default())?;
        }
        Ok(())
    }
}

impl RelationalStore for SqliteStore {
    fn table_def(&mut self, name: &str) -> StoreResult<Option<TableDef>> {
        self.introspect(name)
    }

    /// Uses the definition the last `table_def` call read, so a read
    /// followed by a write costs one introspection
    fn set_table_def(&mut self, name: &str, def: &TableDef) -> StoreResult<()> {
        match self.apply_table_def(name, def) {
            Ok(()) => {
                self.known.insert(name.to_string(), def.clone());
                Ok(())
            }
            Err(e) => {
                self.known.remove(name);
                Err(e)
            }
        }
    }

    fn insert(&mut self, table: &str, row: &FlatRow, options: InsertOptions) -> StoreResult<()> {
        let verb = if options.replace_on_conflict {
            "INSERT OR REPLACE"
        } else {
            "INSERT"
        };

        if options.replace_on_conflict {
            self.remove_null_keyed(table, row)?;
        }

        if row.is_empty() {
            self.conn
                .execute(&format!("{} INTO {} DEFAULT VALUES", verb, quote_ident(table)), [])?;
            return Ok(());
        }

        let columns: Vec<String> = row.keys().map(|c| quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=row.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "{} INTO {} ({}) VALUES ({})",
            verb,
            quote_ident(table),
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut stmt = self.conn.prepare_cached(&sql)?;
        stmt.execute(params_from_iter(row.values()))?;
        Ok(())
    }

    fn delete(
        &mut self,
        table: &str,
        conditions: &FlatRow,
        options: DeleteOptions,
    ) -> StoreResult<u64> {
        let removed = if options.truncate || conditions.is_empty() {
            self.conn
                .execute(&format!("DELETE FROM {}", quote_ident(table)), [])?
        } else {
            let clauses: Vec<String> = conditions
                .keys()
                .enumerate()
                .map(|(i, c)| format!("{} IS ?{}", quote_ident(c), i + 1))
                .collect();
            let sql = format!(
                "DELETE FROM {} WHERE {}",
                quote_ident(table),
                clauses.join(" AND ")
            );
            self.conn.execute(&sql, params_from_iter(conditions.values()))?
        };
        Ok(removed as u64)
    }
}

impl ToSql for Scalar {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Scalar::Null => ToSqlOutput::Owned(SqlValue::Null),
            Scalar::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Scalar::Int(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Scalar::Double(d) => ToSqlOutput::Owned(SqlValue::Real(*d)),
            Scalar::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Scalar::DateTime(dt) => ToSqlOutput::Owned(SqlValue::Text(iso8601(dt))),
            Scalar::ObjectId(id) => ToSqlOutput::Borrowed(ValueRef::Text(id.0.as_bytes())),
        })
    }
}

fn scalar_from_sql(value: ValueRef<'_>) -> Scalar {
    match value {
        ValueRef::Null => Scalar::Null,
        ValueRef::Integer(i) => Scalar::Int(i),
        ValueRef::Real(d) => Scalar::Double(d),
        ValueRef::Text(t) | ValueRef::Blob(t) => Scalar::String(String::from_utf8_lossy(t).into_owned()),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_sql(column: &ColumnDef) -> String {
    let mut sql = format!("{} {}", quote_ident(&column.name), column.column_type);
    if column.required {
        sql.push_str(" NOT NULL");
    }
    sql
}

fn create_table_sql(name: &str, def: &TableDef) -> String {
    let mut parts: Vec<String> = def.columns.values().map(column_sql).collect();
    if let Some(pk) = &def.primary_key {
        let columns: Vec<String> = pk.iter().map(|c| quote_ident(c)).collect();
        parts.push(format!("PRIMARY KEY ({})", columns.join(", ")));
    }
    format!("CREATE TABLE {} ({});", quote_ident(name), parts.join(", "))
}
