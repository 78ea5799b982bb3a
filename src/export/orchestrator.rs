use crate::config::ExportConfig;
use crate::error::Result;
use crate::export::progress::ProgressTracker;
use crate::melt::{Flattener, TableNamer};
use crate::schema::types::{ID_COLUMN, NUM_COLUMN};
use crate::schema::{SchemaEvolver, TypeInferencer};
use crate::source::{Collection, DocumentSource};
use crate::store::{DeleteOptions, InsertOptions, RelationalStore};
use crate::types::{Document, FlatRow, Scalar};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Why a row was discarded without failing the export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The destination table is on the configured skip-list
    SkipListed,
    /// Data-only mode and the destination table does not exist
    MissingTable,
    /// The row has more attributes than `max_columns`
    TooManyColumns,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::SkipListed => write!(f, "skip-listed"),
            SkipReason::MissingTable => write!(f, "missing table"),
            SkipReason::TooManyColumns => write!(f, "too many columns"),
        }
    }
}

/// Counters for one export run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportStats {
    pub documents: u64,
    pub rows_written: u64,
    pub skipped_listed: u64,
    pub skipped_missing: u64,
    pub skipped_wide: u64,
    /// Rows written per destination table
    pub tables: BTreeMap<String, u64>,
}

impl ExportStats {
    fn record_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::SkipListed => self.skipped_listed += 1,
            SkipReason::MissingTable => self.skipped_missing += 1,
            SkipReason::TooManyColumns => self.skipped_wide += 1,
        }
    }

    pub fn skipped(&self) -> u64 {
        self.skipped_listed + self.skipped_missing + self.skipped_wide
    }
}

/// Drives documents from a source through naming, flattening and schema
/// evolution into a relational store.
///
/// All per-run state (row sequences, missing and truncated tables, the key
/// tally and statistics) lives here and is reset by [`Exporter::run`].
pub struct Exporter<S: RelationalStore> {
    store: S,
    config: ExportConfig,
    namer: TableNamer,
    flattener: Flattener,
    evolver: SchemaEvolver,
    sequences: HashMap<String, u64>,
    missing_tables: HashSet<String>,
    truncated: HashSet<String>,
    stats: ExportStats,
}

impl<S: RelationalStore> Exporter<S> {
    pub fn new(store: S, config: ExportConfig) -> Result<Self> {
        config.validate()?;
        let namer = TableNamer::new(config.key_field.clone(), &config.naming_rules)?;
        let flattener = Flattener::new(config.array_threshold);
        let evolver = SchemaEvolver::new(TypeInferencer::new(config.max_varchar_length));

        Ok(Exporter {
            store,
            config,
            namer,
            flattener,
            evolver,
            sequences: HashMap::new(),
            missing_tables: HashSet::new(),
            truncated: HashSet::new(),
            stats: ExportStats::default(),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn stats(&self) -> &ExportStats {
        &self.stats
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Natural key tally of the current run
    pub fn key_frequencies(&self) -> &BTreeMap<String, u64> {
        self.namer.key_frequencies()
    }

    /// Export every wanted collection of `source`
    pub fn run(&mut self, source: &dyn DocumentSource) -> Result<ExportStats> {
        self.reset();

        for collection in source.collections()? {
            if !self.config.wants_collection(collection.name()) {
                debug!(collection = collection.name(), "collection not selected");
                continue;
            }
            self.export_collection(collection.as_ref())?;
        }

        for (key, count) in self.namer.key_frequencies() {
            debug!(key = key.as_str(), count, "natural key");
        }
        info!(
            documents = self.stats.documents,
            rows = self.stats.rows_written,
            skipped = self.stats.skipped(),
            tables = self.stats.tables.len(),
            "export finished"
        );

        Ok(self.stats.clone())
    }

    fn reset(&mut self) {
        self.sequences.clear();
        self.missing_tables.clear();
        self.truncated.clear();
        self.namer.reset();
        self.stats = ExportStats::default();
    }

    /// Export the documents of one collection, at most `limit` of them
    pub fn export_collection(&mut self, collection: &dyn Collection) -> Result<()> {
        let name = collection.name().to_string();
        let mut total = collection.count()?;
        if let Some(limit) = self.config.document_limit() {
            total = total.min(limit);
        }
        info!(collection = name.as_str(), total, "exporting collection");

        let rows_before = self.stats.rows_written;
        let skipped_before = self.stats.skipped();
        let mut tracker = ProgressTracker::new(total, self.config.progress_interval(), Instant::now());
        let mut processed = 0;

        for doc in collection.find(self.config.document_limit())? {
            self.export_document(doc?, &name)?;
            processed += 1;
            self.stats.documents += 1;

            if let Some(report) = tracker.observe(processed, Instant::now()) {
                info!(collection = name.as_str(), "{}", report);
            }
        }

        info!(
            collection = name.as_str(),
            documents = processed,
            rows = self.stats.rows_written - rows_before,
            skipped = self.stats.skipped() - skipped_before,
            "collection done"
        );
        Ok(())
    }

    fn export_document(&mut self, doc: Document, collection: &str) -> Result<()> {
        let table = self.namer.resolve(&doc, collection);
        let flattened = self.flattener.flatten(doc);

        if let Some(reason) = self.admit(&table)? {
            self.skip(&table, reason);
            return Ok(());
        }

        let parent_id = flattened
            .row
            .get(ID_COLUMN)
            .cloned()
            .unwrap_or(Scalar::Null);

        for field in flattened.arrays {
            let child = format!("{}__{}", table, field.name);
            for element in field.elements {
                let Some(row) = self.flattener.element_row(&parent_id, &field.name, element) else {
                    debug!(table = child.as_str(), "dropping nested array element");
                    continue;
                };
                if let Some(reason) = self.admit(&child)? {
                    self.skip(&child, reason);
                    continue;
                }
                self.write_row(&child, row)?;
            }
        }

        self.write_row(&table, flattened.row)
    }

    /// Decide whether rows may go to `table`. In data-only mode the first
    /// admitted row of a table truncates it.
    fn admit(&mut self, table: &str) -> Result<Option<SkipReason>> {
        if self.config.is_skipped(table) {
            return Ok(Some(SkipReason::SkipListed));
        }
        if !self.config.data_only || self.truncated.contains(table) {
            return Ok(None);
        }
        if self.missing_tables.contains(table) {
            return Ok(Some(SkipReason::MissingTable));
        }

        if self.store.table_def(table)?.is_none() {
            warn!(table, "table does not exist, its rows will be skipped");
            self.missing_tables.insert(table.to_string());
            return Ok(Some(SkipReason::MissingTable));
        }

        let removed = self
            .store
            .delete(table, &FlatRow::new(), DeleteOptions::truncate())?;
        debug!(table, removed, "truncated before load");
        self.truncated.insert(table.to_string());
        Ok(None)
    }

    fn skip(&mut self, table: &str, reason: SkipReason) {
        debug!(table, %reason, "skipping row");
        self.stats.record_skip(reason);
    }

    fn write_row(&mut self, table: &str, mut row: FlatRow) -> Result<()> {
        if row.len() > self.config.max_columns {
            self.skip(table, SkipReason::TooManyColumns);
            return Ok(());
        }

        let seq = self.sequences.entry(table.to_string()).or_insert(0);
        *seq += 1;
        row.insert(NUM_COLUMN.to_string(), Scalar::Int(*seq as i64));

        if !self.config.data_only {
            self.evolver.ensure_structure(&mut self.store, table, &row)?;
        }
        self.store.insert(table, &row, InsertOptions::replace())?;

        self.stats.rows_written += 1;
        *self.stats.tables.entry(table.to_string()).or_insert(0) += 1;
        Ok(())
    }
}
