//! # docmelt - document store to relational export
//!
//! Melts schema-less, nested documents into a relational schema. Column types
//! are discovered and widened as rows arrive, nested arrays become child
//! tables keyed by `(_parentid, _index)`, and documents carrying a natural
//! key are routed to tables named after the key's shape.
//!
//! ## Modules
//!
//! - **melt**: Flatten documents and choose their destination table
//! - **schema**: Infer column types and evolve table definitions
//! - **export**: Drive a source through the pipeline into a store
//! - **source** / **store**: Document sources and relational destinations
//!
//! ## Quick Start
//!
//! ```rust
//! use docmelt::{ExportConfig, Exporter, MemoryCollection, MemorySource, MemoryStore};
//! use serde_json::json;
//!
//! # fn main() -> docmelt::Result<()> {
//! let source = MemorySource::new().with_collection(MemoryCollection::from_json(
//!     "users",
//!     vec![json!({"_id": "u1", "name": "Alice", "tags": ["rust", "json"]})],
//! ));
//!
//! let mut exporter = Exporter::new(MemoryStore::new(), ExportConfig::default())?;
//! let stats = exporter.run(&source)?;
//!
//! // users (_id, name, _num) and users__tags (_parentid, _index, tags, _num)
//! assert_eq!(stats.rows_written, 3);
//! # Ok(())
//! # }
//! ```

use std::path::Path;

pub mod config;
pub mod error;
pub mod export;
pub mod melt;
pub mod schema;
pub mod source;
pub mod store;
pub mod types;

// Re-export commonly used types for convenience
pub use config::ExportConfig;
pub use error::{Error, Result, StoreError};
pub use export::{ExportStats, Exporter, SkipReason};
pub use melt::{Flattener, NamingRule, TableNamer};
pub use schema::{SchemaEvolver, TableDef, TypeInferencer, TypeTag};
pub use source::{DocumentSource, JsonDirSource, MemoryCollection, MemorySource};
pub use store::{MemoryStore, RelationalStore, SqliteStore};
pub use types::{Document, FlatRow, Scalar, Value};

/// Main entry point: export a directory of JSON collections into `store`
pub fn export_json_dir<P: AsRef<Path>, S: RelationalStore>(
    dir: P,
    store: S,
    config: ExportConfig,
) -> Result<(S, ExportStats)> {
    let mut exporter = Exporter::new(store, config)?;
    let stats = exporter.run(&JsonDirSource::new(dir))?;
    Ok((exporter.into_store(), stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_export_json_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("objects.jsonl")).unwrap();
        writeln!(file, r#"{{"_id": "1", "_key": "user:1", "name": "Alice"}}"#).unwrap();
        writeln!(file, r#"{{"_id": "2", "_key": "tag:rust:topics", "tids": [4, 8]}}"#).unwrap();

        let (store, stats) =
            export_json_dir(dir.path(), MemoryStore::new(), ExportConfig::default()).unwrap();

        assert_eq!(stats.documents, 2);
        assert_eq!(
            store.table_names(),
            vec!["tag_topics", "tag_topics__tids", "user"]
        );
        assert_eq!(store.rows("tag_topics__tids")[1]["tids"], Scalar::Int(8));
    }
}
