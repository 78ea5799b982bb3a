//! Document sources
//!
//! A source lists collections; a collection counts and streams its
//! documents. Documents arrive fully resolved into [`crate::types::Value`]s.

pub mod json_dir;
pub mod memory;

pub use json_dir::{JsonDirSource, JsonFileCollection};
pub use memory::{MemoryCollection, MemorySource};

use crate::error::Result;
use crate::types::Document;

/// A cursor over the documents of one collection
pub type DocumentCursor<'a> = Box<dyn Iterator<Item = Result<Document>> + 'a>;

pub trait Collection {
    fn name(&self) -> &str;

    /// Total number of documents in the collection
    fn count(&self) -> Result<u64>;

    /// Stream documents, at most `limit` of them when given
    fn find(&self, limit: Option<u64>) -> Result<DocumentCursor<'_>>;
}

impl<C: Collection + ?Sized> Collection for &C {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn count(&self) -> Result<u64> {
        (**self).count()
    }

    fn find(&self, limit: Option<u64>) -> Result<DocumentCursor<'_>> {
        (**self).find(limit)
    }
}

pub trait DocumentSource {
    fn collections(&self) -> Result<Vec<Box<dyn Collection + '_>>>;
}

fn bounded<'a>(cursor: DocumentCursor<'a>, limit: Option<u64>) -> DocumentCursor<'a> {
    match limit {
        Some(n) => Box::new(cursor.take(usize::try_from(n).unwrap_or(usize::MAX))),
        None => cursor,
    }
}
