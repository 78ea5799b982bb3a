use crate::error::Result;
use crate::source::{bounded, Collection, DocumentCursor, DocumentSource};
use crate::types::{document_from_json, Document};
use serde_json::Value as JsonValue;

/// A collection held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryCollection {
    name: String,
    documents: Vec<Document>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>, documents: Vec<Document>) -> Self {
        MemoryCollection {
            name: name.into(),
            documents,
        }
    }

    /// Build a collection from JSON objects; anything that is not an object is dropped
    pub fn from_json(name: impl Into<String>, values: Vec<JsonValue>) -> Self {
        Self::new(name, values.into_iter().filter_map(document_from_json).collect())
    }
}

impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn count(&self) -> Result<u64> {
        Ok(self.documents.len() as u64)
    }

    fn find(&self, limit: Option<u64>) -> Result<DocumentCursor<'_>> {
        Ok(bounded(
            Box::new(self.documents.iter().cloned().map(Ok)),
            limit,
        ))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    collections: Vec<MemoryCollection>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, collection: MemoryCollection) -> Self {
        self.collections.push(collection);
        self
    }
}

impl DocumentSource for MemorySource {
    fn collections(&self) -> Result<Vec<Box<dyn Collection + '_>>> {
        Ok(self
            .collections
            .iter()
            .map(|c| Box::new(c) as Box<dyn Collection + '_>)
            .collect())
    }
}
