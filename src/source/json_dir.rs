//! A directory of JSON files as a document source.
//!
//! Each `*.json`, `*.jsonl` or `*.ndjson` file is one collection, named by
//! its file stem. `.json` files may hold an array of documents or a single
//! document and are parsed with simd-json, falling back to one document per
//! line. `.jsonl` / `.ndjson` files are streamed line by line.

use crate::error::{Error, Result};
use crate::source::{bounded, Collection, DocumentCursor, DocumentSource};
use crate::types::{document_from_json, Document};
use serde_json::Value as JsonValue;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::warn;

const EXTENSIONS: [&str; 3] = ["json", "jsonl", "ndjson"];

#[derive(Debug, Clone)]
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        JsonDirSource {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl DocumentSource for JsonDirSource {
    fn collections(&self) -> Result<Vec<Box<dyn Collection + '_>>> {
        let io_err = |source| Error::SourceIo {
            path: self.dir.clone(),
            source,
        };

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            let supported = path
                .extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| EXTENSIONS.contains(&e));
            if path.is_file() && supported {
                files.push(path);
            }
        }
        files.sort();

        Ok(files
            .into_iter()
            .map(|path| Box::new(JsonFileCollection::new(path)) as Box<dyn Collection>)
            .collect())
    }
}

/// One JSON or newline-delimited JSON file
#[derive(Debug, Clone)]
pub struct JsonFileCollection {
    name: String,
    path: PathBuf,
}

impl JsonFileCollection {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        JsonFileCollection { name, path }
    }

    fn is_line_delimited(&self) -> bool {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e != "json")
    }

    fn open(&self) -> Result<File> {
        File::open(&self.path).map_err(|source| Error::SourceIo {
            path: self.path.clone(),
            source,
        })
    }

    /// Parse a whole `.json` file into its top-level values
    fn read_values(&self) -> Result<Vec<JsonValue>> {
        let content = std::fs::read(&self.path).map_err(|source| Error::SourceIo {
            path: self.path.clone(),
            source,
        })?;

        // simd-json rewrites its input while parsing; keep the original for the fallback
        let mut scratch = content.clone();
        match simd_json::serde::from_slice::<JsonValue>(&mut scratch) {
            Ok(JsonValue::Array(items)) => Ok(items),
            Ok(single) => Ok(vec![single]),
            Err(_) => parse_lines(&self.path, &String::from_utf8_lossy(&content)),
        }
    }
}

impl Collection for JsonFileCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn count(&self) -> Result<u64> {
        if self.is_line_delimited() {
            let mut count = 0;
            for line in BufReader::new(self.open()?).lines() {
                let line = line.map_err(|source| Error::SourceIo {
                    path: self.path.clone(),
                    source,
                })?;
                if !line.trim().is_empty() {
                    count += 1;
                }
            }
            Ok(count)
        } else {
            Ok(self.read_values()?.len() as u64)
        }
    }

    fn find(&self, limit: Option<u64>) -> Result<DocumentCursor<'_>> {
        let cursor: DocumentCursor<'_> = if self.is_line_delimited() {
            let path = self.path.clone();
            let lines = BufReader::new(self.open()?).lines().enumerate();
            Box::new(lines.filter_map(move |(i, line)| {
                let line = match line {
                    Ok(line) => line,
                    Err(source) => {
                        return Some(Err(Error::SourceIo {
                            path: path.clone(),
                            source,
                        }))
                    }
                };
                if line.trim().is_empty() {
                    return None;
                }
                match serde_json::from_str::<JsonValue>(line.trim()) {
                    Ok(value) => to_document(&path, value).map(Ok),
                    Err(source) => Some(Err(Error::SourceParse {
                        path: path.clone(),
                        line: i + 1,
                        source,
                    })),
                }
            }))
        } else {
            let path = self.path.clone();
            let values = self.read_values()?;
            Box::new(
                values
                    .into_iter()
                    .filter_map(move |value| to_document(&path, value).map(Ok)),
            )
        };

        Ok(bounded(cursor, limit))
    }
}

fn parse_lines(path: &Path, content: &str) -> Result<Vec<JsonValue>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line.trim()).map_err(|source| Error::SourceParse {
                path: path.to_path_buf(),
                line: i + 1,
                source,
            })
        })
        .collect()
}

fn to_document(path: &Path, value: JsonValue) -> Option<Document> {
    let doc = document_from_json(value);
    if doc.is_none() {
        warn!(path = %path.display(), "skipping top-level value that is not an object");
    }
    doc
}
