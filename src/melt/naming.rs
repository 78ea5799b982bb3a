//! Destination table naming
//!
//! Documents that carry a natural key (`_key` by default) are routed to a
//! table named after the key's shape rather than its source collection.
//! The key is normalized by an ordered list of regex rules that collapse
//! per-record parts of the key (ids, free-form names) into one name.

use crate::error::{Error, Result};
use crate::types::{Document, Value};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_KEY_FIELD: &str = "_key";

/// A `(pattern, replacement)` rewrite applied to natural keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingRule {
    pub pattern: String,
    pub replacement: String,
}

impl NamingRule {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        NamingRule {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

/// Rules for `type:id:relation` style keys, most specific first
pub fn default_naming_rules() -> Vec<NamingRule> {
    vec![
        NamingRule::new(r"^tag:[^:]+:", "tag:#:"),
        NamingRule::new(r"\d+", "#"),
        NamingRule::new(r"[:#]+", "_"),
        NamingRule::new(r"^_+|_+$", ""),
    ]
}

#[derive(Debug, Clone)]
pub struct TableNamer {
    key_field: String,
    rules: Vec<(Regex, String)>,
    frequencies: BTreeMap<String, u64>,
}

impl TableNamer {
    pub fn new(key_field: impl Into<String>, rules: &[NamingRule]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|re| (re, rule.replacement.clone()))
                    .map_err(|source| Error::InvalidRule {
                        pattern: rule.pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TableNamer {
            key_field: key_field.into(),
            rules,
            frequencies: BTreeMap::new(),
        })
    }

    /// Apply every rule in order
    pub fn normalize(&self, key: &str) -> String {
        self.rules
            .iter()
            .fold(key.to_string(), |acc, (re, replacement)| {
                re.replace_all(&acc, replacement.as_str()).into_owned()
            })
    }

    /// Pick the destination table for `doc`, falling back to `collection`
    /// when there is no natural key or it normalizes to nothing usable
    pub fn resolve(&mut self, doc: &Document, collection: &str) -> String {
        let raw = match doc.get(&self.key_field) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Int(i)) => i.to_string(),
            _ => return collection.to_string(),
        };

        let key = self.normalize(&raw);
        *self.frequencies.entry(key.clone()).or_insert(0) += 1;

        if key.is_empty() || is_numeric(&key) {
            collection.to_string()
        } else {
            key
        }
    }

    /// How many documents produced each normalized key since the last reset
    pub fn key_frequencies(&self) -> &BTreeMap<String, u64> {
        &self.frequencies
    }

    pub fn reset(&mut self) {
        self.frequencies.clear();
    }
}

fn is_numeric(s: &str) -> bool {
    s.bytes().any(|b| b.is_ascii_digit()) && s.trim().parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::document_from_json;
    use serde_json::json;

    fn namer() -> TableNamer {
        TableNamer::new(DEFAULT_KEY_FIELD, &default_naming_rules()).unwrap()
    }

    fn keyed(key: serde_json::Value) -> Document {
        document_from_json(json!({"_key": key, "value": 1})).unwrap()
    }

    #[test]
    fn test_default_rules() {
        let namer = namer();
        assert_eq!(namer.normalize("tag:abc:topics"), "tag_topics");
        assert_eq!(
            namer.normalize("group:55:privileges:members"),
            "group_privileges_members"
        );
        assert_eq!(namer.normalize("uid:12:followed_tids"), "uid_followed_tids");
        assert_eq!(namer.normalize("user:3"), "user");
        assert_eq!(namer.normalize("cid:1:tids:pinned"), "cid_tids_pinned");
    }

    #[test]
    fn test_resolve_uses_key_or_collection() {
        let mut namer = namer();
        assert_eq!(namer.resolve(&keyed(json!("tag:abc:topics")), "objects"), "tag_topics");
        assert_eq!(
            namer.resolve(&document_from_json(json!({"name": "x"})).unwrap(), "objects"),
            "objects"
        );
        assert_eq!(namer.resolve(&keyed(json!({"nested": true})), "objects"), "objects");
    }

    #[test]
    fn test_numeric_or_empty_keys_fall_back() {
        let mut namer = TableNamer::new("_key", &[NamingRule::new(r":", "_")]).unwrap();
        assert_eq!(namer.resolve(&keyed(json!("12345")), "objects"), "objects");
        assert_eq!(namer.resolve(&keyed(json!(42)), "objects"), "objects");
        assert_eq!(namer.resolve(&keyed(json!("1.5")), "objects"), "objects");
        assert_eq!(namer.resolve(&keyed(json!("")), "objects"), "objects");
        assert_eq!(namer.resolve(&keyed(json!("nan")), "objects"), "nan");

        // With the default rules a numeric key collapses to nothing
        let mut defaults = super::tests::namer();
        assert_eq!(defaults.resolve(&keyed(json!("12345")), "objects"), "objects");
    }

    #[test]
    fn test_frequencies_are_tallied() {
        let mut namer = namer();
        for key in ["user:1", "user:2", "tag:x:topics"] {
            namer.resolve(&keyed(json!(key)), "objects");
        }
        assert_eq!(namer.key_frequencies().get("user"), Some(&2));
        assert_eq!(namer.key_frequencies().get("tag_topics"), Some(&1));

        namer.reset();
        assert!(namer.key_frequencies().is_empty());
    }

    #[test]
    fn test_custom_key_field_and_rules() {
        let rules = vec![NamingRule::new(r"^(\w+)/.*$", "$1")];
        let mut namer = TableNamer::new("path", &rules).unwrap();
        let doc = document_from_json(json!({"path": "orders/2020/1"})).unwrap();
        assert_eq!(namer.resolve(&doc, "docs"), "orders");
    }

    #[test]
    fn test_invalid_rule_is_rejected() {
        let err = TableNamer::new("_key", &[NamingRule::new("(unclosed", "")]).unwrap_err();
        assert!(matches!(err, Error::InvalidRule { ref pattern, .. } if pattern == "(unclosed"));
    }
}
