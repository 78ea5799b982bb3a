use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;

/// A nested source document, keyed by field name
pub type Document = BTreeMap<String, Value>;

/// A flattened row: unique column name to scalar value
pub type FlatRow = BTreeMap<String, Scalar>;

/// A 12-byte document identifier, kept in its 24 character hex form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        ObjectId(id.into())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Every value kind a source document can hold.
///
/// Source-specific encodings (such as extended JSON `$oid` / `$date`
/// wrappers) are resolved into these variants once, when the document is
/// read, so nothing downstream has to sniff raw values.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    DateTime(DateTime<Utc>),
    ObjectId(ObjectId),
    Array(Vec<Value>),
    Document(Document),
}

/// The non-container subset of [`Value`]; what a relational column can hold
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    DateTime(DateTime<Utc>),
    ObjectId(ObjectId),
}

impl Value {
    /// The scalar form of this value, or `None` for arrays and documents
    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Int(i) => Some(Scalar::Int(*i)),
            Value::Double(d) => Some(Scalar::Double(*d)),
            Value::String(s) => Some(Scalar::String(s.clone())),
            Value::DateTime(dt) => Some(Scalar::DateTime(*dt)),
            Value::ObjectId(id) => Some(Scalar::ObjectId(id.clone())),
            Value::Array(_) | Value::Document(_) => None,
        }
    }

    /// Convert parsed JSON into a document value, resolving extended JSON
    /// wrappers (`$oid`, `$date`, `$numberLong`, `$numberInt`, `$numberDouble`).
    pub fn from_json(value: JsonValue) -> Value {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(arr) => Value::Array(arr.into_iter().map(Value::from_json).collect()),
            JsonValue::Object(obj) => match extended_json(&obj) {
                Some(value) => value,
                None => Value::Document(
                    obj.into_iter()
                        .map(|(k, v)| (k, Value::from_json(v)))
                        .collect(),
                ),
            },
        }
    }

    /// Render back to plain JSON, used for diagnostics
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Array(arr) => JsonValue::Array(arr.iter().map(Value::to_json).collect()),
            Value::Document(doc) => JsonValue::Object(
                doc.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            other => other
                .as_scalar()
                .map(|s| s.to_json())
                .unwrap_or(JsonValue::Null),
        }
    }
}

/// Convert a JSON object into a document; anything else is rejected
pub fn document_from_json(value: JsonValue) -> Option<Document> {
    match Value::from_json(value) {
        Value::Document(doc) => Some(doc),
        _ => None,
    }
}

fn extended_json(obj: &Map<String, JsonValue>) -> Option<Value> {
    if obj.len() != 1 {
        return None;
    }
    let (key, inner) = obj.iter().next()?;

    match (key.as_str(), inner) {
        ("$oid", JsonValue::String(s)) => Some(Value::ObjectId(ObjectId::new(s.clone()))),
        ("$date", JsonValue::String(s)) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| Value::DateTime(dt.with_timezone(&Utc))),
        ("$date", JsonValue::Number(n)) => n.as_i64().and_then(millis_to_datetime),
        ("$date", JsonValue::Object(wrapped)) => match wrapped.get("$numberLong") {
            Some(JsonValue::String(s)) if wrapped.len() == 1 => {
                s.parse::<i64>().ok().and_then(millis_to_datetime)
            }
            _ => None,
        },
        ("$numberLong" | "$numberInt", JsonValue::String(s)) => s.parse::<i64>().ok().map(Value::Int),
        ("$numberDouble", JsonValue::String(s)) => s.parse::<f64>().ok().map(Value::Double),
        _ => None,
    }
}

fn millis_to_datetime(millis: i64) -> Option<Value> {
    Utc.timestamp_millis_opt(millis).single().map(Value::DateTime)
}

/// ISO-8601 UTC rendering with millisecond precision, e.g. `2014-03-01T10:00:00.000Z`
pub fn iso8601(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Scalar::Null => JsonValue::Null,
            Scalar::Bool(b) => JsonValue::Bool(*b),
            Scalar::Int(i) => JsonValue::from(*i),
            Scalar::Double(d) => JsonValue::from(*d),
            Scalar::String(s) => JsonValue::String(s.clone()),
            Scalar::DateTime(dt) => JsonValue::String(iso8601(dt)),
            Scalar::ObjectId(id) => JsonValue::String(id.0.clone()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<f64> for Scalar {
    fn from(d: f64) -> Self {
        Scalar::Double(d)
    }
}

/// Render a flat row as a JSON object, used in error messages
pub fn row_to_json(row: &FlatRow) -> JsonValue {
    JsonValue::Object(row.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}
