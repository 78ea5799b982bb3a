use crate::schema::types::{INDEX_COLUMN, PARENT_ID_COLUMN};
use crate::types::{iso8601, Document, FlatRow, Scalar, Value};

/// Default element count above which an integer-keyed mapping is treated
/// as a sequence
pub const DEFAULT_ARRAY_THRESHOLD: usize = 25;

/// One element of an array field, with the position it had in its parent
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayElement {
    /// Integer position for true sequences, the original key for
    /// integer-keyed mappings that could not be parsed as a number
    pub index: Scalar,
    pub value: Value,
}

/// An array-valued attribute that must become a child table
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayField {
    /// Flattened attribute name, e.g. `profile_tags`
    pub name: String,
    pub elements: Vec<ArrayElement>,
}

/// A document reduced to a flat row plus its pending array fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flattened {
    pub row: FlatRow,
    pub arrays: Vec<ArrayField>,
}

/// Flattens nested documents into path-prefixed rows
#[derive(Debug, Clone)]
pub struct Flattener {
    array_threshold: usize,
}

impl Default for Flattener {
    fn default() -> Self {
        Flattener::new(DEFAULT_ARRAY_THRESHOLD)
    }
}

impl Flattener {
    pub fn new(array_threshold: usize) -> Self {
        Flattener { array_threshold }
    }

    /// Flatten a document.
    ///
    /// Nested documents are merged into the row with `parent_child` keys,
    /// date/times become ISO-8601 strings, and sequences are set aside in
    /// `arrays` instead of being recursed into.
    pub fn flatten(&self, doc: Document) -> Flattened {
        let mut out = Flattened::default();
        self.flatten_into(doc, "", &mut out);
        out
    }

    fn flatten_into(&self, doc: Document, prefix: &str, out: &mut Flattened) {
        for (key, value) in doc {
            let path = format!("{}{}", prefix, key);

            match value {
                Value::Array(items) => {
                    if !items.is_empty() {
                        out.arrays.push(ArrayField {
                            name: path,
                            elements: items
                                .into_iter()
                                .enumerate()
                                .map(|(i, value)| ArrayElement {
                                    index: Scalar::Int(i as i64),
                                    value,
                                })
                                .collect(),
                        });
                    }
                }
                Value::Document(nested) => {
                    if self.is_sequence_like(&nested) {
                        out.arrays.push(ArrayField {
                            name: path,
                            elements: sequence_elements(nested),
                        });
                    } else {
                        self.flatten_into(nested, &format!("{}_", path), out);
                    }
                }
                Value::DateTime(dt) => {
                    out.row.insert(path, Scalar::String(iso8601(&dt)));
                }
                scalar => {
                    if let Some(s) = scalar.as_scalar() {
                        out.row.insert(path, s);
                    }
                }
            }
        }
    }

    /// A mapping addressed like an array: it has a `"0"` key, or more than
    /// `array_threshold` entries that are all integer-keyed
    fn is_sequence_like(&self, doc: &Document) -> bool {
        doc.contains_key("0")
            || (doc.len() > self.array_threshold && doc.keys().all(|k| k.parse::<i64>().is_ok()))
    }

    /// Build the child-table row for one array element.
    ///
    /// Documents are flattened (their own arrays are dropped); scalars are
    /// stored under `field`. `_parentid` and `_index` are always set and win
    /// over element attributes of the same name. Returns `None` for an
    /// element that is itself an array.
    pub fn element_row(&self, parent_id: &Scalar, field: &str, element: ArrayElement) -> Option<FlatRow> {
        let mut row = match element.value {
            Value::Array(_) => return None,
            Value::Document(doc) if self.is_sequence_like(&doc) => return None,
            Value::Document(doc) => self.flatten(doc).row,
            Value::DateTime(dt) => {
                let mut row = FlatRow::new();
                row.insert(field.to_string(), Scalar::String(iso8601(&dt)));
                row
            }
            other => {
                let mut row = FlatRow::new();
                row.insert(field.to_string(), other.as_scalar()?);
                row
            }
        };

        row.insert(PARENT_ID_COLUMN.to_string(), parent_id.clone());
        row.insert(INDEX_COLUMN.to_string(), element.index);
        Some(row)
    }
}

fn sequence_elements(doc: Document) -> Vec<ArrayElement> {
    let mut elements: Vec<(Option<i64>, ArrayElement)> = doc
        .into_iter()
        .map(|(key, value)| {
            let position = key.parse::<i64>().ok();
            let index = position.map(Scalar::Int).unwrap_or(Scalar::String(key));
            (position, ArrayElement { index, value })
        })
        .collect();

    // Numeric keys in numeric order, anything else after them in key order
    elements.sort_by_key(|(position, _)| position.unwrap_or(i64::MAX));
    elements.into_iter().map(|(_, e)| e).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::document_from_json;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        document_from_json(value).unwrap()
    }

    #[test]
    fn test_flat_document_is_relabeling() {
        let input = doc(json!({"_id": "a", "name": "Alice", "age": 30, "score": 2.5, "nick": null}));
        let flattened = Flattener::default().flatten(input.clone());

        assert!(flattened.arrays.is_empty());
        assert_eq!(
            flattened.row.keys().collect::<Vec<_>>(),
            input.keys().collect::<Vec<_>>()
        );
        assert_eq!(flattened.row["age"], Scalar::Int(30));
        assert_eq!(flattened.row["nick"], Scalar::Null);
    }

    #[test]
    fn test_nested_documents_are_path_prefixed() {
        let input = doc(json!({
            "name": "Alice",
            "address": {"city": "Montreal", "geo": {"lat": 45.5, "lng": -73.6}}
        }));
        let flattened = Flattener::default().flatten(input);

        assert_eq!(flattened.row["address_city"], Scalar::from("Montreal"));
        assert_eq!(flattened.row["address_geo_lat"], Scalar::Double(45.5));
        assert_eq!(flattened.row["address_geo_lng"], Scalar::Double(-73.6));
        assert!(!flattened.row.contains_key("address"));
    }

    #[test]
    fn test_arrays_are_set_aside() {
        let input = doc(json!({
            "_id": "p1",
            "tags": ["rust", "json"],
            "profile": {"links": [{"url": "a"}]},
            "empty": []
        }));
        let flattened = Flattener::default().flatten(input);

        let names: Vec<&str> = flattened.arrays.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["profile_links", "tags"]);
        assert_eq!(flattened.arrays[1].elements[1].index, Scalar::Int(1));
        assert_eq!(flattened.row.len(), 1);
    }

    #[test]
    fn test_sequence_like_mappings() {
        let flattener = Flattener::default();

        let zero_keyed = doc(json!({"m": {"0": "a", "1": "b"}}));
        let flattened = flattener.flatten(zero_keyed);
        assert_eq!(flattened.arrays.len(), 1);
        assert!(flattened.row.is_empty());

        let mut sparse = serde_json::Map::new();
        for i in 1..=26 {
            sparse.insert((i * 10).to_string(), json!(i));
        }
        let flattened = flattener.flatten(doc(json!({ "scores": sparse })));
        assert_eq!(flattened.arrays.len(), 1);
        let indexes: Vec<Scalar> = flattened.arrays[0]
            .elements
            .iter()
            .take(3)
            .map(|e| e.index.clone())
            .collect();
        assert_eq!(indexes, vec![Scalar::Int(10), Scalar::Int(20), Scalar::Int(30)]);

        let mut wide = serde_json::Map::new();
        for i in 0..30 {
            wide.insert(format!("f{}", i), json!(i));
        }
        let flattened = flattener.flatten(doc(json!({ "wide": wide })));
        assert!(flattened.arrays.is_empty());
        assert_eq!(flattened.row.len(), 30);
    }

    #[test]
    fn test_datetimes_become_iso_strings() {
        let mut input = Document::new();
        input.insert(
            "created".to_string(),
            Value::DateTime(Utc.with_ymd_and_hms(2014, 3, 1, 10, 0, 0).unwrap()),
        );
        let flattened = Flattener::default().flatten(input);
        assert_eq!(
            flattened.row["created"],
            Scalar::from("2014-03-01T10:00:00.000Z")
        );
    }

    #[test]
    fn test_element_rows() {
        let flattener = Flattener::default();
        let parent = Scalar::from("p1");

        let scalar = flattener
            .element_row(&parent, "tags", ArrayElement { index: Scalar::Int(2), value: Value::String("rust".into()) })
            .unwrap();
        assert_eq!(scalar["tags"], Scalar::from("rust"));
        assert_eq!(scalar["_parentid"], parent);
        assert_eq!(scalar["_index"], Scalar::Int(2));

        let nested = doc(json!({"title": "Hi", "meta": {"likes": 3}, "replies": [1, 2], "_index": 99}));
        let row = flattener
            .element_row(&parent, "posts", ArrayElement { index: Scalar::Int(0), value: Value::Document(nested) })
            .unwrap();
        assert_eq!(row["title"], Scalar::from("Hi"));
        assert_eq!(row["meta_likes"], Scalar::Int(3));
        assert_eq!(row["_index"], Scalar::Int(0));
        assert!(!row.contains_key("replies"));

        let doubly_nested = ArrayElement {
            index: Scalar::Int(0),
            value: Value::Array(vec![Value::Int(1)]),
        };
        assert!(flattener.element_row(&parent, "grid", doubly_nested).is_none());
    }
}
