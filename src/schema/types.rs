use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Column type tag, rendered the way it is declared in DDL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TypeTag {
    Int,
    Double,
    Text,
    Varchar(u32),
    DateTime,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Int => f.write_str("int"),
            TypeTag::Double => f.write_str("double"),
            TypeTag::Text => f.write_str("text"),
            TypeTag::Varchar(n) => write!(f, "varchar({})", n),
            TypeTag::DateTime => f.write_str("datetime"),
        }
    }
}

impl FromStr for TypeTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "int" | "integer" => Ok(TypeTag::Int),
            "double" | "real" => Ok(TypeTag::Double),
            "text" => Ok(TypeTag::Text),
            "datetime" => Ok(TypeTag::DateTime),
            _ => lower
                .strip_prefix("varchar(")
                .and_then(|rest| rest.strip_suffix(')'))
                .and_then(|len| len.trim().parse::<u32>().ok())
                .map(TypeTag::Varchar)
                .ok_or_else(|| s.to_string()),
        }
    }
}

impl From<TypeTag> for String {
    fn from(tag: TypeTag) -> Self {
        tag.to_string()
    }
}

impl TryFrom<String> for TypeTag {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// One column of a destination table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: TypeTag,
    pub required: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: TypeTag) -> Self {
        ColumnDef {
            name: name.into(),
            column_type,
            required: false,
        }
    }
}

/// Columns, types and primary key of one destination table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    pub columns: BTreeMap<String, ColumnDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<Vec<String>>,
}

pub const ID_COLUMN: &str = "_id";
pub const PARENT_ID_COLUMN: &str = "_parentid";
pub const INDEX_COLUMN: &str = "_index";
pub const NUM_COLUMN: &str = "_num";

impl TableDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.columns.insert(column.name.clone(), column);
        self
    }

    pub fn column_type(&self, name: &str) -> Option<TypeTag> {
        self.columns.get(name).map(|c| c.column_type)
    }

    /// `_id` when present, else `(_parentid, _index)` when both are present,
    /// else no primary key
    pub fn derive_primary_key(&self) -> Option<Vec<String>> {
        if self.columns.contains_key(ID_COLUMN) {
            Some(vec![ID_COLUMN.to_string()])
        } else if self.columns.contains_key(PARENT_ID_COLUMN)
            && self.columns.contains_key(INDEX_COLUMN)
        {
            Some(vec![PARENT_ID_COLUMN.to_string(), INDEX_COLUMN.to_string()])
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tag_display_and_parse() {
        for tag in [
            TypeTag::Int,
            TypeTag::Double,
            TypeTag::Text,
            TypeTag::Varchar(255),
            TypeTag::DateTime,
        ] {
            assert_eq!(tag.to_string().parse::<TypeTag>(), Ok(tag));
        }
        assert_eq!("VARCHAR(24)".parse::<TypeTag>(), Ok(TypeTag::Varchar(24)));
        assert_eq!("INTEGER".parse::<TypeTag>(), Ok(TypeTag::Int));
        assert!("blob".parse::<TypeTag>().is_err());
        assert!("varchar(abc)".parse::<TypeTag>().is_err());
    }

    #[test]
    fn test_primary_key_derivation() {
        let def = TableDef::new()
            .with_column(ColumnDef::new("_id", TypeTag::Varchar(24)))
            .with_column(ColumnDef::new("_parentid", TypeTag::Varchar(24)))
            .with_column(ColumnDef::new("_index", TypeTag::Int));
        assert_eq!(def.derive_primary_key(), Some(vec!["_id".to_string()]));

        let child = TableDef::new()
            .with_column(ColumnDef::new("_parentid", TypeTag::Varchar(24)))
            .with_column(ColumnDef::new("_index", TypeTag::Int));
        assert_eq!(
            child.derive_primary_key(),
            Some(vec!["_parentid".to_string(), "_index".to_string()])
        );

        let partial = TableDef::new().with_column(ColumnDef::new("_index", TypeTag::Int));
        assert_eq!(partial.derive_primary_key(), None);
    }

    #[test]
    fn test_table_def_serializes_type_tags_as_strings() {
        let def = TableDef::new().with_column(ColumnDef::new("name", TypeTag::Varchar(50)));
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["columns"]["name"]["type"], "varchar(50)");

        let back: TableDef = serde_json::from_value(json).unwrap();
        assert_eq!(back, def);
    }
}
