use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// One input row as read from the delimited file: column name to raw text,
/// in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    fields: Vec<(String, String)>,
}

impl RawRecord {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    /// Build a record from borrowed pairs, mostly handy in tests
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

/// A field value at the normalized stage. Only hashable scalars live here so
/// a whole record can serve as its own deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Integer(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{s:?}"),
            FieldValue::Integer(i) => write!(f, "{i}"),
        }
    }
}

/// A record after text cleaning and age parsing. Billing amount and dates are
/// still the source strings here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedRecord {
    fields: Vec<(String, FieldValue)>,
}

impl NormalizedRecord {
    pub fn new(fields: Vec<(String, FieldValue)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }
}

impl fmt::Display for NormalizedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_fields(f, self.fields.iter().map(|(k, v)| (k, v)))
    }
}

/// Typed value of a stored document field
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum DocumentValue {
    Text(String),
    Integer(i64),
    /// Serialized as an exact decimal string
    Decimal(Decimal),
    DateTime(NaiveDateTime),
}

impl From<FieldValue> for DocumentValue {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Text(s) => DocumentValue::Text(s),
            FieldValue::Integer(i) => DocumentValue::Integer(i),
        }
    }
}

/// The record handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalRecord {
    fields: Vec<(String, DocumentValue)>,
}

impl FinalRecord {
    pub fn new(fields: Vec<(String, DocumentValue)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&DocumentValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn fields(&self) -> &[(String, DocumentValue)] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// JSON document form, keys in source column order
    pub fn to_document(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

impl Serialize for FinalRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

fn write_fields<'a, I, V>(f: &mut fmt::Formatter<'_>, fields: I) -> fmt::Result
where
    I: Iterator<Item = (&'a String, V)>,
    V: fmt::Display,
{
    write!(f, "{{")?;
    for (i, (name, value)) in fields.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{name:?}: {value}")?;
    }
    write!(f, "}}")
}
