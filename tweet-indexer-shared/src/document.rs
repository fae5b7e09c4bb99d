//! Dynamically-typed search documents.
//!
//! A [`Document`] is an ordered mapping from field name to [`FieldValue`].
//! Field names encode the value type through a suffix (`author_s`,
//! `retweet_count_i`, ...) and the mapping refuses any value whose type does
//! not match its name, so the index's dynamic schema never sees a conflict.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

/// Prefix prepended to every source event id to form the document id.
pub const DOCUMENT_ID_PREFIX: &str = "tweet-";

/// Build the document identifier for a source event id.
pub fn document_id(event_id: i64) -> String {
    format!("{}{}", DOCUMENT_ID_PREFIX, event_id)
}

/// Value types a document field can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// String, suffix `_s`.
    Str,
    /// 64-bit signed integer, suffix `_i`.
    Int,
    /// 64-bit float, suffix `_f`.
    Float,
    /// Boolean, suffix `_b`.
    Bool,
    /// UTC timestamp, suffix `_dt`.
    Timestamp,
}

impl FieldType {
    /// The field-name suffix for this type, without the leading underscore.
    pub fn suffix(&self) -> &'static str {
        match self {
            FieldType::Str => "s",
            FieldType::Int => "i",
            FieldType::Float => "f",
            FieldType::Bool => "b",
            FieldType::Timestamp => "dt",
        }
    }

    /// Resolve the type a field name declares through its suffix.
    pub fn from_field_name(name: &str) -> Option<FieldType> {
        let (_, suffix) = name.rsplit_once('_')?;
        match suffix {
            "s" => Some(FieldType::Str),
            "i" => Some(FieldType::Int),
            "f" => Some(FieldType::Float),
            "b" => Some(FieldType::Bool),
            "dt" => Some(FieldType::Timestamp),
            _ => None,
        }
    }

    /// Append this type's suffix to a base name.
    pub fn field_name(&self, base: &str) -> String {
        format!("{}_{}", base, self.suffix())
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Str => "string",
            FieldType::Int => "integer",
            FieldType::Float => "float",
            FieldType::Bool => "boolean",
            FieldType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// The type of this value.
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Str(_) => FieldType::Str,
            FieldValue::Int(_) => FieldType::Int,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::Bool(_) => FieldType::Bool,
            FieldValue::Timestamp(_) => FieldType::Timestamp,
        }
    }

    /// Convert this value to `target`.
    ///
    /// A value already of the target type is returned as is. Any value can be
    /// coerced to a string through its display form; every other conversion
    /// yields `None`.
    pub fn coerce(self, target: FieldType) -> Option<FieldValue> {
        if self.field_type() == target {
            return Some(self);
        }
        match target {
            FieldType::Str => Some(FieldValue::Str(self.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Timestamp(ts) => {
                f.write_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Str(s) => serializer.serialize_str(s),
            FieldValue::Int(i) => serializer.serialize_i64(*i),
            FieldValue::Float(v) => serializer.serialize_f64(*v),
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            FieldValue::Timestamp(ts) => {
                serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
        }
    }
}

/// Errors raised when a field cannot be stored in a document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocumentError {
    /// The field name carries no recognised type suffix.
    #[error("Field '{0}' has no type suffix")]
    MissingSuffix(String),

    /// The value type does not match the field name's suffix.
    #[error("Field '{field}' expects {expected} but got {actual}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        actual: FieldType,
    },

    /// NaN and infinities have no JSON representation.
    #[error("Field '{0}' holds a non-finite float")]
    NonFiniteFloat(String),

    /// `id` is reserved for the document identifier.
    #[error("Field name '{0}' is reserved")]
    ReservedField(String),
}

/// A structured, dynamically-typed record submitted to the index.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: String,
    fields: IndexMap<String, FieldValue>,
}

impl Document {
    /// Create an empty document with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: IndexMap::new(),
        }
    }

    /// The document identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Insert a field, replacing any previous value under the same name.
    ///
    /// A replaced field keeps its original position. Returns the previous
    /// value, if any.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Result<Option<FieldValue>, DocumentError> {
        let name = name.into();
        let value = value.into();

        if name == "id" {
            return Err(DocumentError::ReservedField(name));
        }
        let expected = FieldType::from_field_name(&name)
            .ok_or_else(|| DocumentError::MissingSuffix(name.clone()))?;
        if value.field_type() != expected {
            return Err(DocumentError::TypeMismatch {
                field: name,
                expected,
                actual: value.field_type(),
            });
        }
        if let FieldValue::Float(v) = value {
            if !v.is_finite() {
                return Err(DocumentError::NonFiniteFloat(name));
            }
        }

        Ok(self.fields.insert(name, value))
    }

    /// Look up a field value.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Whether the document has a field with this name.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Number of fields, not counting the identifier.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FieldValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.fields.get(name) {
            Some(FieldValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        match self.fields.get(name) {
            Some(FieldValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.fields.get(name) {
            Some(FieldValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("id", &self.id)?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_document_id_format() {
        assert_eq!(document_id(42), "tweet-42");
        assert_eq!(document_id(-7), "tweet--7");
    }

    #[test]
    fn test_suffix_resolution() {
        assert_eq!(FieldType::from_field_name("author_s"), Some(FieldType::Str));
        assert_eq!(FieldType::from_field_name("retweet_count_i"), Some(FieldType::Int));
        assert_eq!(
            FieldType::from_field_name("geo_location_latitude_f"),
            Some(FieldType::Float)
        );
        assert_eq!(FieldType::from_field_name("is_truncated_b"), Some(FieldType::Bool));
        assert_eq!(FieldType::from_field_name("indexed_at_dt"), Some(FieldType::Timestamp));
        assert_eq!(FieldType::from_field_name("source_"), None);
        assert_eq!(FieldType::from_field_name("plain"), None);
    }

    #[test]
    fn test_insert_rejects_type_mismatch() {
        let mut doc = Document::new("tweet-1");

        let err = doc.insert("retweet_count_i", "12").unwrap_err();
        assert_eq!(
            err,
            DocumentError::TypeMismatch {
                field: "retweet_count_i".to_string(),
                expected: FieldType::Int,
                actual: FieldType::Str,
            }
        );
        assert!(doc.is_empty());
    }

    #[test]
    fn test_insert_rejects_unsuffixed_and_reserved_names() {
        let mut doc = Document::new("tweet-1");

        assert!(matches!(
            doc.insert("source", "web"),
            Err(DocumentError::MissingSuffix(_))
        ));
        assert!(matches!(
            doc.insert("id", "x"),
            Err(DocumentError::ReservedField(_))
        ));
    }

    #[test]
    fn test_insert_rejects_non_finite_float() {
        let mut doc = Document::new("tweet-1");
        assert!(matches!(
            doc.insert("score_f", f64::NAN),
            Err(DocumentError::NonFiniteFloat(_))
        ));
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut doc = Document::new("tweet-1");
        doc.insert("a_s", "first").unwrap();
        doc.insert("b_i", 2i64).unwrap();

        let previous = doc.insert("a_s", "second").unwrap();

        assert_eq!(previous, Some(FieldValue::Str("first".to_string())));
        let names: Vec<&str> = doc.fields().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a_s", "b_i"]);
        assert_eq!(doc.get_str("a_s"), Some("second"));
    }

    #[test]
    fn test_coerce() {
        assert_eq!(
            FieldValue::Int(5).coerce(FieldType::Str),
            Some(FieldValue::Str("5".to_string()))
        );
        assert_eq!(
            FieldValue::Bool(true).coerce(FieldType::Bool),
            Some(FieldValue::Bool(true))
        );
        assert_eq!(FieldValue::Str("5".to_string()).coerce(FieldType::Int), None);
    }

    #[test]
    fn test_serialize_flat_object() {
        let mut doc = Document::new("tweet-9");
        doc.insert("text_s", "hello").unwrap();
        doc.insert("bytes_i", 5i64).unwrap();
        doc.insert("is_truncated_b", false).unwrap();
        doc.insert(
            "indexed_at_dt",
            Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        )
        .unwrap();

        let value = serde_json::to_value(&doc).unwrap();

        assert_eq!(
            value,
            json!({
                "id": "tweet-9",
                "text_s": "hello",
                "bytes_i": 5,
                "is_truncated_b": false,
                "indexed_at_dt": "2024-01-02T03:04:05Z"
            })
        );
    }
}
