//! Document transformer.
//!
//! Turns one [`SourceEvent`] into exactly one [`Document`]. The mapping is
//! driven by static extraction tables: each entry names a target field, the
//! type it is indexed as, and an accessor pulling the value out of the event.

use serde_json::Value;
use tracing::{debug, instrument, Level};

use crate::processor::features::FeatureExtractor;
use tweet_indexer_shared::{
    document_id, Document, FieldType, FieldValue, GeoLocation, Place, SourceEvent,
};

/// Provider recorded on every document.
pub const PROVIDER: &str = "twitter";

/// One entry of an extraction table.
pub struct FieldMapping<T> {
    /// Full target field name, including the type suffix.
    pub field: &'static str,
    /// Type the field is indexed as.
    pub field_type: FieldType,
    /// Pulls the value out of the source; `None` omits the field.
    pub accessor: fn(&T) -> Option<FieldValue>,
}

impl<T> FieldMapping<T> {
    /// Evaluate the accessor and coerce the result to the declared type.
    pub fn extract(&self, source: &T) -> Option<FieldValue> {
        (self.accessor)(source).and_then(|value| value.coerce(self.field_type))
    }
}

/// Flat and curated tweet attributes, in output order.
pub static TWEET_FIELDS: &[FieldMapping<SourceEvent>] = &[
    FieldMapping {
        field: "provider_s",
        field_type: FieldType::Str,
        accessor: |_| Some(FieldValue::from(PROVIDER)),
    },
    FieldMapping {
        field: "author_s",
        field_type: FieldType::Str,
        accessor: |e| Some(FieldValue::from(e.user.screen_name.as_str())),
    },
    FieldMapping {
        field: "contributors_s",
        field_type: FieldType::Str,
        accessor: |e| {
            if e.contributors.is_empty() {
                return None;
            }
            let ids: Vec<String> = e.contributors.iter().map(i64::to_string).collect();
            Some(FieldValue::Str(ids.join(",")))
        },
    },
    FieldMapping {
        field: "created_at_s",
        field_type: FieldType::Str,
        accessor: |e| Some(FieldValue::Timestamp(e.created_at)),
    },
    FieldMapping {
        field: "text_s",
        field_type: FieldType::Str,
        accessor: |e| Some(FieldValue::from(e.text.as_str())),
    },
    FieldMapping {
        field: "id_i",
        field_type: FieldType::Int,
        accessor: |e| Some(FieldValue::Int(e.id)),
    },
    FieldMapping {
        field: "in_reply_to_screen_name_s",
        field_type: FieldType::Str,
        accessor: |e| e.in_reply_to_screen_name.as_deref().map(FieldValue::from),
    },
    FieldMapping {
        field: "in_reply_to_status_id_s",
        field_type: FieldType::Str,
        accessor: |e| e.in_reply_to_status_id.map(FieldValue::Int),
    },
    FieldMapping {
        field: "retweet_count_i",
        field_type: FieldType::Int,
        accessor: |e| Some(FieldValue::Int(e.retweet_count)),
    },
    FieldMapping {
        field: "source_s",
        field_type: FieldType::Str,
        accessor: |e| Some(FieldValue::from(e.source.as_str())),
    },
    FieldMapping {
        field: "is_favorited_b",
        field_type: FieldType::Bool,
        accessor: |e| Some(FieldValue::Bool(e.favorited)),
    },
    FieldMapping {
        field: "is_possibly_sensitive_b",
        field_type: FieldType::Bool,
        accessor: |e| Some(FieldValue::Bool(e.possibly_sensitive)),
    },
    FieldMapping {
        field: "is_retweet_b",
        field_type: FieldType::Bool,
        accessor: |e| Some(FieldValue::Bool(e.is_retweet())),
    },
    FieldMapping {
        field: "is_retweeted_by_me_b",
        field_type: FieldType::Bool,
        accessor: |e| Some(FieldValue::Bool(e.retweeted)),
    },
    FieldMapping {
        field: "is_truncated_b",
        field_type: FieldType::Bool,
        accessor: |e| Some(FieldValue::Bool(e.truncated)),
    },
    FieldMapping {
        field: "lang_s",
        field_type: FieldType::Str,
        accessor: |e| e.lang.as_deref().map(FieldValue::from),
    },
    FieldMapping {
        field: "favorite_count_i",
        field_type: FieldType::Int,
        accessor: |e| Some(FieldValue::Int(e.favorite_count)),
    },
    FieldMapping {
        field: "in_reply_to_user_id_i",
        field_type: FieldType::Int,
        accessor: |e| e.in_reply_to_user_id.map(FieldValue::Int),
    },
    FieldMapping {
        field: "author_name_s",
        field_type: FieldType::Str,
        accessor: |e| e.user.name.as_deref().map(FieldValue::from),
    },
    FieldMapping {
        field: "author_followers_count_i",
        field_type: FieldType::Int,
        accessor: |e| e.user.followers_count.map(FieldValue::Int),
    },
];

/// Fields written when the event carries exact coordinates.
pub static GEO_LOCATION_FIELDS: &[FieldMapping<GeoLocation>] = &[
    FieldMapping {
        field: "geo_location_latitude_f",
        field_type: FieldType::Float,
        accessor: |g| Some(FieldValue::Float(g.latitude)),
    },
    FieldMapping {
        field: "geo_location_longitude_f",
        field_type: FieldType::Float,
        accessor: |g| Some(FieldValue::Float(g.longitude)),
    },
];

/// Fields written when the event is associated with a place.
pub static PLACE_FIELDS: &[FieldMapping<Place>] = &[
    FieldMapping {
        field: "place_country_s",
        field_type: FieldType::Str,
        accessor: |p| p.country.as_deref().map(FieldValue::from),
    },
    FieldMapping {
        field: "place_country_code_s",
        field_type: FieldType::Str,
        accessor: |p| p.country_code.as_deref().map(FieldValue::from),
    },
    FieldMapping {
        field: "place_full_name_s",
        field_type: FieldType::Str,
        accessor: |p| p.full_name.as_deref().map(FieldValue::from),
    },
    FieldMapping {
        field: "place_name_s",
        field_type: FieldType::Str,
        accessor: |p| p.name.as_deref().map(FieldValue::from),
    },
    FieldMapping {
        field: "place_type_s",
        field_type: FieldType::Str,
        accessor: |p| p.place_type.as_deref().map(FieldValue::from),
    },
    FieldMapping {
        field: "place_street_address_s",
        field_type: FieldType::Str,
        accessor: |p| p.street_address().map(FieldValue::from),
    },
];

/// Maps source events to index documents.
///
/// The transformer is infallible and referentially transparent: the same
/// event always yields the same document.
#[derive(Debug, Clone, Default)]
pub struct DocumentTransformer {
    features: FeatureExtractor,
}

impl DocumentTransformer {
    pub fn new(features: FeatureExtractor) -> Self {
        Self { features }
    }

    /// Build the document for `event`.
    #[instrument(skip(self, event), fields(event_id = event.id))]
    pub fn transform(&self, event: &SourceEvent) -> Document {
        if tracing::enabled!(Level::DEBUG) {
            debug!(event = %collapse_whitespace(&format!("{:?}", event)), "Received event");
        }

        let mut document = Document::new(document_id(event.id));

        for (key, value) in &event.extra {
            if let Some((field, value)) = generic_field(key, value) {
                put(&mut document, field, value);
            }
        }

        apply_table(&mut document, TWEET_FIELDS, event);
        if let Some(geo_location) = &event.geo_location {
            apply_table(&mut document, GEO_LOCATION_FIELDS, geo_location);
        }
        if let Some(place) = &event.place {
            apply_table(&mut document, PLACE_FIELDS, place);
        }

        self.features.apply(&mut document);
        document
    }
}

fn apply_table<T>(document: &mut Document, table: &[FieldMapping<T>], source: &T) {
    for mapping in table {
        if let Some(value) = mapping.extract(source) {
            put(document, mapping.field.to_string(), value);
        }
    }
}

fn put(document: &mut Document, field: String, value: FieldValue) {
    if let Err(e) = document.insert(field, value) {
        debug!(document_id = %document.id(), error = %e, "Skipping field");
    }
}

/// Map an attribute the typed model does not name to a suffixed field.
fn generic_field(key: &str, value: &Value) -> Option<(String, FieldValue)> {
    let base = sanitize_key(key)?;
    let value = match value {
        Value::Null => return None,
        Value::Bool(b) => FieldValue::Bool(*b),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => FieldValue::Int(i),
            (None, _) if n.is_u64() => FieldValue::Str(n.to_string()),
            (None, Some(f)) if f.is_finite() => FieldValue::Float(f),
            _ => return None,
        },
        Value::String(s) => FieldValue::Str(s.clone()),
        Value::Array(_) | Value::Object(_) => FieldValue::Str(value.to_string()),
    };
    Some((value.field_type().field_name(&base), value))
}

/// Lower-case a key and replace anything outside `[a-z0-9_]` with `_`.
fn sanitize_key(key: &str) -> Option<String> {
    let sanitized: String = key
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim_matches('_').is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
