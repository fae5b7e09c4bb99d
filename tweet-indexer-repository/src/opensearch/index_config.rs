//! OpenSearch index configuration and mappings.
//!
//! Documents carry their type in the field-name suffix, so the collection is
//! created with dynamic templates rather than an explicit property list.

use serde_json::{json, Value};

/// Get the index settings and mappings for a tweet collection.
///
/// The configuration includes:
/// - **Dynamic templates**: one per field-name suffix (`_s`, `_i`, `_f`,
///   `_b`, `_dt`)
/// - **text_s**: additionally analyzed as full text for search
/// - **id**: keyword for exact lookups
pub fn get_index_settings() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "dynamic_templates": [
                { "strings": { "match": "*_s", "mapping": { "type": "keyword" } } },
                { "integers": { "match": "*_i", "mapping": { "type": "long" } } },
                { "floats": { "match": "*_f", "mapping": { "type": "double" } } },
                { "booleans": { "match": "*_b", "mapping": { "type": "boolean" } } },
                { "timestamps": { "match": "*_dt", "mapping": { "type": "date" } } }
            ],
            "properties": {
                "id": {
                    "type": "keyword"
                },
                "text_s": {
                    "type": "keyword",
                    "ignore_above": 8191,
                    "fields": {
                        "analyzed": {
                            "type": "text"
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_settings_structure() {
        let settings = get_index_settings();

        assert!(settings["settings"]["number_of_shards"].is_number());
        assert!(settings["settings"]["number_of_replicas"].is_number());

        let templates = settings["mappings"]["dynamic_templates"].as_array().unwrap();
        let matches: Vec<&str> = templates
            .iter()
            .flat_map(|t| t.as_object().unwrap().values())
            .map(|t| t["match"].as_str().unwrap())
            .collect();
        assert_eq!(matches, vec!["*_s", "*_i", "*_f", "*_b", "*_dt"]);

        assert_eq!(settings["mappings"]["properties"]["id"]["type"], "keyword");
        assert_eq!(
            settings["mappings"]["properties"]["text_s"]["fields"]["analyzed"]["type"],
            "text"
        );
    }
}
