//! Response body decoding.
//!
//! Two documents are accepted:
//!
//! ```text
//! flat:        {"version": "v1", "values": {"message": "hello", "db": {"port": 5432}}}
//! environment: {"name": "app", "profiles": ["default"], "label": null, "version": "abc",
//!               "propertySources": [{"name": "app.yml", "source": {"message": "hello"}}]}
//! ```
//!
//! In the environment document earlier property sources win. Nested objects
//! flatten to dotted keys, arrays to indexed keys, nulls are dropped.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::fetch::error::FetchError;

/// Decoded body before a version is settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBody {
    pub values: BTreeMap<String, String>,
    pub version: Option<String>,
}

#[derive(Deserialize)]
struct FlatDocument {
    #[serde(default)]
    version: Option<String>,
    values: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvironmentDocument {
    #[serde(default)]
    version: Option<String>,
    property_sources: Vec<PropertySource>,
}

#[derive(Deserialize)]
struct PropertySource {
    source: serde_json::Map<String, Value>,
}

pub fn decode_body(body: &str) -> Result<DecodedBody, FetchError> {
    let root: Value = serde_json::from_str(body)
        .map_err(|e| FetchError::InvalidResponse(format!("malformed JSON: {}", e)))?;

    let (has_sources, has_values) = match &root {
        Value::Object(object) => (
            object.contains_key("propertySources"),
            object.contains_key("values"),
        ),
        _ => return Err(FetchError::InvalidResponse("expected a JSON object".to_string())),
    };

    if has_sources {
        let doc: EnvironmentDocument = serde_json::from_value(root)
            .map_err(|e| FetchError::InvalidResponse(format!("bad environment document: {}", e)))?;

        let mut values = BTreeMap::new();
        // Lowest precedence first so higher-precedence sources overwrite.
        for source in doc.property_sources.iter().rev() {
            for (key, value) in &source.source {
                flatten_into(key, value, &mut values);
            }
        }
        return Ok(DecodedBody {
            values,
            version: doc.version.filter(|v| !v.is_empty()),
        });
    }

    if has_values {
        let doc: FlatDocument = serde_json::from_value(root)
            .map_err(|e| {
                FetchError::InvalidResponse(format!("bad configuration document: {}", e))
            })?;

        let mut values = BTreeMap::new();
        for (key, value) in &doc.values {
            flatten_into(key, value, &mut values);
        }
        return Ok(DecodedBody {
            values,
            version: doc.version.filter(|v| !v.is_empty()),
        });
    }

    Err(FetchError::InvalidResponse(
        "document has neither 'values' nor 'propertySources'".to_string(),
    ))
}

fn flatten_into(key: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Null => {}
        Value::String(s) => {
            out.insert(key.to_string(), s.clone());
        }
        Value::Bool(_) | Value::Number(_) => {
            out.insert(key.to_string(), value.to_string());
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_into(&format!("{}[{}]", key, i), item, out);
            }
        }
        Value::Object(map) => {
            for (child, item) in map {
                flatten_into(&format!("{}.{}", key, child), item, out);
            }
        }
    }
}

/// Strip quotes and the weak validator prefix from an ETag header value.
pub fn parse_etag(raw: &str) -> Option<String> {
    let tag = raw.trim();
    let tag = tag.strip_prefix("W/").unwrap_or(tag);
    let tag = tag.trim_matches('"');
    (!tag.is_empty()).then(|| tag.to_string())
}
