//! Activity row flattening
//!
//! Activity exports carry a fixed set of columns plus a JSON `attributes`
//! bag. Each activity stream is one activity type, so the bag is spread into
//! top-level fields named after the attributes.

use crate::error::Result;
use crate::format::Record;
use serde_json::{Map, Value};
use tap_common::Stream;

/// Columns every activity record starts with
pub const BASE_ACTIVITY_FIELDS: [&str; 4] =
    ["marketoGUID", "leadId", "activityDate", "activityTypeId"];

/// Columns requested from every activity export
pub const ACTIVITY_FIELDS: [&str; 7] = [
    "marketoGUID",
    "leadId",
    "activityDate",
    "activityTypeId",
    "primaryAttributeValue",
    "primaryAttributeValueId",
    "attributes",
];

/// `Lead Score` -> `lead_score`
pub fn normalize_attribute_key(key: &str) -> String {
    key.to_lowercase().replace(' ', "_")
}

/// Flatten one exported activity row
pub fn flatten_activity(row: &Record, stream: &Stream) -> Result<Record> {
    let column = |name: &str| row.get(name).cloned().unwrap_or(Value::Null);

    let mut flat = Record::new();
    for field in BASE_ACTIVITY_FIELDS {
        flat.insert(field.to_string(), column(field));
    }

    if let Some(name) = stream.primary_attribute_name() {
        flat.insert(
            "primary_attribute_name".to_string(),
            Value::String(name.to_string()),
        );
        flat.insert(
            "primary_attribute_value".to_string(),
            column("primaryAttributeValue"),
        );
        flat.insert(
            "primary_attribute_value_id".to_string(),
            column("primaryAttributeValueId"),
        );
    }

    if let Some(raw) = row
        .get("attributes")
        .and_then(Value::as_str)
        .filter(|raw| !raw.is_empty())
    {
        let attributes: Map<String, Value> = serde_json::from_str(raw)?;
        for (key, value) in attributes {
            flat.insert(normalize_attribute_key(&key), value);
        }
    }

    Ok(flat)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stream(primary_attribute: Option<&str>) -> Stream {
        let mut metadata = json!({"marketo.activity-id": 2});
        if let Some(name) = primary_attribute {
            metadata["marketo.primary-attribute-name"] = json!(name);
        }
        serde_json::from_value(json!({
            "tap_stream_id": "activities_fill_out_form",
            "schema": {"properties": {}},
            "metadata": [{"breadcrumb": [], "metadata": metadata}]
        }))
        .unwrap()
    }

    fn row() -> Record {
        json!({
            "marketoGUID": "g-1",
            "leadId": "77",
            "activityDate": "2024-01-02T03:04:05Z",
            "activityTypeId": "2",
            "primaryAttributeValue": "Contact Us",
            "primaryAttributeValueId": "1001",
            "attributes": "{\"Client IP Address\": \"10.0.0.1\", \"Form Fields\": \"a=b\"}"
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_flatten_with_primary_attribute() {
        let flat = flatten_activity(&row(), &stream(Some("webform_id"))).unwrap();

        assert_eq!(flat["marketoGUID"], "g-1");
        assert_eq!(flat["primary_attribute_name"], "webform_id");
        assert_eq!(flat["primary_attribute_value"], "Contact Us");
        assert_eq!(flat["primary_attribute_value_id"], "1001");
        assert_eq!(flat["client_ip_address"], "10.0.0.1");
        assert_eq!(flat["form_fields"], "a=b");
        assert!(!flat.contains_key("attributes"));
    }

    #[test]
    fn test_flatten_without_primary_attribute() {
        let flat = flatten_activity(&row(), &stream(None)).unwrap();
        assert!(!flat.contains_key("primary_attribute_name"));
        assert!(!flat.contains_key("primary_attribute_value"));
        assert_eq!(flat.len(), BASE_ACTIVITY_FIELDS.len() + 2);
    }

    #[test]
    fn test_empty_attribute_bag() {
        let mut row = row();
        row.insert("attributes".to_string(), json!(""));
        let flat = flatten_activity(&row, &stream(None)).unwrap();
        assert_eq!(flat.len(), BASE_ACTIVITY_FIELDS.len());
    }

    #[test]
    fn test_malformed_attribute_bag_is_an_error() {
        let mut row = row();
        row.insert("attributes".to_string(), json!("{not json"));
        assert!(flatten_activity(&row, &stream(None)).is_err());
    }
}
