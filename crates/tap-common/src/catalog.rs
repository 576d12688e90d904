//! Singer catalog model
//!
//! The catalog arrives with schema and selection already resolved. Taps only
//! read it: selection flags decide which streams run and which fields are
//! requested and emitted.

use crate::error::{Result, TapError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Ordered list of stream descriptors
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub streams: Vec<Stream>,
}

impl Catalog {
    /// Load a catalog from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            TapError::parse(format!("catalog {}: {}", path.display(), e))
        })
    }
}

/// One stream (data category) of the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub tap_stream_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,

    pub schema: StreamSchema,

    #[serde(default)]
    pub key_properties: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,

    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
}

/// Top-level JSON schema of a stream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,

    #[serde(default)]
    pub properties: BTreeMap<String, FieldSchema>,

    /// Keys the tap does not interpret, carried through to `SCHEMA` messages
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Declared JSON type: a single name or a list of names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeSpec {
    One(String),
    Many(Vec<String>),
}

/// Schema of a single field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<TypeSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusion: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldSchema {
    /// Schema with the given type names and nothing else set
    pub fn of_types(types: &[&str]) -> Self {
        Self {
            field_type: Some(TypeSpec::Many(types.iter().map(|t| t.to_string()).collect())),
            ..Default::default()
        }
    }

    /// Declared type names, in declaration order
    pub fn types(&self) -> Vec<&str> {
        match &self.field_type {
            Some(TypeSpec::One(t)) => vec![t.as_str()],
            Some(TypeSpec::Many(ts)) => ts.iter().map(String::as_str).collect(),
            None => Vec::new(),
        }
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.types().contains(&name)
    }

    pub fn is_date_time(&self) -> bool {
        self.format.as_deref() == Some("date-time")
    }

    /// Selected for output, or always included
    pub fn is_selected(&self) -> bool {
        self.selected == Some(true) || self.inclusion.as_deref() == Some("automatic")
    }
}

/// A Singer metadata entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataEntry {
    #[serde(default)]
    pub breadcrumb: Vec<String>,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Stream {
    pub fn is_selected(&self) -> bool {
        self.schema.selected == Some(true)
            || self.root_metadata("selected").and_then(Value::as_bool) == Some(true)
    }

    /// Fields to request and emit, per the selection predicate
    pub fn selected_fields(&self) -> Vec<String> {
        self.schema
            .properties
            .iter()
            .filter(|(_, schema)| schema.is_selected())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Value of `key` in the stream-level (empty breadcrumb) metadata
    pub fn root_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata
            .iter()
            .find(|entry| entry.breadcrumb.is_empty())
            .and_then(|entry| entry.metadata.get(key))
    }

    /// Numeric activity type id (`marketo.activity-id`)
    pub fn activity_type_id(&self) -> Option<i64> {
        match self.root_metadata("marketo.activity-id")? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Human readable primary attribute label (`marketo.primary-attribute-name`)
    pub fn primary_attribute_name(&self) -> Option<&str> {
        self.root_metadata("marketo.primary-attribute-name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Schema as emitted in a `SCHEMA` message
    pub fn schema_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(&self.schema)?)
    }
}
