//! The canonical vector record and its metadata values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{StoreError, StoreResult};

/// Metadata attached to a vector, keyed by free-form string keys.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Exact-match filter over metadata. All pairs must match (logical AND).
pub type MetadataFilter = BTreeMap<String, MetadataValue>;

// ============================================================================
// MetadataValue
// ============================================================================

/// A primitive metadata value.
///
/// Serialized as the bare JSON primitive, so `{"page": 3}` round-trips as an
/// integer and `{"draft": true}` as a boolean. There is no null variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl MetadataValue {
    /// Name of the value kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            MetadataValue::Bool(_) => "bool",
            MetadataValue::Integer(_) => "integer",
            MetadataValue::Float(_) => "float",
            MetadataValue::String(_) => "string",
        }
    }

    /// Convert to an untyped JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            MetadataValue::Bool(b) => serde_json::Value::Bool(*b),
            MetadataValue::Integer(i) => serde_json::Value::from(*i),
            MetadataValue::Float(f) => serde_json::Value::from(*f),
            MetadataValue::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{}", b),
            MetadataValue::Integer(i) => write!(f, "{}", i),
            MetadataValue::Float(v) => write!(f, "{}", v),
            MetadataValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        MetadataValue::Integer(i64::from(value))
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

impl TryFrom<serde_json::Value> for MetadataValue {
    type Error = StoreError;

    /// Narrow an untyped JSON value. Null, arrays and objects are rejected.
    fn try_from(value: serde_json::Value) -> StoreResult<Self> {
        match value {
            serde_json::Value::Bool(b) => Ok(MetadataValue::Bool(b)),
            serde_json::Value::String(s) => Ok(MetadataValue::String(s)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(MetadataValue::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(MetadataValue::Float(f))
                } else {
                    Err(StoreError::invalid_argument(format!(
                        "Metadata number {} is out of range",
                        n
                    )))
                }
            }
            serde_json::Value::Null => Err(StoreError::invalid_argument(
                "Metadata value cannot be null",
            )),
            other => Err(StoreError::invalid_argument(format!(
                "Metadata value must be a string, number or boolean, got {}",
                other
            ))),
        }
    }
}

// ============================================================================
// Vector
// ============================================================================

/// A stored entry: text, metadata and the embedding computed from the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    /// Unique identifier within a collection.
    pub id: String,

    /// Original content the embedding was computed from.
    #[serde(default)]
    pub text: String,

    /// Free-form metadata, usable as a filter target.
    #[serde(default)]
    pub metadata: Metadata,

    /// Embedding vector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Dissimilarity to the query. Only set on search results; lower is closer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

impl Vector {
    /// Create a vector with a generated id.
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), text)
    }

    /// Create a vector with a caller-supplied id.
    pub fn with_id(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: Metadata::new(),
            embedding: None,
            distance: None,
        }
    }

    /// Set the embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Replace the whole metadata map.
    pub fn with_metadata_map(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set the distance.
    pub fn with_distance(mut self, distance: f32) -> Self {
        self.distance = Some(distance);
        self
    }
}

/// Collect the ids of a batch, in input order.
pub fn collect_ids(items: &[Vector]) -> Vec<String> {
    items.iter().map(|item| item.id.clone()).collect()
}

// ============================================================================
// Tests
// ============================================================================
