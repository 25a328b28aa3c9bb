//! Validation for metadata filters and identifiers that end up inside
//! generated query text.

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::vector::{MetadataFilter, MetadataValue};

/// Longest accepted metadata key or collection name.
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Check that a metadata key is safe to splice into a query path.
///
/// Accepted keys are 1 to [`MAX_IDENTIFIER_LEN`] characters of ASCII
/// letters, digits, `_` and `-`.
pub fn validate_filter_key(key: &str) -> StoreResult<()> {
    if key.trim().is_empty() {
        return Err(StoreError::invalid_argument(
            "Filter key cannot be empty or whitespace",
        ));
    }

    if key.len() > MAX_IDENTIFIER_LEN {
        return Err(StoreError::invalid_argument(format!(
            "Filter key exceeds {} characters",
            MAX_IDENTIFIER_LEN
        )));
    }

    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        debug!("Rejecting filter key {:?}", key);
        return Err(StoreError::invalid_argument(format!(
            "Invalid character in filter key: {}",
            key
        )));
    }

    Ok(())
}

/// Validate a whole filter map before any query is built.
///
/// The map must be non-empty and every key must pass
/// [`validate_filter_key`].
pub fn validate_filters(filters: &MetadataFilter) -> StoreResult<()> {
    if filters.is_empty() {
        return Err(StoreError::invalid_argument(
            "Metadata filters cannot be empty",
        ));
    }

    for key in filters.keys() {
        validate_filter_key(key)?;
    }

    Ok(())
}

/// Check that a collection name can be used verbatim as a SQL table name.
///
/// Stricter than filter keys: must start with a letter or `_`, then ASCII
/// letters, digits or `_`.
pub fn validate_collection_name(name: &str) -> StoreResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);

    if !valid_start
        || name.len() > MAX_IDENTIFIER_LEN
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(StoreError::invalid_argument(format!(
            "Invalid collection name: {:?}",
            name
        )));
    }

    Ok(())
}

/// Build a typed filter from an untyped JSON object.
///
/// Null, array and object values are rejected, as are invalid keys.
pub fn filters_from_json(value: serde_json::Value) -> StoreResult<MetadataFilter> {
    let serde_json::Value::Object(map) = value else {
        return Err(StoreError::invalid_argument(
            "Metadata filters must be a JSON object",
        ));
    };

    let mut filters = MetadataFilter::new();
    for (key, value) in map {
        validate_filter_key(&key)?;
        if value.is_null() {
            return Err(StoreError::invalid_argument(format!(
                "Metadata value for key '{}' cannot be null",
                key
            )));
        }
        filters.insert(key, MetadataValue::try_from(value)?);
    }

    validate_filters(&filters)?;
    Ok(filters)
}

// ============================================================================
// Tests
// ============================================================================
