//! SQL text for the SQLite collection table.
//!
//! The table name is interpolated, so callers must pass a name that already
//! passed `validate_collection_name`. Every value goes through a bound
//! parameter; metadata keys are only interpolated after
//! `validate_filter_key`.

use super::distance::DISTANCE_FUNCTION;
use vecstore_core::MetadataValue;

/// `CREATE TABLE IF NOT EXISTS` for a collection.
pub fn create_table(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" (\
         id TEXT PRIMARY KEY, \
         vector TEXT NOT NULL, \
         document TEXT NOT NULL)"
    )
}

/// Insert one row. Params: id, vector, document.
pub fn insert(table: &str) -> String {
    format!("INSERT INTO \"{table}\" (id, vector, document) VALUES (?1, ?2, ?3)")
}

/// Delete one row by id. Params: id.
pub fn delete(table: &str) -> String {
    format!("DELETE FROM \"{table}\" WHERE id = ?1")
}

/// Fetch one row by id. Params: id.
pub fn select_by_id(table: &str) -> String {
    format!("SELECT vector, document FROM \"{table}\" WHERE id = ?1")
}

/// Exact row count.
pub fn count(table: &str) -> String {
    format!("SELECT COUNT(*) FROM \"{table}\"")
}

/// Nearest rows by the registered distance function.
/// Params: query vector (JSON), strategy name, limit.
pub fn search(table: &str) -> String {
    format!(
        "SELECT id, document, {DISTANCE_FUNCTION}(vector, ?1, ?2) AS d \
         FROM \"{table}\" ORDER BY d LIMIT ?3"
    )
}

/// Rows whose serialized metadata matches every pair. Params: one value per
/// pair, in iteration order.
///
/// Each predicate also checks the JSON type, since `json_extract` yields 1
/// and 0 for JSON booleans. Boolean pairs compare `json_type` against a bound
/// `'true'` or `'false'`; numbers match integer or real values; strings
/// match text values.
pub fn select_by_metadata<'a>(
    table: &str,
    filters: impl IntoIterator<Item = (&'a str, &'a MetadataValue)>,
) -> String {
    let clauses: Vec<String> = filters
        .into_iter()
        .enumerate()
        .map(|(i, (key, value))| {
            let path = format!("'$.metadata.\"{}\"'", key);
            let n = i + 1;
            match value {
                MetadataValue::Bool(_) => format!("json_type(document, {path}) = ?{n}"),
                MetadataValue::Integer(_) | MetadataValue::Float(_) => format!(
                    "json_type(document, {path}) IN ('integer', 'real') \
                     AND json_extract(document, {path}) = ?{n}"
                ),
                MetadataValue::String(_) => format!(
                    "json_type(document, {path}) = 'text' \
                     AND json_extract(document, {path}) = ?{n}"
                ),
            }
        })
        .collect();

    format!(
        "SELECT id, vector, document FROM \"{table}\" WHERE {}",
        clauses.join(" AND ")
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table() {
        let sql = create_table("docs");
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"docs\""));
        assert!(sql.contains("id TEXT PRIMARY KEY"));
        assert!(sql.contains("vector TEXT NOT NULL"));
        assert!(sql.contains("document TEXT NOT NULL"));
    }

    #[test]
    fn test_search_orders_by_distance() {
        let sql = search("docs");
        assert!(sql.contains("distance(vector, ?1, ?2) AS d"));
        assert!(sql.ends_with("ORDER BY d LIMIT ?3"));
    }

    #[test]
    fn test_select_by_metadata_numbers_params_in_key_order() {
        let a = MetadataValue::from(1);
        let b = MetadataValue::from("x");
        let sql = select_by_metadata("docs", [("a", &a), ("b", &b)]);
        assert_eq!(
            sql,
            "SELECT id, vector, document FROM \"docs\" WHERE \
             json_type(document, '$.metadata.\"a\"') IN ('integer', 'real') \
             AND json_extract(document, '$.metadata.\"a\"') = ?1 AND \
             json_type(document, '$.metadata.\"b\"') = 'text' \
             AND json_extract(document, '$.metadata.\"b\"') = ?2"
        );
    }

    #[test]
    fn test_select_by_metadata_compares_bool_by_json_type() {
        let flag = MetadataValue::from(true);
        let sql = select_by_metadata("docs", [("flag", &flag)]);
        assert!(sql.ends_with("WHERE json_type(document, '$.metadata.\"flag\"') = ?1"));
        assert!(!sql.contains("json_extract"));
    }
}
