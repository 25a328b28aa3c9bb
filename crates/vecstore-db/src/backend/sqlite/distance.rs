//! The `distance` scalar function registered on SQLite connections.

use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::{Connection, Error};
use vecstore_core::scoring::distance;
use vecstore_core::DistanceStrategy;

/// Name of the registered SQL function.
pub const DISTANCE_FUNCTION: &str = "distance";

/// Register `distance(a, b)` and `distance(a, b, strategy)` on a connection.
///
/// Vector arguments are JSON float arrays as stored in the `vector` column.
/// The two-argument form uses cosine distance. The result is always a
/// dissimilarity, so `ORDER BY` ascending puts the closest rows first.
pub fn register_distance_function(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function(DISTANCE_FUNCTION, 2, flags, |ctx| {
        let a = vector_arg(ctx, 0)?;
        let b = vector_arg(ctx, 1)?;
        Ok(f64::from(distance(DistanceStrategy::Cosine, &a, &b)))
    })?;

    conn.create_scalar_function(DISTANCE_FUNCTION, 3, flags, |ctx| {
        let a = vector_arg(ctx, 0)?;
        let b = vector_arg(ctx, 1)?;
        let strategy = ctx
            .get_raw(2)
            .as_str()
            .map_err(|e| Error::UserFunctionError(Box::new(e)))?
            .parse::<DistanceStrategy>()
            .map_err(|e| Error::UserFunctionError(Box::new(e)))?;
        Ok(f64::from(distance(strategy, &a, &b)))
    })?;

    Ok(())
}

/// Decode a JSON float array argument.
fn vector_arg(ctx: &Context<'_>, idx: usize) -> rusqlite::Result<Vec<f32>> {
    let raw = ctx
        .get_raw(idx)
        .as_str()
        .map_err(|e| Error::UserFunctionError(Box::new(e)))?;
    serde_json::from_str(raw).map_err(|e| Error::UserFunctionError(Box::new(e)))
}

// ============================================================================
// Tests
// ============================================================================
