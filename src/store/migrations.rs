use anyhow::{bail, Context, Result};
use rusqlite::Connection;

pub const SCHEMA_VERSION: i32 = 1;

const SCHEMA: &str = include_str!("schemas/schema_v1.sql");

/// Creates the `blobs` table on a fresh database and stamps `user_version`.
/// Databases written by a newer build are refused rather than touched.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")?;

    match version {
        SCHEMA_VERSION => Ok(()),
        v if v > SCHEMA_VERSION => bail!(
            "blob store schema v{v} is newer than this build understands (v{SCHEMA_VERSION})"
        ),
        _ => conn
            .execute_batch(&format!(
                "BEGIN;\n{SCHEMA}\nPRAGMA user_version = {SCHEMA_VERSION};\nCOMMIT;"
            ))
            .context("failed to create blob store schema"),
    }
}
