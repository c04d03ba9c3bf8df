//! Forward-only schema migrations.
//!
//! The version lives in `schema_meta`. Each step runs in its own transaction and
//! bumps the version only when it succeeds.

use rusqlite::{Connection, OptionalExtension};

pub const CURRENT_SCHEMA_VERSION: u32 = 2;

const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
const DEFAULT_EMBEDDING_DIMENSION: usize = crate::embedding::EMBEDDING_DIM;

pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let raw = meta_value(conn, "schema_version")?;
    Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
}

fn meta_value(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = ?1",
        [key],
        |row| row.get(0),
    )
    .optional()
}

fn set_meta_value(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}

/// Embedding model and dimension the stored data was produced with.
pub fn get_embedding_info(conn: &Connection) -> rusqlite::Result<Option<(String, usize)>> {
    let model = meta_value(conn, "embedding_model")?;
    let dimension = meta_value(conn, "embedding_dimension")?.and_then(|d| d.parse().ok());
    Ok(model.zip(dimension))
}

pub fn set_embedding_info(conn: &Connection, model: &str, dimension: usize) -> rusqlite::Result<()> {
    set_meta_value(conn, "embedding_model", model)?;
    set_meta_value(conn, "embedding_dimension", &dimension.to_string())
}

pub fn run_migrations(conn: &mut Connection) -> rusqlite::Result<()> {
    let mut version = get_schema_version(conn)?;
    tracing::debug!(schema_version = version, target = CURRENT_SCHEMA_VERSION, "checking migrations");

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        tracing::info!(from = version, to = next, "running migration");

        let tx = conn.transaction()?;
        match next {
            2 => migrate_v1_to_v2(&tx)?,
            _ => {
                tracing::error!(version = next, "unknown migration target");
                break;
            }
        }
        tx.execute(
            "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
            [next.to_string()],
        )?;
        tx.commit()?;
        version = next;
    }

    Ok(())
}

/// v1 → v2: record which embedding model and dimension the store was created under.
fn migrate_v1_to_v2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        [DEFAULT_EMBEDDING_MODEL],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('embedding_dimension', ?1)",
        [DEFAULT_EMBEDDING_DIMENSION.to_string()],
    )?;
    Ok(())
}
