pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

/// Open (or create) the Kencot database at `path` with schema and migrations applied.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    prepare(&mut conn)?;
    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// In-memory database with the same schema, for tests and the `memory` backend.
pub fn open_memory_database() -> Result<Connection> {
    let mut conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    prepare(&mut conn)?;
    Ok(conn)
}

fn prepare(conn: &mut Connection) -> Result<()> {
    schema::init_schema(conn).context("failed to initialize schema")?;
    migrations::run_migrations(conn).context("failed to run migrations")?;
    Ok(())
}

/// Warn when the store was created under a different embedding setup than the running one.
pub fn check_embedding_info(conn: &Connection, model: &str, dimension: usize) -> Result<()> {
    match migrations::get_embedding_info(conn)? {
        Some((stored_model, stored_dim)) if stored_model != model || stored_dim != dimension => {
            tracing::warn!(
                stored_model = %stored_model,
                stored_dim,
                model,
                dimension,
                "embedding configuration changed since the store was created, recording new values"
            );
            migrations::set_embedding_info(conn, model, dimension)?;
        }
        Some(_) => {}
        None => migrations::set_embedding_info(conn, model, dimension)?,
    }
    Ok(())
}
