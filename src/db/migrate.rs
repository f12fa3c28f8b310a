//! Registry schema migrations, tracked through `PRAGMA user_version`.

use rusqlite::Connection;
use crate::error::{Result, RelregError};

/// Latest schema version this binary knows how to create.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

const MIGRATIONS: &[(u32, &str)] = &[
    (1, include_str!("../../migrations/001_registry_tables.sql")),
    (2, include_str!("../../migrations/002_registry_indexes.sql")),
];

/// Columns the lookup join reads, per table.
const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    ("entities", &["entity_id", "name", "entity_type"]),
    (
        "relationships",
        &["relationship_id", "relationship_type", "source_entity_id", "destination_entity_id"],
    ),
    (
        "patients",
        &["patient_id", "relationship_id", "patient_type", "contact_phone", "instructions"],
    ),
];

pub fn schema_version(conn: &Connection) -> Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version)
        .map_err(|_| RelregError::Config(format!("Invalid registry schema version {}", version)))
}

/// Apply every migration newer than the stored schema version; returns the resulting version.
pub fn run_migrations(conn: &mut Connection) -> Result<u32> {
    let mut current = schema_version(conn)?;
    if current > LATEST_SCHEMA_VERSION {
        return Err(RelregError::Config(format!(
            "Registry schema version {} is newer than this build supports ({})",
            current, LATEST_SCHEMA_VERSION
        )));
    }

    for &(version, sql) in MIGRATIONS {
        if version <= current {
            continue;
        }
        log::info!("Migrating registry schema {} -> {}", current, version);

        let tx = conn.transaction()?;
        tx.execute_batch(sql).map_err(|e| {
            RelregError::Config(format!("Registry migration {} failed: {}", version, e))
        })?;
        tx.pragma_update(None, "user_version", i64::from(version))?;
        tx.commit()?;
        current = version;
    }

    log::debug!("Registry schema at version {}", current);
    Ok(current)
}

/// Describe every table or column the lookup join needs but the database lacks.
pub fn schema_problems(conn: &Connection) -> Result<Vec<String>> {
    let mut problems = Vec::new();
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;

    for (table, columns) in REQUIRED_COLUMNS {
        let present: Vec<String> = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        if present.is_empty() {
            problems.push(format!("missing table {}", table));
            continue;
        }
        for column in columns.iter() {
            if !present.iter().any(|c| c == column) {
                problems.push(format!("missing column {}.{}", table, column));
            }
        }
    }

    Ok(problems)
}
