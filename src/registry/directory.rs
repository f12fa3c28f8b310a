//! Entity directory: every registry member's name, sorted by entity type.

use rusqlite::Connection;
use serde::Serialize;

use super::EntityType;
use crate::db::Db;
use crate::error::{RelregError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityDirectory {
    pub hospital_list: Vec<String>,
    pub ems_list: Vec<String>,
}

/// List entity names by type, in entity id order.
///
/// An entity whose tag is not a known [`EntityType`] aborts the listing.
pub fn list_entities(conn: &Connection) -> Result<EntityDirectory> {
    let mut stmt = conn.prepare("SELECT entity_type, name FROM entities ORDER BY entity_id")?;
    let mut rows = stmt.query([])?;
    let mut directory = EntityDirectory::default();

    while let Some(row) = rows.next()? {
        let tag: String = row.get(0)?;
        let name: String = row.get(1)?;
        match tag.parse::<EntityType>() {
            Ok(EntityType::Hospital) => directory.hospital_list.push(name),
            Ok(EntityType::Ems) => directory.ems_list.push(name),
            Err(_) => {
                return Err(RelregError::DataIntegrity(format!(
                    "Unrecognized entity type of \"{}\" for entity with name \"{}\"",
                    tag, name
                )))
            }
        }
    }

    Ok(directory)
}

pub async fn load_directory(db: &Db) -> Result<EntityDirectory> {
    db.with_connection(|conn| list_entities(conn)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::source::tests::seed_registry;
    use tempfile::TempDir;

    #[test]
    fn test_directory_splits_by_type() {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = Connection::open(temp_dir.path().join("test.db")).unwrap();
        seed_registry(&mut conn).unwrap();

        let directory = list_entities(&conn).unwrap();
        assert_eq!(directory.hospital_list, vec!["St. Mary", "County General"]);
        assert_eq!(directory.ems_list, vec!["Medic 4", "Air One"]);
    }

    #[test]
    fn test_directory_rejects_unknown_tag() {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = Connection::open(temp_dir.path().join("test.db")).unwrap();
        seed_registry(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO entities (entity_id, name, entity_type) VALUES (50, 'Urgent Care', 'CLINIC')",
            [],
        )
        .unwrap();

        let err = list_entities(&conn).unwrap_err();
        assert!(matches!(err, RelregError::DataIntegrity(_)));
        assert!(err.to_string().contains("Urgent Care"));
    }

    #[tokio::test]
    async fn test_load_directory_empty_registry() {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("test.db"));
        db.with_connection(|conn| crate::db::migrate::run_migrations(conn))
            .await
            .unwrap();

        assert_eq!(load_directory(&db).await.unwrap(), EntityDirectory::default());
    }
}
