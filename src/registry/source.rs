//! Row sources: where joined rows come from.

use rusqlite::{params_from_iter, Connection, Row};

use super::aggregate::aggregate;
use super::filter::LookupRequest;
use super::predicate::{build_predicate, Predicate};
use super::{EntityColumns, GroupedOutput, JoinedRow, RecordColumns};
use crate::db::Db;
use crate::error::{RelregError, Result};

/// Executes a lookup predicate and yields the joined rows.
pub trait RowSource {
    fn fetch(&mut self, predicate: &Predicate) -> Result<Vec<JoinedRow>>;
}

const JOINED_SELECT: &str = "SELECT r.relationship_id, r.relationship_type, \
            r.source_entity_id, src.name, src.entity_type, \
            r.destination_entity_id, dst.name, dst.entity_type, \
            p.patient_id, p.patient_type, p.contact_phone, p.instructions \
     FROM relationships r \
     LEFT JOIN entities src ON src.entity_id = r.source_entity_id \
     LEFT JOIN entities dst ON dst.entity_id = r.destination_entity_id \
     LEFT JOIN patients p ON p.relationship_id = r.relationship_id";

/// SQLite-backed row source over a borrowed connection.
pub struct SqliteRowSource<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteRowSource<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl RowSource for SqliteRowSource<'_> {
    fn fetch(&mut self, predicate: &Predicate) -> Result<Vec<JoinedRow>> {
        let query = format!(
            "{} WHERE {} ORDER BY r.relationship_id, p.patient_id",
            JOINED_SELECT,
            predicate.sql()
        );
        let mut stmt = self.conn.prepare(&query).map_err(RelregError::Database)?;
        let rows = stmt
            .query_map(params_from_iter(predicate.args()), read_joined_row)
            .map_err(RelregError::Database)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(row_error)?);
        }
        Ok(out)
    }
}

/// Decoding failures mean the stored row breaks the join's column contract;
/// anything else is the database itself failing.
fn row_error(e: rusqlite::Error) -> RelregError {
    match e {
        rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => {
            RelregError::MalformedRow(format!("joined row could not be decoded: {}", e))
        }
        other => RelregError::Database(other),
    }
}

fn read_joined_row(row: &Row<'_>) -> rusqlite::Result<JoinedRow> {
    Ok(JoinedRow {
        relationship_id: row.get(0)?,
        relationship_type: row.get(1)?,
        source: EntityColumns {
            entity_id: row.get(2)?,
            name: row.get(3)?,
            entity_type: row.get(4)?,
        },
        destination: EntityColumns {
            entity_id: row.get(5)?,
            name: row.get(6)?,
            entity_type: row.get(7)?,
        },
        record: RecordColumns {
            patient_id: row.get(8)?,
            patient_type: row.get(9)?,
            contact_phone: row.get(10)?,
            instructions: row.get(11)?,
        },
    })
}

/// Run one lookup against any row source.
pub fn lookup<S: RowSource + ?Sized>(source: &mut S, request: &LookupRequest) -> Result<GroupedOutput> {
    let predicate = build_predicate(request.subject, &request.filter);
    log::debug!(
        "Lookup for entity {}: WHERE {} ({} bound args)",
        request.subject.get(),
        predicate.sql(),
        predicate.args().len()
    );

    let rows = source.fetch(&predicate)?;
    log::debug!("Row source returned {} rows", rows.len());

    aggregate(rows)
}

/// Run one lookup against the registry database.
pub async fn lookup_relationships(db: &Db, request: LookupRequest) -> Result<GroupedOutput> {
    db.with_connection(move |conn| {
        let mut source = SqliteRowSource::new(conn);
        lookup(&mut source, &request)
    })
    .await
}
