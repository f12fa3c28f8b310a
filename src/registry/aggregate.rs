//! Fold joined rows into relationship views grouped by type.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::{
    AttachedRecord, Entity, EntityColumns, EntityType, GroupedOutput, JoinedRow, RecordColumns,
    RelationshipView,
};
use crate::error::{RelregError, Result};

/// (relationship type, source id, destination id)
type ViewKey = (String, i64, i64);

/// Group `rows` by relationship type and merge rows sharing a
/// (type, source, destination) triple into a single view.
///
/// Types and views keep first-seen order; patients keep row order. A row
/// whose patient id is NULL contributes its view but no patient. Fails on
/// the first malformed row or unrecognized entity tag without returning
/// partial output.
pub fn aggregate<I>(rows: I) -> Result<GroupedOutput>
where
    I: IntoIterator<Item = JoinedRow>,
{
    let mut groups: Vec<(String, Vec<RelationshipView>)> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();
    let mut view_index: HashMap<ViewKey, usize> = HashMap::new();
    let mut relationship_keys: HashMap<i64, ViewKey> = HashMap::new();
    let mut row_count = 0usize;

    for (position, row) in rows.into_iter().enumerate() {
        row_count += 1;
        let JoinedRow {
            relationship_id,
            relationship_type,
            source,
            destination,
            record,
        } = row;

        if relationship_type.trim().is_empty() {
            return Err(RelregError::MalformedRow(format!(
                "row {}: relationship {} has no relationship type",
                position, relationship_id
            )));
        }

        let key: ViewKey = (relationship_type, source.entity_id, destination.entity_id);
        match relationship_keys.entry(relationship_id) {
            Entry::Occupied(seen) if *seen.get() != key => {
                return Err(RelregError::MalformedRow(format!(
                    "row {}: relationship {} changed from {:?} to {:?}",
                    position,
                    relationship_id,
                    seen.get(),
                    key
                )));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(key.clone());
            }
        }

        let source = to_entity(source, "source", position)?;
        let destination = to_entity(destination, "destination", position)?;
        let record = to_record(record, relationship_id, position)?;

        let group = match group_index.get(&key.0) {
            Some(&g) => g,
            None => {
                groups.push((key.0.clone(), Vec::new()));
                group_index.insert(key.0.clone(), groups.len() - 1);
                groups.len() - 1
            }
        };
        let views = &mut groups[group].1;

        match view_index.entry(key) {
            Entry::Occupied(slot) => {
                let view = &mut views[*slot.get()];
                if view.source != source || view.destination != destination {
                    return Err(RelregError::MalformedRow(format!(
                        "row {}: endpoint data for relationship {} disagrees with earlier rows",
                        position, relationship_id
                    )));
                }
                view.patients.extend(record);
            }
            Entry::Vacant(slot) => {
                slot.insert(views.len());
                views.push(RelationshipView {
                    source,
                    destination,
                    patients: record.into_iter().collect(),
                });
            }
        }
    }

    let output = GroupedOutput::from_groups(groups);
    log::debug!(
        "Aggregated {} rows into {} views across {} relationship types",
        row_count,
        output.view_count(),
        output.len()
    );
    Ok(output)
}

fn to_entity(columns: EntityColumns, role: &str, position: usize) -> Result<Entity> {
    let EntityColumns {
        entity_id,
        name,
        entity_type,
    } = columns;

    let name = name.ok_or_else(|| {
        RelregError::MalformedRow(format!(
            "row {}: {} entity {} has no name",
            position, role, entity_id
        ))
    })?;
    let tag = entity_type.ok_or_else(|| {
        RelregError::MalformedRow(format!(
            "row {}: {} entity {} has no entity type",
            position, role, entity_id
        ))
    })?;
    let entity_type = tag.parse::<EntityType>().map_err(|_| {
        log::error!("Entity {} carries unknown type tag {:?}", entity_id, tag);
        RelregError::DataIntegrity(format!(
            "Unrecognized entity type of \"{}\" for entity with name \"{}\"",
            tag, name
        ))
    })?;

    Ok(Entity {
        entity_id,
        name,
        entity_type,
    })
}

fn to_record(
    columns: RecordColumns,
    relationship_id: i64,
    position: usize,
) -> Result<Option<AttachedRecord>> {
    let RecordColumns {
        patient_id,
        patient_type,
        contact_phone,
        instructions,
    } = columns;

    let Some(patient_id) = patient_id else {
        if patient_type.is_some() || contact_phone.is_some() || instructions.is_some() {
            return Err(RelregError::MalformedRow(format!(
                "row {}: patient fields present without a patient id",
                position
            )));
        }
        return Ok(None);
    };

    let patient_type = patient_type.ok_or_else(|| {
        RelregError::MalformedRow(format!(
            "row {}: patient {} has no patient type",
            position, patient_id
        ))
    })?;

    Ok(Some(AttachedRecord {
        patient_id,
        relationship_id,
        patient_type,
        contact_phone,
        instructions,
    }))
}
