//! Registry lookup: "what relationships involve entity X".
//!
//! A lookup turns a [`LookupRequest`] into a parameterized [`Predicate`],
//! runs it through a [`RowSource`] and folds the flat joined rows into a
//! [`GroupedOutput`] keyed by relationship type.

mod aggregate;
mod directory;
mod filter;
mod predicate;
pub(crate) mod source;

pub use aggregate::aggregate;
pub use directory::{list_entities, load_directory, EntityDirectory};
pub use filter::{Associativity, FilterSpec, LookupRequest, SubjectId};
pub use predicate::{build_predicate, Clause, Predicate, SqlArg};
pub use source::{lookup, lookup_relationships, RowSource, SqliteRowSource};

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::RelregError;

/// Kind of registry member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Hospital,
    Ems,
}

impl EntityType {
    pub const ALL: [EntityType; 2] = [EntityType::Hospital, EntityType::Ems];

    /// Tag as stored in `entities.entity_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Hospital => "HOSPITAL",
            EntityType::Ems => "EMS",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = RelregError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str() == tag)
            .ok_or_else(|| {
                RelregError::DataIntegrity(format!("Unrecognized entity type \"{}\"", tag))
            })
    }
}

/// Projection of a registry member seen through one end of a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub entity_id: i64,
    pub name: String,
    pub entity_type: EntityType,
}

/// Patient record attached to a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachedRecord {
    pub patient_id: i64,
    pub relationship_id: i64,
    pub patient_type: String,
    pub contact_phone: Option<String>,
    pub instructions: Option<String>,
}

/// Endpoint columns of a joined row. `name` and `entity_type` are NULL when
/// the LEFT JOIN found no entity for the endpoint id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityColumns {
    pub entity_id: i64,
    pub name: Option<String>,
    pub entity_type: Option<String>,
}

/// Patient columns of a joined row; all NULL when the relationship has no patients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordColumns {
    pub patient_id: Option<i64>,
    pub patient_type: Option<String>,
    pub contact_phone: Option<String>,
    pub instructions: Option<String>,
}

/// One row of the relationship/entity/patient join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedRow {
    pub relationship_id: i64,
    pub relationship_type: String,
    pub source: EntityColumns,
    pub destination: EntityColumns,
    pub record: RecordColumns,
}

/// One (source, destination) pair of a relationship type with every patient merged onto it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipView {
    pub source: Entity,
    pub destination: Entity,
    pub patients: Vec<AttachedRecord>,
}

/// Relationship views grouped by relationship type, in first-seen order.
///
/// Serializes as a JSON object keyed by relationship type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedOutput {
    groups: Vec<(String, Vec<RelationshipView>)>,
}

impl GroupedOutput {
    pub(crate) fn from_groups(groups: Vec<(String, Vec<RelationshipView>)>) -> Self {
        Self { groups }
    }

    pub fn get(&self, relationship_type: &str) -> Option<&[RelationshipView]> {
        self.groups
            .iter()
            .find(|(t, _)| t == relationship_type)
            .map(|(_, views)| views.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[RelationshipView])> {
        self.groups.iter().map(|(t, views)| (t.as_str(), views.as_slice()))
    }

    pub fn relationship_types(&self) -> Vec<&str> {
        self.groups.iter().map(|(t, _)| t.as_str()).collect()
    }

    /// Number of relationship types.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of relationship views across all types.
    pub fn view_count(&self) -> usize {
        self.groups.iter().map(|(_, views)| views.len()).sum()
    }
}

impl Serialize for GroupedOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (relationship_type, views) in &self.groups {
            map.serialize_entry(relationship_type, views)?;
        }
        map.end()
    }
}
