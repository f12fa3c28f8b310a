//! WHERE-clause construction for relationship lookups.
//!
//! Clause text only ever holds column names, operators and `?` placeholders;
//! every caller-supplied value travels as a bound [`SqlArg`]. Column aliases:
//! `r` relationships, `src`/`dst` endpoint entities, `p` patients.

use rusqlite::types::ToSqlOutput;
use rusqlite::ToSql;

use super::filter::{Associativity, FilterSpec, SubjectId};
use super::EntityType;

/// Value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlArg {
    Int(i64),
    Text(String),
}

impl ToSql for SqlArg {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SqlArg::Int(v) => v.to_sql(),
            SqlArg::Text(s) => s.to_sql(),
        }
    }
}

/// One conjunct and the arguments for its placeholders, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub sql: String,
    pub args: Vec<SqlArg>,
}

/// Conjunction of clauses. Always holds at least the subject clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Predicate text, each clause parenthesised and joined with `AND`.
    pub fn sql(&self) -> String {
        self.clauses
            .iter()
            .map(|c| format!("({})", c.sql))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Bound arguments in placeholder order.
    pub fn args(&self) -> Vec<SqlArg> {
        self.clauses.iter().flat_map(|c| c.args.iter().cloned()).collect()
    }

    pub fn into_parts(self) -> (String, Vec<SqlArg>) {
        let sql = self.sql();
        let args = self.args();
        (sql, args)
    }
}

/// Build the lookup predicate for `subject` under `filter`.
///
/// Empty `relationship_types` / `entity_types` lists add no clause, so they
/// behave exactly like the option being absent.
pub fn build_predicate(subject: SubjectId, filter: &FilterSpec) -> Predicate {
    let id = SqlArg::Int(subject.get());
    let counter_types = &filter.entity_types;
    let mut clauses = Vec::with_capacity(3);

    match filter.associativity {
        Associativity::Source => {
            clauses.push(Clause {
                sql: "r.source_entity_id = ?".to_string(),
                args: vec![id],
            });
            if !counter_types.is_empty() {
                clauses.push(entity_type_clause("dst", counter_types));
            }
        }
        Associativity::Destination => {
            clauses.push(Clause {
                sql: "r.destination_entity_id = ?".to_string(),
                args: vec![id],
            });
            if !counter_types.is_empty() {
                clauses.push(entity_type_clause("src", counter_types));
            }
        }
        Associativity::Either if counter_types.is_empty() => {
            clauses.push(Clause {
                sql: "r.source_entity_id = ? OR r.destination_entity_id = ?".to_string(),
                args: vec![id.clone(), id],
            });
        }
        Associativity::Either => {
            // counter-party is whichever endpoint the subject isn't
            let as_source = entity_type_clause("dst", counter_types);
            let as_destination = entity_type_clause("src", counter_types);
            let mut args = vec![id.clone()];
            args.extend(as_source.args);
            args.push(id);
            args.extend(as_destination.args);
            clauses.push(Clause {
                sql: format!(
                    "(r.source_entity_id = ? AND {}) OR (r.destination_entity_id = ? AND {})",
                    as_source.sql, as_destination.sql
                ),
                args,
            });
        }
    }

    if !filter.relationship_types.is_empty() {
        clauses.push(Clause {
            sql: format!(
                "r.relationship_type IN ({})",
                placeholders(filter.relationship_types.len())
            ),
            args: filter
                .relationship_types
                .iter()
                .map(|t| SqlArg::Text(t.clone()))
                .collect(),
        });
    }

    Predicate { clauses }
}

fn entity_type_clause(alias: &str, types: &[EntityType]) -> Clause {
    Clause {
        sql: format!("{}.entity_type IN ({})", alias, placeholders(types.len())),
        args: types
            .iter()
            .map(|t| SqlArg::Text(t.as_str().to_string()))
            .collect(),
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(id: i64) -> SubjectId {
        SubjectId::new(id).unwrap()
    }

    fn text(s: &str) -> SqlArg {
        SqlArg::Text(s.to_string())
    }

    #[test]
    fn test_no_filter_matches_either_role() {
        let predicate = build_predicate(subject(7), &FilterSpec::default());
        assert_eq!(
            predicate.sql(),
            "(r.source_entity_id = ? OR r.destination_entity_id = ?)"
        );
        assert_eq!(predicate.args(), vec![SqlArg::Int(7), SqlArg::Int(7)]);
    }

    #[test]
    fn test_source_with_type_binds_subject_once() {
        let filter = FilterSpec::default()
            .with_relationship_types(["TRANSFER"])
            .unwrap()
            .with_associativity(Associativity::Source);
        let (sql, args) = build_predicate(subject(7), &filter).into_parts();

        assert_eq!(
            sql,
            "(r.source_entity_id = ?) AND (r.relationship_type IN (?))"
        );
        assert!(!sql.contains("destination"));
        assert_eq!(args, vec![SqlArg::Int(7), text("TRANSFER")]);
        assert_eq!(args.iter().filter(|a| **a == SqlArg::Int(7)).count(), 1);
    }

    #[test]
    fn test_destination_only() {
        let filter = FilterSpec::default().with_associativity(Associativity::Destination);
        let predicate = build_predicate(subject(3), &filter);
        assert_eq!(predicate.sql(), "(r.destination_entity_id = ?)");
        assert_eq!(predicate.args(), vec![SqlArg::Int(3)]);
    }

    #[test]
    fn test_empty_type_list_omits_clause() {
        let mut filter = FilterSpec::default();
        filter.relationship_types = Vec::new();
        filter.entity_types = Vec::new();
        let predicate = build_predicate(subject(7), &filter);

        assert_eq!(predicate, build_predicate(subject(7), &FilterSpec::default()));
        assert!(!predicate.sql().contains("IN ()"));
        assert_eq!(predicate.clauses().len(), 1);
    }

    #[test]
    fn test_multiple_types_get_one_placeholder_each() {
        let filter = FilterSpec::default()
            .with_relationship_types(["TRANSFER", "AFFILIATION", "MUTUAL_AID"])
            .unwrap();
        let predicate = build_predicate(subject(1), &filter);
        assert!(predicate.sql().ends_with("(r.relationship_type IN (?, ?, ?))"));
        let sql = predicate.sql();
        assert_eq!(sql.matches('?').count(), predicate.args().len());
    }

    #[test]
    fn test_values_never_interpolated() {
        let hostile = "TRANSFER') OR 1=1 --";
        let filter = FilterSpec::default().with_relationship_types([hostile]).unwrap();
        let predicate = build_predicate(subject(9), &filter);
        assert!(!predicate.sql().contains("TRANSFER"));
        assert!(!predicate.sql().contains('9'));
        assert_eq!(predicate.args()[2], text(hostile));
    }

    #[test]
    fn test_counter_party_type_with_source() {
        let filter = FilterSpec::default()
            .with_entity_types([EntityType::Hospital])
            .with_associativity(Associativity::Source);
        let predicate = build_predicate(subject(7), &filter);
        assert_eq!(
            predicate.sql(),
            "(r.source_entity_id = ?) AND (dst.entity_type IN (?))"
        );
        assert_eq!(predicate.args(), vec![SqlArg::Int(7), text("HOSPITAL")]);
    }

    #[test]
    fn test_counter_party_type_with_destination() {
        let filter = FilterSpec::default()
            .with_entity_types([EntityType::Ems])
            .with_associativity(Associativity::Destination);
        let predicate = build_predicate(subject(7), &filter);
        assert_eq!(
            predicate.sql(),
            "(r.destination_entity_id = ?) AND (src.entity_type IN (?))"
        );
    }

    #[test]
    fn test_counter_party_type_with_either_role() {
        let filter = FilterSpec::default()
            .with_entity_types([EntityType::Hospital, EntityType::Ems])
            .with_relationship_types(["TRANSFER"])
            .unwrap();
        let predicate = build_predicate(subject(7), &filter);
        assert_eq!(
            predicate.sql(),
            "((r.source_entity_id = ? AND dst.entity_type IN (?, ?)) OR \
             (r.destination_entity_id = ? AND src.entity_type IN (?, ?))) AND \
             (r.relationship_type IN (?))"
        );
        assert_eq!(
            predicate.args(),
            vec![
                SqlArg::Int(7),
                text("HOSPITAL"),
                text("EMS"),
                SqlArg::Int(7),
                text("HOSPITAL"),
                text("EMS"),
                text("TRANSFER"),
            ]
        );
    }
}
