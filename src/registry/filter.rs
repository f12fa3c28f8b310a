//! Lookup request parsing: subject id plus the optional filter vocabulary.
//!
//! Filter values of the wrong JSON type reject the whole request; nothing is
//! silently skipped. Unknown filter keys are ignored.

use serde_json::Value;

use super::EntityType;
use crate::error::{RelregError, Result};

/// Entity the lookup pivots on. Always a positive integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubjectId(i64);

impl SubjectId {
    pub fn new(id: i64) -> Result<Self> {
        if id <= 0 {
            return Err(RelregError::InvalidInput(format!(
                "entity_id must be a positive integer, got {}",
                id
            )));
        }
        Ok(Self(id))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

/// Which role the subject must play in a matching relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Associativity {
    Source,
    Destination,
    #[default]
    Either,
}

impl Associativity {
    /// Anything other than exactly `"source"` or `"destination"` means either role.
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) if s == "source" => Associativity::Source,
            Some(Value::String(s)) if s == "destination" => Associativity::Destination,
            None | Some(Value::Null) => Associativity::Either,
            Some(other) => {
                log::debug!("Unrecognized associativity {}, matching either role", other);
                Associativity::Either
            }
        }
    }
}

/// Parsed filter options. Empty lists mean "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub relationship_types: Vec<String>,
    pub entity_types: Vec<EntityType>,
    pub associativity: Associativity,
}

impl FilterSpec {
    /// Add relationship types, held to the same rules as the JSON option.
    pub fn with_relationship_types<I, S>(mut self, types: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for (i, t) in types.into_iter().enumerate() {
            let t = t.into();
            check_relationship_type(i, &t)?;
            push_unique(&mut self.relationship_types, t);
        }
        Ok(self)
    }

    pub fn with_entity_types<I: IntoIterator<Item = EntityType>>(mut self, types: I) -> Self {
        for t in types {
            push_unique(&mut self.entity_types, t);
        }
        self
    }

    /// Add entity types given as tags such as `"HOSPITAL"`.
    pub fn with_entity_type_tags<I, S>(mut self, tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            push_unique(&mut self.entity_types, entity_type_tag(tag.as_ref())?);
        }
        Ok(self)
    }

    pub fn with_associativity(mut self, associativity: Associativity) -> Self {
        self.associativity = associativity;
        self
    }

    /// Parse the `filters` object of a request. `null` yields the empty filter.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(obj) => obj,
            other => {
                return Err(RelregError::invalid_filter(
                    "filters",
                    format!("expected an object, got {}", json_type(other)),
                ))
            }
        };

        for key in obj.keys() {
            if !matches!(
                key.as_str(),
                "relationship_types" | "entity_types" | "associativity"
            ) {
                log::debug!("Ignoring unknown filter option '{}'", key);
            }
        }

        let relationship_types = match list_option(obj.get("relationship_types"), "relationship_types")? {
            Some(items) => parse_relationship_types(items)?,
            None => Vec::new(),
        };

        let entity_types = match list_option(obj.get("entity_types"), "entity_types")? {
            Some(items) => parse_entity_types(items)?,
            None => Vec::new(),
        };

        Ok(Self {
            relationship_types,
            entity_types,
            associativity: Associativity::from_json(obj.get("associativity")),
        })
    }
}

/// A validated lookup: subject plus filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub subject: SubjectId,
    pub filter: FilterSpec,
}

impl LookupRequest {
    pub fn new(subject: SubjectId, filter: FilterSpec) -> Self {
        Self { subject, filter }
    }

    /// Parse a request body of the form `{"entity_id": 7, "filters": {...}}`.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            RelregError::InvalidInput(format!(
                "request body must be a JSON object, got {}",
                json_type(value)
            ))
        })?;

        let subject = match obj.get("entity_id") {
            None | Some(Value::Null) => {
                return Err(RelregError::InvalidInput("entity_id is required".to_string()))
            }
            Some(Value::Number(n)) => match n.as_i64() {
                Some(id) => SubjectId::new(id)?,
                None => {
                    return Err(RelregError::InvalidInput(format!(
                        "entity_id must be an integer, got {}",
                        n
                    )))
                }
            },
            Some(other) => {
                return Err(RelregError::InvalidInput(format!(
                    "entity_id must be an integer, got {}",
                    json_type(other)
                )))
            }
        };

        let filter = match obj.get("filters") {
            Some(filters) => FilterSpec::from_json(filters)?,
            None => FilterSpec::default(),
        };

        Ok(Self { subject, filter })
    }
}

fn list_option<'a>(value: Option<&'a Value>, option: &str) -> Result<Option<&'a Vec<Value>>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(RelregError::invalid_filter(
            option,
            format!("expected an array, got {}", json_type(other)),
        )),
    }
}

fn parse_relationship_types(items: &[Value]) -> Result<Vec<String>> {
    let mut types = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match item {
            Value::String(s) => {
                check_relationship_type(i, s)?;
                push_unique(&mut types, s.clone());
            }
            other => {
                return Err(RelregError::invalid_filter(
                    "relationship_types",
                    format!("entry {} must be a string, got {}", i, json_type(other)),
                ))
            }
        }
    }
    Ok(types)
}

fn parse_entity_types(items: &[Value]) -> Result<Vec<EntityType>> {
    let mut types = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let tag = item.as_str().ok_or_else(|| {
            RelregError::invalid_filter(
                "entity_types",
                format!("entry {} must be a string, got {}", i, json_type(item)),
            )
        })?;
        push_unique(&mut types, entity_type_tag(tag)?);
    }
    Ok(types)
}

fn check_relationship_type(index: usize, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RelregError::invalid_filter(
            "relationship_types",
            format!("entry {} is an empty string", index),
        ));
    }
    Ok(())
}

fn entity_type_tag(tag: &str) -> Result<EntityType> {
    tag.parse::<EntityType>().map_err(|_| {
        RelregError::invalid_filter(
            "entity_types",
            format!("unrecognized entity type \"{}\"", tag),
        )
    })
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subject_id_must_be_positive() {
        assert_eq!(SubjectId::new(7).unwrap().get(), 7);
        assert!(matches!(SubjectId::new(0), Err(RelregError::InvalidInput(_))));
        assert!(matches!(SubjectId::new(-3), Err(RelregError::InvalidInput(_))));
    }

    #[test]
    fn test_request_full() {
        let req = LookupRequest::from_json(&json!({
            "entity_id": 7,
            "filters": {
                "relationship_types": ["TRANSFER", "TRANSFER", "AFFILIATION"],
                "entity_types": ["HOSPITAL"],
                "associativity": "source"
            }
        }))
        .unwrap();
        assert_eq!(req.subject.get(), 7);
        assert_eq!(req.filter.relationship_types, vec!["TRANSFER", "AFFILIATION"]);
        assert_eq!(req.filter.entity_types, vec![EntityType::Hospital]);
        assert_eq!(req.filter.associativity, Associativity::Source);
    }

    #[test]
    fn test_request_without_filters() {
        let req = LookupRequest::from_json(&json!({"entity_id": 3})).unwrap();
        assert_eq!(req.filter, FilterSpec::default());
        let req = LookupRequest::from_json(&json!({"entity_id": 3, "filters": null})).unwrap();
        assert_eq!(req.filter, FilterSpec::default());
    }

    #[test]
    fn test_request_entity_id_errors() {
        for body in [
            json!({}),
            json!({"entity_id": null}),
            json!({"entity_id": "7"}),
            json!({"entity_id": 7.5}),
            json!({"entity_id": -1}),
            json!([7]),
        ] {
            let err = LookupRequest::from_json(&body).unwrap_err();
            assert!(matches!(err, RelregError::InvalidInput(_)), "body {} gave {:?}", body, err);
        }
    }

    #[test]
    fn test_relationship_types_not_a_list_rejected() {
        let err = FilterSpec::from_json(&json!({"relationship_types": "TRANSFER"})).unwrap_err();
        match err {
            RelregError::InvalidFilter { option, .. } => assert_eq!(option, "relationship_types"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_non_string_relationship_type_rejected_not_skipped() {
        let err = FilterSpec::from_json(&json!({"relationship_types": ["TRANSFER", 5]})).unwrap_err();
        assert!(err.to_string().contains("entry 1"));
        assert!(FilterSpec::from_json(&json!({"relationship_types": [""]})).is_err());
    }

    #[test]
    fn test_empty_relationship_types_is_no_filter() {
        let filter = FilterSpec::from_json(&json!({"relationship_types": []})).unwrap();
        assert_eq!(filter, FilterSpec::default());
    }

    #[test]
    fn test_unknown_entity_type_filter_rejected() {
        let err = FilterSpec::from_json(&json!({"entity_types": ["CLINIC"]})).unwrap_err();
        assert!(matches!(err, RelregError::InvalidFilter { .. }));
        assert!(FilterSpec::from_json(&json!({"entity_types": [1]})).is_err());
        assert!(FilterSpec::from_json(&json!({"entity_types": {"a": 1}})).is_err());
    }

    #[test]
    fn test_filters_must_be_object() {
        assert!(matches!(
            FilterSpec::from_json(&json!(["TRANSFER"])),
            Err(RelregError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_associativity_values() {
        assert_eq!(Associativity::from_json(Some(&json!("source"))), Associativity::Source);
        assert_eq!(
            Associativity::from_json(Some(&json!("destination"))),
            Associativity::Destination
        );
        assert_eq!(Associativity::from_json(None), Associativity::Either);
        assert_eq!(Associativity::from_json(Some(&json!("Source"))), Associativity::Either);
        assert_eq!(Associativity::from_json(Some(&json!(1))), Associativity::Either);
    }

    #[test]
    fn test_unknown_filter_keys_ignored() {
        let filter = FilterSpec::from_json(&json!({"colour": "blue"})).unwrap();
        assert_eq!(filter, FilterSpec::default());
    }

    #[test]
    fn test_builder_dedups() {
        let filter = FilterSpec::default()
            .with_relationship_types(["TRANSFER", "TRANSFER"])
            .unwrap()
            .with_entity_types([EntityType::Ems, EntityType::Ems])
            .with_associativity(Associativity::Destination);
        assert_eq!(filter.relationship_types, vec!["TRANSFER"]);
        assert_eq!(filter.entity_types, vec![EntityType::Ems]);
        assert_eq!(filter.associativity, Associativity::Destination);
    }

    #[test]
    fn test_builder_rejects_blank_relationship_type() {
        for blank in ["", "   "] {
            let err = FilterSpec::default()
                .with_relationship_types(["TRANSFER", blank])
                .unwrap_err();
            match err {
                RelregError::InvalidFilter { option, reason } => {
                    assert_eq!(option, "relationship_types");
                    assert!(reason.contains("entry 1"));
                }
                other => panic!("unexpected error {:?}", other),
            }
        }
    }

    #[test]
    fn test_builder_entity_type_tags() {
        let filter = FilterSpec::default()
            .with_entity_type_tags(["EMS", "HOSPITAL", "EMS"])
            .unwrap();
        assert_eq!(filter.entity_types, vec![EntityType::Ems, EntityType::Hospital]);

        let err = FilterSpec::default().with_entity_type_tags(["CLINIC"]).unwrap_err();
        assert!(matches!(err, RelregError::InvalidFilter { ref option, .. } if option == "entity_types"));
        assert!(err.to_string().contains("CLINIC"));
    }
}
