//! Relation-type registry
//!
//! Maps relation names (and their alternate display names) to the numeric
//! ids the remote service filters on.

use std::collections::HashMap;

use serde::Serialize;

use super::types::RelationTypeDto;
use crate::domain::RelationType;

/// A relation type known to the remote service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationTypeInfo {
    pub id: i64,
    pub name: RelationType,
    pub alias: Option<String>,
    pub help: Option<String>,
}

/// Immutable lookup table loaded once per process
#[derive(Debug, Clone, Default)]
pub struct RelationTypeRegistry {
    by_id: HashMap<i64, RelationTypeInfo>,
    by_name: HashMap<String, i64>,
}

impl RelationTypeRegistry {
    pub fn new(types: impl IntoIterator<Item = RelationTypeInfo>) -> Self {
        let mut registry = Self::default();
        for info in types {
            registry.by_name.insert(info.name.as_str().to_string(), info.id);
            if let Some(alias) = &info.alias {
                registry.by_name.entry(alias.clone()).or_insert(info.id);
            }
            registry.by_id.insert(info.id, info);
        }
        registry
    }

    pub fn from_dtos(dtos: Vec<RelationTypeDto>) -> Self {
        Self::new(dtos.into_iter().map(|dto| RelationTypeInfo {
            id: dto.id,
            name: RelationType::new(dto.name),
            alias: dto.gpname.filter(|g| !g.is_empty()),
            help: dto.help.filter(|h| !h.is_empty()),
        }))
    }

    /// Look up by canonical name or alias
    pub fn lookup(&self, name: &str) -> Option<&RelationTypeInfo> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    pub fn id_of(&self, relation: &RelationType) -> Option<i64> {
        self.lookup(relation.as_str()).map(|info| info.id)
    }

    /// Name for a type id; unknown ids get a synthetic `type:<id>` name
    pub fn name_of(&self, id: i64) -> RelationType {
        self.by_id
            .get(&id)
            .map(|info| info.name.clone())
            .unwrap_or_else(|| RelationType::new(format!("type:{}", id)))
    }

    /// Canonical form of a user-supplied relation name
    ///
    /// Aliases resolve to the canonical name; unknown names pass through.
    pub fn canonical(&self, name: &str) -> RelationType {
        self.lookup(name)
            .map(|info| info.name.clone())
            .unwrap_or_else(|| RelationType::new(name))
    }

    /// All entries ordered by id
    pub fn entries(&self) -> Vec<&RelationTypeInfo> {
        let mut entries: Vec<_> = self.by_id.values().collect();
        entries.sort_by_key(|info| info.id);
        entries
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RelationTypeRegistry {
        RelationTypeRegistry::from_dtos(vec![
            RelationTypeDto {
                id: 6,
                name: "r_isa".to_string(),
                gpname: Some("is-a".to_string()),
                help: None,
            },
            RelationTypeDto {
                id: 9,
                name: "r_has_part".to_string(),
                gpname: Some("has-part".to_string()),
                help: Some("parts".to_string()),
            },
        ])
    }

    #[test]
    fn test_lookup_by_name_and_alias() {
        let registry = registry();
        assert_eq!(registry.lookup("r_isa").map(|i| i.id), Some(6));
        assert_eq!(registry.lookup("has-part").map(|i| i.id), Some(9));
        assert!(registry.lookup("r_unknown").is_none());
    }

    #[test]
    fn test_canonical_passes_unknown_through() {
        let registry = registry();
        assert_eq!(registry.canonical("has-part").as_str(), "r_has_part");
        assert_eq!(registry.canonical("r_whatever").as_str(), "r_whatever");
    }

    #[test]
    fn test_name_of_unknown_id() {
        let registry = registry();
        assert_eq!(registry.name_of(6).as_str(), "r_isa");
        assert_eq!(registry.name_of(4242).as_str(), "type:4242");
    }

    #[test]
    fn test_entries_sorted_by_id() {
        let registry = registry();
        let ids: Vec<i64> = registry.entries().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![6, 9]);
        assert_eq!(registry.len(), 2);
    }
}
