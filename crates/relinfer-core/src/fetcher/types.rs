//! Request/response types for the remote graph API

use serde::{Deserialize, Serialize};

/// Query parameters accepted by the relation endpoints
///
/// `None` and `false` fields are left out of the query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchParams {
    pub types_ids: Option<Vec<i64>>,
    pub not_types_ids: Option<Vec<i64>>,
    pub min_weight: Option<i64>,
    pub max_weight: Option<i64>,
    pub limit: Option<u32>,
    pub without_nodes: bool,
}

impl FetchParams {
    pub fn with_types(mut self, ids: Vec<i64>) -> Self {
        self.types_ids = (!ids.is_empty()).then_some(ids);
        self
    }

    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();

        if let Some(ids) = &self.types_ids {
            pairs.push(("types_ids", join_ids(ids)));
        }
        if let Some(ids) = &self.not_types_ids {
            pairs.push(("not_types_ids", join_ids(ids)));
        }
        if let Some(w) = self.min_weight {
            pairs.push(("min_weight", w.to_string()));
        }
        if let Some(w) = self.max_weight {
            pairs.push(("max_weight", w.to_string()));
        }
        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            pairs.push(("limit", limit.to_string()));
        }
        if self.without_nodes {
            pairs.push(("without_nodes", "true".to_string()));
        }

        pairs
    }
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// A node as returned by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDto {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub node_type: Option<i64>,
    #[serde(default)]
    pub w: Option<f64>,
}

/// A relation as returned by the service; endpoints are node ids
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationDto {
    pub id: i64,
    pub node1: i64,
    pub node2: i64,
    #[serde(rename = "type")]
    pub type_id: i64,
    pub w: f64,
}

/// Body of `relations/from/{term}` and `relations/to/{term}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationsResponse {
    #[serde(default)]
    pub nodes: Vec<NodeDto>,
    #[serde(default)]
    pub relations: Vec<RelationDto>,
}

/// One entry of `relations_types`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationTypeDto {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub gpname: Option<String>,
    #[serde(default)]
    pub help: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs_skip_unset_fields() {
        let params = FetchParams {
            min_weight: Some(1),
            limit: Some(100),
            ..Default::default()
        };
        assert_eq!(
            params.to_query_pairs(),
            vec![("min_weight", "1".to_string()), ("limit", "100".to_string())]
        );
    }

    #[test]
    fn test_query_pairs_serialize_lists_and_flags() {
        let params = FetchParams {
            without_nodes: true,
            limit: Some(0),
            ..Default::default()
        }
        .with_types(vec![6, 9]);

        assert_eq!(
            params.to_query_pairs(),
            vec![
                ("types_ids", "6,9".to_string()),
                ("without_nodes", "true".to_string())
            ]
        );
    }

    #[test]
    fn test_with_empty_types_clears_filter() {
        let params = FetchParams::default().with_types(Vec::new());
        assert!(params.types_ids.is_none());
    }

    #[test]
    fn test_parse_relations_response() {
        let body = r#"{
            "nodes": [
                {"id": 1, "name": "pizza", "type": 1, "w": 500},
                {"id": 2, "name": "mozzarella", "type": 1, "w": 120}
            ],
            "relations": [
                {"id": 10, "node1": 1, "node2": 2, "type": 9, "w": 85}
            ]
        }"#;
        let parsed: RelationsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.nodes.len(), 2);
        assert_eq!(parsed.relations[0].type_id, 9);
        assert_eq!(parsed.relations[0].w, 85.0);
    }

    #[test]
    fn test_parse_relation_types() {
        let body = r#"[{"id": 6, "name": "r_isa", "gpname": "is-a", "help": "generic"}]"#;
        let parsed: Vec<RelationTypeDto> = serde_json::from_str(body).unwrap();
        assert_eq!(parsed[0].name, "r_isa");
        assert_eq!(parsed[0].gpname.as_deref(), Some("is-a"));
    }
}
