//! Weighted, typed, directed relation instances

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{RelationType, Term};

/// One directed relation between two terms
///
/// `weight` is the remote service's confidence in this single relation,
/// normalized into `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: Term,
    pub relation: RelationType,
    pub target: Term,
    pub weight: f64,
}

impl Edge {
    /// Create an edge, clamping the weight to `[0.0, 1.0]`
    pub fn new(
        source: impl Into<Term>,
        relation: impl Into<RelationType>,
        target: impl Into<Term>,
        weight: f64,
    ) -> Self {
        Self {
            source: source.into(),
            relation: relation.into(),
            target: target.into(),
            weight: clamp_weight(weight),
        }
    }

    /// Whether this edge connects `source` to `target` with `relation`
    pub fn matches(&self, source: &Term, relation: &RelationType, target: &Term) -> bool {
        &self.source == source && &self.relation == relation && &self.target == target
    }

    /// Whether the edge starts and ends on the same term
    pub fn is_loop(&self) -> bool {
        self.source == self.target
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -{}-> {} ({:.2})",
            self.source, self.relation, self.target, self.weight
        )
    }
}

fn clamp_weight(weight: f64) -> f64 {
    if weight.is_nan() {
        0.0
    } else {
        weight.clamp(0.0, 1.0)
    }
}
