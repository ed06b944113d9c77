//! Ranked inference results

use std::fmt;

use serde::Serialize;

use super::{Path, RelationType};

/// How a path justifies the queried relation
///
/// Derived from the shape of the path; renderers use it to phrase the
/// explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceKind {
    /// A single edge carrying the queried relation
    Direct,
    /// Source is a kind of something that holds the relation (`r_isa` first)
    Generalization,
    /// A more specific term of the source holds the relation (`r_hypo` first)
    Specialization,
    /// A synonym of the source holds the relation (`r_syn` first)
    Synonymy,
    /// Every hop carries the queried relation
    Transitivity,
    /// Any other chain
    Chain,
}

impl InferenceKind {
    /// Classify a path found for a query on `relation`
    pub fn classify(path: &Path, relation: &RelationType) -> Self {
        if path.is_direct() {
            return Self::Direct;
        }

        let first = path.edges()[0].relation.as_str();
        match first {
            RelationType::IS_A => Self::Generalization,
            RelationType::HYPO => Self::Specialization,
            RelationType::SYN => Self::Synonymy,
            _ if path.edges().iter().all(|e| &e.relation == relation) => Self::Transitivity,
            _ => Self::Chain,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Generalization => "isa",
            Self::Specialization => "hypo",
            Self::Synonymy => "syn",
            Self::Transitivity => "transitivity",
            Self::Chain => "chain",
        }
    }
}

impl fmt::Display for InferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ranked path
///
/// Produced by the ranker and never mutated afterwards. `rank` is the
/// 1-based position in the ranker's total order; `ordering_key` is the
/// deterministic final tie-break.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceResult {
    pub rank: usize,
    pub certainty: f64,
    pub kind: InferenceKind,
    pub path: Path,
    pub ordering_key: String,
}

impl InferenceResult {
    pub fn hops(&self) -> usize {
        self.path.len()
    }
}
