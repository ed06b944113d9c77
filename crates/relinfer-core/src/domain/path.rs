//! Justification paths

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use super::{Edge, RelationType, Term};
use crate::error::{Error, Result};

/// A non-empty, connected, acyclic chain of edges
///
/// Every edge's target is the next edge's source and no term appears
/// twice. Construction through [`Path::from_edges`] enforces both.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Path {
    edges: Vec<Edge>,
}

impl Path {
    /// Build a path, checking connectivity and the no-repeat rule
    pub fn from_edges(edges: Vec<Edge>) -> Result<Self> {
        if edges.is_empty() {
            return Err(Error::InvalidInput("a path needs at least one edge".to_string()));
        }

        for pair in edges.windows(2) {
            if pair[0].target != pair[1].source {
                return Err(Error::InvalidInput(format!(
                    "edges are not connected: '{}' then '{}'",
                    pair[0].target, pair[1].source
                )));
            }
        }

        let path = Self { edges };
        if path.has_repeated_term() {
            return Err(Error::InvalidInput(format!("path repeats a term: {}", path)));
        }

        Ok(path)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of hops
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn is_direct(&self) -> bool {
        self.edges.len() == 1
    }

    pub fn source(&self) -> &Term {
        &self.edges[0].source
    }

    pub fn target(&self) -> &Term {
        &self.edges[self.edges.len() - 1].target
    }

    /// Relation of the final hop
    pub fn final_relation(&self) -> &RelationType {
        &self.edges[self.edges.len() - 1].relation
    }

    /// Source followed by every hop's target
    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        std::iter::once(self.source()).chain(self.edges.iter().map(|e| &e.target))
    }

    /// Intermediate terms only (excludes both endpoints)
    pub fn via(&self) -> impl Iterator<Item = &Term> {
        self.edges[..self.edges.len() - 1].iter().map(|e| &e.target)
    }

    pub fn weights(&self) -> impl Iterator<Item = f64> + '_ {
        self.edges.iter().map(|e| e.weight)
    }

    /// Weakest edge weight along the path
    pub fn bottleneck(&self) -> f64 {
        self.weights().fold(f64::INFINITY, f64::min)
    }

    pub fn has_repeated_term(&self) -> bool {
        let mut seen = HashSet::new();
        self.terms().any(|term| !seen.insert(term))
    }

    /// Term names joined by a separator that cannot occur inside a term,
    /// used as the final deterministic tie-break
    pub fn ordering_key(&self) -> String {
        self.terms().map(Term::as_str).collect::<Vec<_>>().join("\u{1f}")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source())?;
        for edge in &self.edges {
            write!(f, " -{}-> {}", edge.relation, edge.target)?;
        }
        Ok(())
    }
}
