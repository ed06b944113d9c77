//! Search-tree storage for breadth-first exploration
//!
//! Terms are interned once; every partial path is a node pointing at its
//! parent, so extending a path costs one push and cycle checks walk the
//! parent chain instead of the call stack.

use std::collections::HashMap;

use crate::domain::{Edge, Term};

pub(crate) type TermId = usize;
pub(crate) type NodeId = usize;

#[derive(Debug, Default)]
pub(crate) struct TermArena {
    terms: Vec<Term>,
    ids: HashMap<Term, TermId>,
}

impl TermArena {
    pub fn intern(&mut self, term: &Term) -> TermId {
        if let Some(&id) = self.ids.get(term) {
            return id;
        }
        let id = self.terms.len();
        self.terms.push(term.clone());
        self.ids.insert(term.clone(), id);
        id
    }

    pub fn get(&self, id: TermId) -> &Term {
        &self.terms[id]
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }
}

#[derive(Debug)]
struct PathNode {
    term: TermId,
    parent: Option<NodeId>,
    /// Edge from the parent's term to this node's term
    edge: Option<Edge>,
    depth: usize,
}

/// Tree of partial paths rooted at the query source
#[derive(Debug)]
pub(crate) struct PathTree {
    terms: TermArena,
    nodes: Vec<PathNode>,
}

impl PathTree {
    /// Tree holding only the root node (id 0)
    pub fn new(source: &Term) -> Self {
        let mut terms = TermArena::default();
        let term = terms.intern(source);
        Self {
            terms,
            nodes: vec![PathNode {
                term,
                parent: None,
                edge: None,
                depth: 0,
            }],
        }
    }

    pub const ROOT: NodeId = 0;

    pub fn intern(&mut self, term: &Term) -> TermId {
        self.terms.intern(term)
    }

    pub fn term(&self, id: TermId) -> &Term {
        self.terms.get(id)
    }

    pub fn term_of(&self, node: NodeId) -> TermId {
        self.nodes[node].term
    }

    pub fn depth(&self, node: NodeId) -> usize {
        self.nodes[node].depth
    }

    /// Whether `term` already appears on the path ending at `node`
    pub fn on_path(&self, node: NodeId, term: TermId) -> bool {
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            if self.nodes[id].term == term {
                return true;
            }
            cursor = self.nodes[id].parent;
        }
        false
    }

    /// Add a child of `parent` reached through `edge`
    pub fn extend(&mut self, parent: NodeId, edge: Edge) -> NodeId {
        let term = self.terms.intern(&edge.target);
        let id = self.nodes.len();
        self.nodes.push(PathNode {
            term,
            parent: Some(parent),
            edge: Some(edge),
            depth: self.nodes[parent].depth + 1,
        });
        id
    }

    /// Edges from the root down to `node`, in order
    pub fn edges_to(&self, node: NodeId) -> Vec<Edge> {
        let mut edges = Vec::with_capacity(self.nodes[node].depth);
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            if let Some(edge) = &self.nodes[id].edge {
                edges.push(edge.clone());
            }
            cursor = self.nodes[id].parent;
        }
        edges.reverse();
        edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_stable() {
        let mut arena = TermArena::default();
        let a = arena.intern(&Term::new("pizza"));
        let b = arena.intern(&Term::new("topping"));
        assert_ne!(a, b);
        assert_eq!(arena.intern(&Term::new("pizza")), a);
        assert_eq!(arena.get(b).as_str(), "topping");
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_extend_and_edges_to() {
        let mut tree = PathTree::new(&Term::new("pizza"));
        let topping = tree.extend(PathTree::ROOT, Edge::new("pizza", "r_has_part", "topping", 0.8));
        let mozza = tree.extend(topping, Edge::new("topping", "r_has_part", "mozzarella", 0.6));

        assert_eq!(tree.depth(mozza), 2);
        let edges = tree.edges_to(mozza);
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].source.as_str(), "pizza");
        assert_eq!(edges[1].target.as_str(), "mozzarella");
        assert!(tree.edges_to(PathTree::ROOT).is_empty());
        assert_eq!(tree.node_count(), 3);
    }

    #[test]
    fn test_on_path_follows_parents_only() {
        let mut tree = PathTree::new(&Term::new("a"));
        let b = tree.extend(PathTree::ROOT, Edge::new("a", "r_isa", "b", 0.5));
        let c = tree.extend(PathTree::ROOT, Edge::new("a", "r_isa", "c", 0.5));

        let a_id = tree.intern(&Term::new("a"));
        let b_id = tree.term_of(b);
        assert!(tree.on_path(b, a_id));
        assert!(tree.on_path(b, b_id));
        // Sibling branch does not count
        assert!(!tree.on_path(c, b_id));
        assert_eq!(tree.term_count(), 3);
    }
}
