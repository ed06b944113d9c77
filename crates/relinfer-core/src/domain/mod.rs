//! Value types shared by every component
//!
//! Terms, relation types and edges are immutable snapshots of remote state.
//! Paths and inference results are built locally and never mutated after
//! construction.

mod edge;
mod path;
mod result;
mod term;

pub use edge::Edge;
pub use path::Path;
pub use result::{InferenceKind, InferenceResult};
pub use term::{Direction, RelationFilter, RelationType, Term};
