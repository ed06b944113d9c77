//! Relinfer Core Library
//!
//! This crate answers "why does term A hold relation R with term B?" over a
//! remote lexical-semantic graph. It provides:
//! - Relation fetching from the remote graph service (with retry/backoff)
//! - A singleflight fetch cache keyed by (term, relation filter)
//! - Bounded-depth path exploration between a source and a target
//! - Certainty ranking with a deterministic total order
//! - An inference session tying the pieces together for one query

pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod explore;
pub mod fetcher;
pub mod rank;
pub mod session;

pub use error::{Error, FetchError, FetchResult, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::FetchCache;
    pub use crate::config::Config;
    pub use crate::domain::{Edge, InferenceKind, InferenceResult, Path, RelationFilter, RelationType, Term};
    pub use crate::error::{Error, FetchError, Result};
    pub use crate::session::{InferOptions, InferenceSession};
}
