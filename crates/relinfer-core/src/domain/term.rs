//! Terms, relation types and relation filters

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A node of the remote lexical graph
///
/// Normalization rules belong to the remote service; the key is kept
/// exactly as given apart from surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Term(String);

impl Term {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Term {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Term {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Tag naming the semantic kind of an edge (e.g. `r_isa`, `r_has_part`)
///
/// Validation is loose: names outside [`RelationType::KNOWN`] are carried
/// through untouched rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationType(String);

impl RelationType {
    pub const IS_A: &'static str = "r_isa";
    pub const HYPO: &'static str = "r_hypo";
    pub const SYN: &'static str = "r_syn";
    pub const HAS_PART: &'static str = "r_has_part";
    pub const ASSOCIATED: &'static str = "r_associated";

    /// Relation names the engine gives special meaning to
    pub const KNOWN: &'static [&'static str] = &[
        Self::IS_A,
        Self::HYPO,
        Self::SYN,
        Self::HAS_PART,
        Self::ASSOCIATED,
    ];

    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_known(&self) -> bool {
        Self::KNOWN.contains(&self.0.as_str())
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RelationType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RelationType {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Which side of the term the fetched edges hang off
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Edges whose source is the term
    #[default]
    Outgoing,
    /// Edges whose target is the term
    Incoming,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outgoing => "outgoing",
            Self::Incoming => "incoming",
        }
    }
}

/// Restricts which edges a fetch returns
///
/// Part of the cache key, so it must hash and compare structurally:
/// `types` is kept sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationFilter {
    /// Allowed relation types (None = any type)
    pub types: Option<BTreeSet<RelationType>>,
    pub direction: Direction,
}

impl RelationFilter {
    /// Outgoing edges of any type
    pub fn any() -> Self {
        Self::default()
    }

    /// Outgoing edges restricted to the given types
    ///
    /// An empty iterator yields the unrestricted filter.
    pub fn only<I, R>(types: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RelationType>,
    {
        let types: BTreeSet<RelationType> = types
            .into_iter()
            .map(Into::into)
            .filter(|t: &RelationType| !t.is_empty())
            .collect();

        Self {
            types: (!types.is_empty()).then_some(types),
            direction: Direction::Outgoing,
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn is_any(&self) -> bool {
        self.types.is_none()
    }

    pub fn allows(&self, relation: &RelationType) -> bool {
        self.types.as_ref().is_none_or(|types| types.contains(relation))
    }
}

impl fmt::Display for RelationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.types {
            None => write!(f, "{}:*", self.direction.as_str()),
            Some(types) => {
                let names: Vec<&str> = types.iter().map(RelationType::as_str).collect();
                write!(f, "{}:{}", self.direction.as_str(), names.join(","))
            }
        }
    }
}
