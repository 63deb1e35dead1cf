//! Category nodes and the identifiers used to address them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a category node
///
/// Serializes as a plain integer, matching the storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(i64);

impl CategoryId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CategoryId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of an article whose category assignments are reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(i64);

impl ArticleId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ArticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ArticleId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Materialized ancestor chain of a node, root-most first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AncestorPath(Vec<CategoryId>);

impl AncestorPath {
    pub fn new(ancestors: Vec<CategoryId>) -> Self {
        Self(ancestors)
    }

    /// The path of a direct child of the node that owns this path.
    pub fn child_of(&self, parent: CategoryId) -> Self {
        let mut ancestors = self.0.clone();
        ancestors.push(parent);
        Self(ancestors)
    }

    pub fn ancestors(&self) -> &[CategoryId] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pipe-delimited storage form, e.g. `|1|5|9|`. Empty paths encode as `None`.
    pub fn encode(&self) -> Option<String> {
        if self.0.is_empty() {
            return None;
        }
        let mut out = String::from("|");
        for id in &self.0 {
            out.push_str(&id.to_string());
            out.push('|');
        }
        Some(out)
    }

    /// Inverse of [`AncestorPath::encode`]. Returns `None` on a malformed segment.
    pub fn decode(encoded: Option<&str>) -> Option<Self> {
        let Some(encoded) = encoded else {
            return Some(Self::default());
        };
        encoded
            .split('|')
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<i64>().ok().map(CategoryId))
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }
}

/// A category node as stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: CategoryId,
    /// `None` only for the root
    pub parent: Option<CategoryId>,
    /// Segment name, never empty
    pub description: String,
    pub path: AncestorPath,
    pub active: bool,
    pub added: DateTime<Utc>,
    pub changed: DateTime<Utc>,
    /// Derived at load time from the presence of children
    pub leaf: bool,
}

/// Everything needed to insert a new child node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub parent: CategoryId,
    pub description: String,
    pub path: AncestorPath,
    pub added: DateTime<Utc>,
}

impl NewCategory {
    pub fn new(parent: CategoryId, description: impl Into<String>, path: AncestorPath) -> Self {
        Self {
            parent,
            description: description.into(),
            path,
            added: Utc::now(),
        }
    }
}
