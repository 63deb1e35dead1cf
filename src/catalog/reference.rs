//! Category references: how callers name the categories an article belongs to

use super::node::CategoryId;
use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};

/// Default separator between path segments, as in `English->Cars->Mazda`
pub const DEFAULT_SEPARATOR: &str = "->";

/// An ordered list of segment names from the top level down to the target
///
/// Always holds at least one non-blank segment, including when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct CategoryPath(Vec<String>);

impl CategoryPath {
    /// Build a path from already-split segments.
    ///
    /// Fails with [`SyncError::InvalidPath`] if the list is empty or any
    /// segment is blank.
    pub fn from_segments<I, S>(segments: I) -> SyncResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() || segments.iter().any(|s| s.trim().is_empty()) {
            return Err(SyncError::InvalidPath(segments.join(DEFAULT_SEPARATOR)));
        }
        Ok(Self(segments))
    }

    /// Split a raw path string on `separator`.
    pub fn parse(raw: &str, separator: &str) -> SyncResult<Self> {
        if separator.is_empty() {
            return Err(SyncError::InvalidPath(raw.to_string()));
        }
        Self::from_segments(raw.split(separator)).map_err(|_| SyncError::InvalidPath(raw.to_string()))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Render the path with a caller-chosen separator.
    pub fn join(&self, separator: &str) -> String {
        self.0.join(separator)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<String>> for CategoryPath {
    type Error = SyncError;

    fn try_from(segments: Vec<String>) -> SyncResult<Self> {
        Self::from_segments(segments)
    }
}

impl From<CategoryPath> for Vec<String> {
    fn from(path: CategoryPath) -> Self {
        path.0
    }
}

impl std::fmt::Display for CategoryPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(DEFAULT_SEPARATOR))
    }
}

/// A single desired category for an article
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryReference {
    /// Explicit identifier. Must exist; no leaf check is applied.
    Id(CategoryId),
    /// Path of segment names, created on demand. Must end on a leaf.
    Path(CategoryPath),
    /// Use `id` when it exists, otherwise fall back to resolving `path`.
    IdOrPath { id: CategoryId, path: CategoryPath },
}

impl CategoryReference {
    pub fn id(id: i64) -> Self {
        Self::Id(CategoryId::new(id))
    }

    /// Convenience for `CategoryReference::Path` from a `->` delimited string.
    pub fn path(raw: &str) -> SyncResult<Self> {
        CategoryPath::parse(raw, DEFAULT_SEPARATOR).map(Self::Path)
    }
}

impl From<CategoryId> for CategoryReference {
    fn from(id: CategoryId) -> Self {
        Self::Id(id)
    }
}

impl From<CategoryPath> for CategoryReference {
    fn from(path: CategoryPath) -> Self {
        Self::Path(path)
    }
}

/// A category entry as it arrives from an import row
///
/// Either field may be missing or empty. A zero id counts as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCategoryRef {
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub category_path: Option<String>,
}

impl RawCategoryRef {
    /// Decode into a typed reference. Entries with neither an id nor a path
    /// yield `Ok(None)` and are skipped by the caller.
    pub fn into_reference(self, separator: &str) -> SyncResult<Option<CategoryReference>> {
        let id = self.category_id.filter(|id| *id != 0).map(CategoryId::new);
        let path = match self.category_path.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(CategoryPath::parse(raw, separator)?),
            _ => None,
        };

        Ok(match (id, path) {
            (Some(id), Some(path)) => Some(CategoryReference::IdOrPath { id, path }),
            (Some(id), None) => Some(CategoryReference::Id(id)),
            (None, Some(path)) => Some(CategoryReference::Path(path)),
            (None, None) => None,
        })
    }
}

/// Decode a batch of raw entries, dropping empty ones.
pub fn decode_references(
    raw: impl IntoIterator<Item = RawCategoryRef>,
    separator: &str,
) -> SyncResult<Vec<CategoryReference>> {
    let mut references = Vec::new();
    for entry in raw {
        if let Some(reference) = entry.into_reference(separator)? {
            references.push(reference);
        }
    }
    Ok(references)
}
