//! Set difference between stored and desired assignments

use crate::catalog::CategoryId;
use std::collections::BTreeSet;

/// What has to change to turn `current` into `desired`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentDiff {
    pub to_add: BTreeSet<CategoryId>,
    pub to_remove: BTreeSet<CategoryId>,
}

impl AssignmentDiff {
    pub fn compute(current: &BTreeSet<CategoryId>, desired: &BTreeSet<CategoryId>) -> Self {
        Self {
            to_add: desired.difference(current).copied().collect(),
            to_remove: current.difference(desired).copied().collect(),
        }
    }

    /// True if stored state already matches
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}
