//! Assignment reconciliation

mod diff;
mod synchronizer;

pub use diff::AssignmentDiff;
pub use synchronizer::{AssignmentSynchronizer, ReconcileOutcome};
