//! Storage backends for catsync
//!
//! Category resolution and assignment reconciliation talk to storage only
//! through the `CategoryStore` trait. `SqliteStore` is the persistent
//! backend; `MemoryStore` serves embedding and tests.

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CategoryStore, OpenStore, StorageError, StorageResult};
