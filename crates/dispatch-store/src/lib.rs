//! Job-state store implementations.

mod fs;
mod key;
mod memory;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use dispatch_types::{StateStore, StateStoreError};
pub use fs::FsStateStore;
pub use memory::InMemoryStateStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStateStore;
