//! SurrealDB repository implementations.

mod snapshot;

pub use snapshot::{SnapshotMeta, SurrealSnapshotStore};
