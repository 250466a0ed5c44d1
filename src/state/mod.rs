//! Local state management (§4.3): durable records of servers and snapshots.

pub mod records;
pub mod store;

pub use records::{ServerRecord, ServerStatus, SnapshotRecord};
pub use store::{ServerState, SnapshotState};
