// SPDX-License-Identifier: MIT

//! Event-sourced durable state store (spec §4.B): a closed set of
//! `StoreOp`s fold into `MaterializedState`; `FileStateStore` persists that
//! fold as a WAL plus periodic snapshots, `MemoryStore` keeps it in memory
//! only.

mod buffer;
mod migration;
mod ops;
mod replay;
mod snapshot;
mod state;
mod store;
mod wal;

pub use buffer::{EventBuffer, DEFAULT_CAPACITY};
pub use migration::{Migration, MigrationError, MigrationRegistry};
pub use ops::StoreOp;
pub use replay::apply_event_to_instance;
pub use snapshot::{checksum_of, SnapshotError, StateSnapshotFile};
pub use state::{MaterializedState, CURRENT_STATE_VERSION};
pub use store::{FileStateStore, MemoryStore, StateStore};
pub use wal::{Wal, WalEntry, WalError};
