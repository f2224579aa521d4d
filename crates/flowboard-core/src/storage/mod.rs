//! Storage layer
//!
//! JSON board snapshots for hosts that keep the board on disk.

pub mod snapshot;

pub use snapshot::{BoardSnapshot, SNAPSHOT_VERSION};
