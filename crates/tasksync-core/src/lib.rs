//! tasksync-core - Core library for tasksync
//!
//! This crate contains the task models, the synchronization engine (conflict
//! detection, resolution strategies, sync rounds and multi-source merge), the
//! store and device registry contracts it calls through, and a `SQLite`
//! implementation of those contracts.

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod store;
pub mod sync;
pub mod util;

pub use config::SyncConfig;
pub use error::{Error, ErrorKind, Result};
pub use models::{
    Conflict, ConflictRecord, ConflictWinner, Device, SyncRequest, SyncResponse, Task, TaskId,
};
pub use store::{DeviceRegistry, TaskStore};
pub use sync::{has_conflict, merge, SyncService, SyncStrategy};
