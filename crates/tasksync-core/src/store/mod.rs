//! Collaborator contracts the sync engine calls through.
//!
//! The engine never owns the canonical task or device collections. It only
//! sees short-lived copies handed back by these traits, and relies on the
//! implementation for concurrency control.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{ConflictRecord, Device, Task, TaskId};

/// Read-modify-write callback passed to [`TaskStore::update_atomically`].
///
/// Receives the currently stored version (if any) and returns the version to
/// persist, or `None` to leave the store untouched.
pub type AtomicUpdate<'a> = dyn FnMut(Option<&Task>) -> Result<Option<Task>> + 'a;

/// Trait for task storage operations
pub trait TaskStore: Send + Sync {
    /// Insert or replace a task record
    fn save(&self, task: &Task) -> Result<()>;

    /// Get one of the owner's tasks by ID, tombstones included
    fn get(&self, user_id: &str, id: &TaskId) -> Result<Option<Task>>;

    /// Owner of the task with this ID, whoever it is
    fn owner_of(&self, id: &TaskId) -> Result<Option<String>>;

    /// List all of the owner's tasks, tombstones included, newest first
    fn list_by_owner(&self, user_id: &str) -> Result<Vec<Task>>;

    /// List the owner's tasks modified strictly after `after`, oldest first
    fn list_updated_after(&self, user_id: &str, after: DateTime<Utc>) -> Result<Vec<Task>>;

    /// Tombstone a live task owned by `user_id`
    ///
    /// Fails with `NotFound` when the owner has no live task with that ID.
    fn delete(&self, id: &TaskId, user_id: &str, device_id: Option<&str>) -> Result<Task>;

    /// Run a read-modify-write of a single task in isolation.
    ///
    /// No other write to the same task ID may interleave between the read
    /// handed to `apply` and the write of its result. Returns what was
    /// persisted.
    fn update_atomically(
        &self,
        user_id: &str,
        id: &TaskId,
        apply: &mut AtomicUpdate<'_>,
    ) -> Result<Option<Task>>;

    /// Record an automatically resolved conflict
    fn record_resolution(&self, _record: &ConflictRecord) -> Result<()> {
        Ok(())
    }

    /// List recorded resolutions for the owner, newest first
    fn list_resolutions(&self, _user_id: &str, _limit: usize) -> Result<Vec<ConflictRecord>> {
        Ok(Vec::new())
    }
}

/// Trait for device registry operations
pub trait DeviceRegistry: Send + Sync {
    /// Look up a device by its device identity
    fn resolve(&self, device_id: &str) -> Result<Option<Device>>;

    /// Mark the device as seen now and persist it
    fn touch(&self, device: &mut Device) -> Result<()>;

    /// Register a device for `user_id`, returning the existing record if the
    /// device is already registered to that user
    fn register(&self, user_id: &str, name: &str, device_id: &str) -> Result<Device>;

    /// List the user's devices, most recently seen first
    fn list_recent(&self, user_id: &str, limit: usize) -> Result<Vec<Device>>;

    /// Rename one of the user's devices
    fn rename(&self, user_id: &str, device_id: &str, name: &str) -> Result<()>;

    /// Remove one of the user's devices
    fn remove(&self, user_id: &str, device_id: &str) -> Result<()>;
}
