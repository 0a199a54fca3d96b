//! Task model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::util;

/// Opaque, globally unique task identifier.
///
/// Clients may assign their own ids; ids assigned by the server are UUID v7
/// (time-sortable).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a new server-assigned identifier using UUID v7
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation of this ID
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is blank (not yet assigned)
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A task in a user's list, plus the timestamps reconciliation relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, the merge and conflict key
    #[serde(default)]
    pub id: TaskId,
    /// Owning user
    #[serde(default)]
    pub user_id: String,
    /// Device that created or last edited the task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Display name (must not be empty)
    #[serde(default)]
    pub name: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Completion flag
    #[serde(default)]
    pub completed: bool,
    /// Creation timestamp, stamped by the server when absent
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification timestamp, stamped by the server on accepted writes
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Optional deadline label
    #[serde(default)]
    pub deadline: Option<String>,
    /// Optional category label
    #[serde(default)]
    pub category: Option<String>,
    /// Optional priority label
    #[serde(default)]
    pub priority: Option<String>,
    /// Tombstone flag for propagating deletes
    #[serde(default)]
    pub deleted: bool,
}

impl Task {
    /// Create an untimestamped task with the given id and name
    pub fn new(id: impl Into<TaskId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: String::new(),
            device_id: None,
            name: name.into(),
            description: String::new(),
            completed: false,
            created_at: None,
            updated_at: None,
            deadline: None,
            category: None,
            priority: None,
            deleted: false,
        }
    }

    /// Set the owning user
    #[must_use]
    pub fn with_owner(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Set the originating device
    #[must_use]
    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Set the modification timestamp
    #[must_use]
    pub const fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Check the task against the rules every write path shares.
    ///
    /// The name must not be blank, and a non-empty claimed owner must match
    /// `user_id`. An empty claimed owner is accepted and stamped later.
    pub fn validate_for(&self, user_id: &str) -> Result<()> {
        if !self.user_id.is_empty() && self.user_id != user_id {
            return Err(Error::ownership(format!(
                "task {} does not belong to the current user",
                self.id
            )));
        }
        if self.name.trim().is_empty() {
            return Err(Error::validation(format!(
                "task {} name cannot be empty",
                self.id
            )));
        }
        Ok(())
    }

    /// Overwrite the identity fields with the authenticated caller's.
    pub(crate) fn stamp_identity(&mut self, user_id: &str, device_id: &str) {
        user_id.clone_into(&mut self.user_id);
        self.device_id = Some(device_id.to_string());
        if self.id.is_blank() {
            self.id = TaskId::generate();
        }
    }

    /// Stamp an accepted write at `now`, filling the creation time if absent.
    pub(crate) fn stamp_write(&mut self, now: DateTime<Utc>) {
        if self.created_at.is_none() {
            self.created_at = Some(now);
        }
        self.updated_at = Some(now);
    }

    /// This version as an accepted write over `stored`.
    ///
    /// The new modification time is now, but never earlier than the stored
    /// one, and an existing creation time is kept.
    pub(crate) fn accepted_over(&self, stored: Option<&Self>) -> Self {
        let mut task = self.clone();
        let now = stored
            .and_then(|previous| previous.updated_at)
            .map_or_else(util::now, |previous| util::now().max(previous));

        if task.created_at.is_none() {
            task.created_at = stored.and_then(|previous| previous.created_at);
        }
        task.stamp_write(now);
        task
    }
}
