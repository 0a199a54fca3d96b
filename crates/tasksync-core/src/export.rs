//! JSON snapshots of a user's tasks, and restoring them through merge.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Task, TaskId};
use crate::store::TaskStore;
use crate::sync::merge;
use crate::util;

const SNAPSHOT_VERSION: u32 = 1;

/// Every task a user owns at one point in time, tombstones included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub user_id: String,
    pub tasks: Vec<Task>,
}

/// Counts reported by [`restore_snapshot`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreSummary {
    /// Snapshot versions written to the store
    pub restored: usize,
    /// Tasks where the stored version was kept
    pub unchanged: usize,
}

/// Capture the user's full task collection.
pub fn snapshot<S: TaskStore + ?Sized>(store: &S, user_id: &str) -> Result<TaskSnapshot> {
    if user_id.trim().is_empty() {
        return Err(Error::validation("user_id cannot be empty"));
    }

    Ok(TaskSnapshot {
        version: SNAPSHOT_VERSION,
        exported_at: util::now(),
        user_id: user_id.to_string(),
        tasks: store.list_by_owner(user_id)?,
    })
}

/// Render a snapshot as pretty-printed JSON.
pub fn render_json(snapshot: &TaskSnapshot) -> Result<String> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

/// Parse a snapshot previously produced by [`render_json`].
pub fn parse_json(payload: &str) -> Result<TaskSnapshot> {
    let snapshot: TaskSnapshot = serde_json::from_str(payload)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(Error::validation(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }
    Ok(snapshot)
}

/// Merge a snapshot back into the store.
///
/// The snapshot is the local side and the stored collection the server side,
/// so a stored version wins whenever it is at least as new. Only merged
/// versions that differ from what is stored are written, and they are
/// written as new edits: stamped now and, when given, with the restoring
/// device.
pub fn restore_snapshot<S: TaskStore + ?Sized>(
    store: &S,
    user_id: &str,
    device_id: Option<&str>,
    snapshot: &TaskSnapshot,
) -> Result<RestoreSummary> {
    if user_id.trim().is_empty() {
        return Err(Error::validation("user_id cannot be empty"));
    }
    if !snapshot.user_id.is_empty() && snapshot.user_id != user_id {
        return Err(Error::ownership("snapshot belongs to another user"));
    }

    let mut incoming = Vec::with_capacity(snapshot.tasks.len());
    for task in &snapshot.tasks {
        task.validate_for(user_id)?;
        if task.id.is_blank() || task.updated_at.is_none() {
            return Err(Error::validation(format!(
                "snapshot task {} is missing its id or modification time",
                task.id
            )));
        }
        if store
            .owner_of(&task.id)?
            .is_some_and(|owner| owner != user_id)
        {
            return Err(Error::ownership(format!(
                "task {} belongs to another user",
                task.id
            )));
        }
        incoming.push(task.clone().with_owner(user_id));
    }

    let current = store.list_by_owner(user_id)?;
    let stored: HashMap<&TaskId, &Task> = current.iter().map(|task| (&task.id, task)).collect();

    let mut summary = RestoreSummary::default();
    for task in merge(&incoming, &current) {
        if stored.get(&task.id).is_some_and(|existing| **existing == task) {
            summary.unchanged += 1;
            continue;
        }

        // The store may have moved on since it was listed
        let written = store.update_atomically(user_id, &task.id, &mut |latest: Option<&Task>| {
            if latest.is_some_and(|latest| latest.updated_at >= task.updated_at) {
                return Ok(None);
            }
            let mut restored = task.accepted_over(latest);
            if let Some(device_id) = device_id {
                restored.device_id = Some(device_id.to_string());
            }
            Ok(Some(restored))
        })?;

        if written.is_some() {
            summary.restored += 1;
        } else {
            summary.unchanged += 1;
        }
    }

    tracing::info!(
        user_id,
        restored = summary.restored,
        unchanged = summary.unchanged,
        "Restored task snapshot"
    );
    Ok(summary)
}
