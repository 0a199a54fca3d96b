//! Sync rounds and the out-of-band write operations that share their rules.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};

use super::{has_conflict, SyncStrategy};
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::models::{
    Conflict, ConflictRecord, ConflictWinner, SyncRequest, SyncResponse, Task, TaskId,
};
use crate::store::{DeviceRegistry, TaskStore};
use crate::util;

/// What reconciling one submitted task did
enum Reconciled {
    Written,
    Resolved(ConflictRecord),
    Unresolved(Conflict),
}

/// Drives sync rounds against an injected store and device registry.
///
/// Holds no mutable state of its own, so one instance can serve concurrent
/// rounds. Isolation between rounds touching the same task comes from
/// [`TaskStore::update_atomically`].
pub struct SyncService<S, R> {
    store: S,
    registry: R,
    config: SyncConfig,
}

impl<S, R> SyncService<S, R>
where
    S: TaskStore,
    R: DeviceRegistry,
{
    pub const fn new(store: S, registry: R, config: SyncConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// The strategy this engine resolves conflicts with
    pub const fn strategy(&self) -> SyncStrategy {
        self.config.strategy
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn registry(&self) -> &R {
        &self.registry
    }

    /// Run one sync round for a device.
    ///
    /// Pushes the submitted tasks, then returns every task of the user
    /// changed after the request's checkpoint (including the ones just
    /// written). A failure part way through leaves earlier tasks persisted;
    /// retrying the same request is safe.
    pub fn sync(&self, request: SyncRequest) -> Result<SyncResponse> {
        let checkpoint = request.checkpoint();
        let SyncRequest {
            user_id,
            device_id,
            todos,
            ..
        } = request;

        validate_identity(&user_id, &device_id)?;
        self.validate_tasks(&user_id, &todos)?;
        self.touch_device(&user_id, &device_id)?;

        tracing::debug!(
            user_id = %user_id,
            device_id = %device_id,
            pushed = todos.len(),
            %checkpoint,
            "Starting sync round"
        );

        let server_todo_map: HashMap<TaskId, Task> = self
            .store
            .list_updated_after(&user_id, checkpoint)?
            .into_iter()
            .map(|task| (task.id.clone(), task))
            .collect();

        let pushed = todos.len();
        let mut resolved = 0usize;
        let mut conflicts = Vec::new();
        for local in todos {
            match self.reconcile(&user_id, &device_id, checkpoint, local, &server_todo_map)? {
                Reconciled::Written => {}
                Reconciled::Resolved(record) => {
                    resolved += 1;
                    self.log_resolution(&record)?;
                }
                Reconciled::Unresolved(conflict) => conflicts.push(conflict),
            }
        }

        // Anything stamped from here on must land after the returned mark
        let pulled_at = util::now();
        let todos = self.store.list_updated_after(&user_id, checkpoint)?;

        tracing::info!(
            user_id = %user_id,
            device_id = %device_id,
            pushed,
            pulled = todos.len(),
            resolved,
            conflicts = conflicts.len(),
            strategy = %self.config.strategy,
            "Sync round complete"
        );

        Ok(SyncResponse {
            last_sync_at: next_checkpoint(pulled_at),
            todos,
            conflicts,
        })
    }

    /// Persist tasks without conflict detection.
    ///
    /// Each task is stamped with the caller's identity and the current time.
    pub fn batch_update(
        &self,
        user_id: &str,
        device_id: &str,
        tasks: Vec<Task>,
    ) -> Result<Vec<Task>> {
        self.write_all("batch_update", user_id, device_id, tasks)
    }

    /// Persist the caller's chosen versions for previously reported conflicts.
    ///
    /// The chosen versions become the newest writes, so other devices pick
    /// them up on their next round.
    pub fn resolve_conflicts(
        &self,
        user_id: &str,
        device_id: &str,
        tasks: Vec<Task>,
    ) -> Result<Vec<Task>> {
        self.write_all("resolve_conflicts", user_id, device_id, tasks)
    }

    /// The user's live tasks, newest first
    pub fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>> {
        validate_user(user_id)?;
        let mut tasks = self.store.list_by_owner(user_id)?;
        tasks.retain(|task| !task.deleted);
        Ok(tasks)
    }

    /// Tombstone one of the user's tasks.
    ///
    /// The tombstone reaches other devices through their next pull.
    pub fn delete_task(&self, user_id: &str, device_id: &str, id: &TaskId) -> Result<Task> {
        validate_identity(user_id, device_id)?;
        self.touch_device(user_id, device_id)?;

        let tombstone = self.store.delete(id, user_id, Some(device_id))?;
        tracing::info!(user_id, device_id, task_id = %id, "Deleted task");
        Ok(tombstone)
    }

    /// Recently recorded automatic resolutions for the user
    pub fn list_resolutions(&self, user_id: &str, limit: usize) -> Result<Vec<ConflictRecord>> {
        validate_user(user_id)?;
        self.store.list_resolutions(user_id, limit)
    }

    fn touch_device(&self, user_id: &str, device_id: &str) -> Result<()> {
        let mut device = self
            .registry
            .resolve(device_id)?
            .ok_or_else(|| Error::device(format!("device {device_id} is not registered")))?;

        if device.user_id != user_id {
            return Err(Error::device(format!(
                "device {device_id} is not registered to this user"
            )));
        }

        self.registry.touch(&mut device)
    }

    fn reconcile(
        &self,
        user_id: &str,
        device_id: &str,
        checkpoint: DateTime<Utc>,
        mut local: Task,
        server_todo_map: &HashMap<TaskId, Task>,
    ) -> Result<Reconciled> {
        local.stamp_identity(user_id, device_id);
        let strategy = self.config.strategy;
        let id = local.id.clone();
        let mut outcome = Reconciled::Written;

        self.store
            .update_atomically(user_id, &id, &mut |stored: Option<&Task>| {
                // A version stored after the delta was read takes precedence
                let server = stored
                    .filter(|task| task.updated_at.is_some_and(|at| at > checkpoint))
                    .or_else(|| server_todo_map.get(&local.id));

                let Some(server) = server else {
                    outcome = Reconciled::Written;
                    return Ok(Some(local.accepted_over(stored)));
                };

                if !has_conflict(&local, server) {
                    tracing::debug!(task_id = %local.id, "No conflict, accepting local version");
                    outcome = Reconciled::Written;
                    return Ok(Some(local.accepted_over(stored)));
                }

                if !strategy.auto_resolves() {
                    tracing::info!(task_id = %local.id, "Conflict left for manual resolution");
                    outcome = Reconciled::Unresolved(Conflict {
                        local: local.clone(),
                        server: server.clone(),
                    });
                    return Ok(None);
                }

                let winner = strategy.winner(&local, server);
                tracing::info!(
                    task_id = %local.id,
                    winner = winner.as_str(),
                    %strategy,
                    "Resolved conflict"
                );
                outcome = Reconciled::Resolved(ConflictRecord {
                    id: 0,
                    task_id: local.id.clone(),
                    user_id: user_id.to_string(),
                    device_id: device_id.to_string(),
                    local_updated_at: local.updated_at,
                    server_updated_at: server.updated_at,
                    resolved_at: util::now(),
                    strategy,
                    winner,
                });

                Ok(Some(match winner {
                    ConflictWinner::Local => keep_local(&local, server),
                    ConflictWinner::Server => server.clone(),
                }))
            })?;

        Ok(outcome)
    }

    fn write_all(
        &self,
        operation: &'static str,
        user_id: &str,
        device_id: &str,
        tasks: Vec<Task>,
    ) -> Result<Vec<Task>> {
        validate_identity(user_id, device_id)?;
        self.validate_tasks(user_id, &tasks)?;
        self.touch_device(user_id, device_id)?;

        let mut written = Vec::with_capacity(tasks.len());
        for mut task in tasks {
            task.stamp_identity(user_id, device_id);
            let id = task.id.clone();
            let saved = self
                .store
                .update_atomically(user_id, &id, &mut |stored: Option<&Task>| {
                    Ok(Some(task.accepted_over(stored)))
                })?;
            written.extend(saved);
        }

        tracing::info!(operation, user_id, device_id, count = written.len(), "Applied task writes");
        Ok(written)
    }

    /// Check every submitted task before anything is written.
    ///
    /// A task with no claimed owner still fails here when its ID is already
    /// held by another user.
    fn validate_tasks(&self, user_id: &str, tasks: &[Task]) -> Result<()> {
        tasks.iter().try_for_each(|task| task.validate_for(user_id))?;

        for task in tasks.iter().filter(|task| !task.id.is_blank()) {
            let owner = self.store.owner_of(&task.id)?;
            if owner.is_some_and(|owner| owner != user_id) {
                return Err(Error::ownership(format!(
                    "task {} belongs to another user",
                    task.id
                )));
            }
        }
        Ok(())
    }

    fn log_resolution(&self, record: &ConflictRecord) -> Result<()> {
        if self.config.record_resolutions {
            self.store.record_resolution(record)?;
        }
        Ok(())
    }
}

fn validate_user(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(Error::validation("user_id cannot be empty"));
    }
    Ok(())
}

fn validate_identity(user_id: &str, device_id: &str) -> Result<()> {
    validate_user(user_id)?;
    if device_id.trim().is_empty() {
        return Err(Error::validation("device_id cannot be empty"));
    }
    Ok(())
}

/// The checkpoint handed back for a pull started at `pulled_at`.
///
/// Stamps share millisecond precision with the checkpoint and the delta query
/// is strictly greater-than, so the mark trails the pull by one millisecond.
/// A write from that millisecond may be pulled twice; re-applying it is a
/// no-op on the device.
fn next_checkpoint(pulled_at: DateTime<Utc>) -> DateTime<Utc> {
    pulled_at - TimeDelta::milliseconds(1)
}

/// The local version as the winner of a conflict, keeping its own timestamp
fn keep_local(local: &Task, server: &Task) -> Task {
    let mut task = local.clone();
    if task.created_at.is_none() {
        task.created_at = server.created_at;
    }
    if task.updated_at.is_none() {
        task.stamp_write(util::now());
    }
    task
}
