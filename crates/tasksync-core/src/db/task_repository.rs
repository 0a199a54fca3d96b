//! Task store implementation

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::Database;
use crate::error::{Error, Result};
use crate::models::{ConflictRecord, ConflictWinner, Task, TaskId};
use crate::store::{AtomicUpdate, TaskStore};
use crate::sync::SyncStrategy;
use crate::util::{from_millis, now, to_millis};

const TASK_COLUMNS: &str = "id, user_id, device_id, name, description, completed, \
     created_at, updated_at, deadline, category, priority, is_deleted";

/// `SQLite` implementation of `TaskStore`
#[derive(Clone)]
pub struct SqliteTaskStore {
    db: Arc<Database>,
}

impl SqliteTaskStore {
    /// Create a new store over the given database
    pub const fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Parse a task from a database row
    fn parse_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
        let id: String = row.get(0)?;
        Ok(Task {
            id: TaskId::new(id),
            user_id: row.get(1)?,
            device_id: row.get(2)?,
            name: row.get(3)?,
            description: row.get(4)?,
            completed: row.get::<_, i32>(5)? != 0,
            created_at: Some(from_millis(row.get(6)?)),
            updated_at: Some(from_millis(row.get(7)?)),
            deadline: row.get(8)?,
            category: row.get(9)?,
            priority: row.get(10)?,
            deleted: row.get::<_, i32>(11)? != 0,
        })
    }

    fn parse_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConflictRecord> {
        let task_id: String = row.get(1)?;
        let strategy: String = row.get(7)?;
        let winner: String = row.get(8)?;
        Ok(ConflictRecord {
            id: row.get(0)?,
            task_id: TaskId::new(task_id),
            user_id: row.get(2)?,
            device_id: row.get(3)?,
            local_updated_at: row.get::<_, Option<i64>>(4)?.map(from_millis),
            server_updated_at: row.get::<_, Option<i64>>(5)?.map(from_millis),
            resolved_at: from_millis(row.get(6)?),
            strategy: SyncStrategy::from(strategy),
            winner: ConflictWinner::parse(&winner).ok_or_else(|| {
                rusqlite::Error::InvalidColumnType(8, "winner".into(), rusqlite::types::Type::Text)
            })?,
        })
    }

    fn get_with(conn: &Connection, user_id: &str, id: &TaskId) -> Result<Option<Task>> {
        let task = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND user_id = ?2"),
                params![id.as_str(), user_id],
                Self::parse_task,
            )
            .optional()?;
        Ok(task)
    }

    /// Upsert a task, refusing to overwrite a row owned by another user
    fn save_with(conn: &Connection, task: &Task) -> Result<()> {
        if task.user_id.is_empty() {
            return Err(Error::validation(format!("task {} has no owner", task.id)));
        }
        if task.id.is_blank() {
            return Err(Error::validation("task id cannot be empty"));
        }
        let updated_at = task.updated_at.ok_or_else(|| {
            Error::validation(format!("task {} has no modification time", task.id))
        })?;
        let created_at = task.created_at.unwrap_or(updated_at);

        let rows = conn.execute(
            "INSERT INTO tasks (id, user_id, device_id, name, description, completed,
                                created_at, updated_at, deadline, category, priority, is_deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(id) DO UPDATE SET
                device_id = excluded.device_id,
                name = excluded.name,
                description = excluded.description,
                completed = excluded.completed,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                deadline = excluded.deadline,
                category = excluded.category,
                priority = excluded.priority,
                is_deleted = excluded.is_deleted
             WHERE tasks.user_id = excluded.user_id",
            params![
                task.id.as_str(),
                task.user_id,
                task.device_id,
                task.name,
                task.description,
                i32::from(task.completed),
                to_millis(created_at),
                to_millis(updated_at),
                task.deadline,
                task.category,
                task.priority,
                i32::from(task.deleted),
            ],
        )?;

        if rows == 0 {
            return Err(Error::ownership(format!(
                "task {} belongs to another user",
                task.id
            )));
        }
        Ok(())
    }
}

impl TaskStore for SqliteTaskStore {
    fn save(&self, task: &Task) -> Result<()> {
        Self::save_with(&self.db.connection(), task)
    }

    fn get(&self, user_id: &str, id: &TaskId) -> Result<Option<Task>> {
        Self::get_with(&self.db.connection(), user_id, id)
    }

    fn owner_of(&self, id: &TaskId) -> Result<Option<String>> {
        let owner = self
            .db
            .connection()
            .query_row(
                "SELECT user_id FROM tasks WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner)
    }

    fn list_by_owner(&self, user_id: &str) -> Result<Vec<Task>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE user_id = ?1
             ORDER BY updated_at DESC, id ASC"
        ))?;

        let tasks = stmt
            .query_map(params![user_id], Self::parse_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(tasks)
    }

    fn list_updated_after(&self, user_id: &str, after: DateTime<Utc>) -> Result<Vec<Task>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE user_id = ?1 AND updated_at > ?2
             ORDER BY updated_at ASC, id ASC"
        ))?;

        let tasks = stmt
            .query_map(params![user_id, to_millis(after)], Self::parse_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(tasks)
    }

    fn delete(&self, id: &TaskId, user_id: &str, device_id: Option<&str>) -> Result<Task> {
        let mut conn = self.db.connection();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let rows = tx.execute(
            "UPDATE tasks
             SET is_deleted = 1,
                 updated_at = MAX(updated_at, ?1),
                 device_id = COALESCE(?2, device_id)
             WHERE id = ?3 AND user_id = ?4 AND is_deleted = 0",
            params![to_millis(now()), device_id, id.as_str(), user_id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        let tombstone =
            Self::get_with(&tx, user_id, id)?.ok_or_else(|| Error::NotFound(id.to_string()))?;
        tx.commit()?;
        Ok(tombstone)
    }

    fn update_atomically(
        &self,
        user_id: &str,
        id: &TaskId,
        apply: &mut AtomicUpdate<'_>,
    ) -> Result<Option<Task>> {
        let mut conn = self.db.connection();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = Self::get_with(&tx, user_id, id)?;
        let next = apply(current.as_ref())?;
        if let Some(task) = &next {
            Self::save_with(&tx, task)?;
        }

        tx.commit()?;
        Ok(next)
    }

    fn record_resolution(&self, record: &ConflictRecord) -> Result<()> {
        self.db.connection().execute(
            "INSERT INTO sync_conflicts (task_id, user_id, device_id, local_updated_at,
                                         server_updated_at, resolved_at, strategy, winner)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.task_id.as_str(),
                record.user_id,
                record.device_id,
                record.local_updated_at.map(to_millis),
                record.server_updated_at.map(to_millis),
                to_millis(record.resolved_at),
                record.strategy.as_str(),
                record.winner.as_str(),
            ],
        )?;
        Ok(())
    }

    fn list_resolutions(&self, user_id: &str, limit: usize) -> Result<Vec<ConflictRecord>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(
            "SELECT id, task_id, user_id, device_id, local_updated_at, server_updated_at,
                    resolved_at, strategy, winner
             FROM sync_conflicts
             WHERE user_id = ?1
             ORDER BY resolved_at DESC, id DESC
             LIMIT ?2",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map(params![user_id, limit], Self::parse_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn setup() -> SqliteTaskStore {
        SqliteTaskStore::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    fn task(id: &str, owner: &str, ms: i64) -> Task {
        Task::new(id, format!("task {id}"))
            .with_owner(owner)
            .with_device("d1")
            .with_updated_at(from_millis(ms))
    }

    #[test]
    fn test_save_and_get() {
        let store = setup();
        let mut original = task("t1", "u1", 1_000);
        original.description = "two litres".into();
        original.priority = Some("high".into());
        store.save(&original).unwrap();

        let fetched = store.get("u1", &TaskId::new("t1")).unwrap().unwrap();
        assert_eq!(fetched.description, "two litres");
        assert_eq!(fetched.priority.as_deref(), Some("high"));
        assert_eq!(fetched.updated_at, original.updated_at);
        // created_at defaults to the modification time
        assert_eq!(fetched.created_at, original.updated_at);
    }

    #[test]
    fn test_get_is_owner_scoped() {
        let store = setup();
        store.save(&task("t1", "u1", 1_000)).unwrap();

        assert!(store.get("u2", &TaskId::new("t1")).unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_existing() {
        let store = setup();
        store.save(&task("t1", "u1", 1_000)).unwrap();

        let mut edited = task("t1", "u1", 2_000);
        edited.completed = true;
        store.save(&edited).unwrap();

        let fetched = store.get("u1", &TaskId::new("t1")).unwrap().unwrap();
        assert!(fetched.completed);
        assert_eq!(fetched.updated_at, Some(from_millis(2_000)));
    }

    #[test]
    fn test_save_refuses_foreign_row() {
        let store = setup();
        store.save(&task("t1", "u1", 1_000)).unwrap();

        let result = store.save(&task("t1", "u2", 2_000));
        assert!(matches!(result, Err(Error::Ownership(_))));

        let fetched = store.get("u1", &TaskId::new("t1")).unwrap().unwrap();
        assert_eq!(fetched.updated_at, Some(from_millis(1_000)));
    }

    #[test]
    fn test_save_requires_timestamp_and_owner() {
        let store = setup();
        let mut untimed = task("t1", "u1", 0);
        untimed.updated_at = None;
        assert!(matches!(store.save(&untimed), Err(Error::Validation(_))));
        assert!(matches!(
            store.save(&task("t2", "", 1_000)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_owner_of_ignores_caller() {
        let store = setup();
        store.save(&task("t1", "u1", 1_000)).unwrap();

        assert_eq!(store.owner_of(&TaskId::new("t1")).unwrap().as_deref(), Some("u1"));
        assert_eq!(store.owner_of(&TaskId::new("t2")).unwrap(), None);
    }

    #[test]
    fn test_list_updated_after_is_strict_and_ascending() {
        let store = setup();
        store.save(&task("a", "u1", 3_000)).unwrap();
        store.save(&task("b", "u1", 1_000)).unwrap();
        store.save(&task("c", "u1", 2_000)).unwrap();
        store.save(&task("d", "u2", 5_000)).unwrap();

        let delta = store.list_updated_after("u1", from_millis(1_000)).unwrap();
        let ids: Vec<&str> = delta.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn test_list_by_owner_newest_first() {
        let store = setup();
        store.save(&task("a", "u1", 1_000)).unwrap();
        store.save(&task("b", "u1", 2_000)).unwrap();

        let tasks = store.list_by_owner("u1").unwrap();
        assert_eq!(tasks[0].id.as_str(), "b");
        assert_eq!(tasks.len(), 2);
    }

    #[test]
    fn test_delete_tombstones_and_propagates() {
        let store = setup();
        store.save(&task("t1", "u1", 1_000)).unwrap();

        let tombstone = store.delete(&TaskId::new("t1"), "u1", Some("d2")).unwrap();
        assert!(tombstone.deleted);
        assert_eq!(tombstone.device_id.as_deref(), Some("d2"));
        assert!(tombstone.updated_at > Some(from_millis(1_000)));

        let delta = store.list_updated_after("u1", from_millis(1_000)).unwrap();
        assert_eq!(delta.len(), 1);
        assert!(delta[0].deleted);
    }

    #[test]
    fn test_delete_missing_or_foreign_is_not_found() {
        let store = setup();
        store.save(&task("t1", "u1", 1_000)).unwrap();

        assert!(matches!(
            store.delete(&TaskId::new("t1"), "u2", None),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.delete(&TaskId::new("nope"), "u1", None),
            Err(Error::NotFound(_))
        ));

        store.delete(&TaskId::new("t1"), "u1", None).unwrap();
        assert!(matches!(
            store.delete(&TaskId::new("t1"), "u1", None),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_update_atomically_sees_current_and_persists_result() {
        let store = setup();
        store.save(&task("t1", "u1", 1_000)).unwrap();

        let saved = store
            .update_atomically("u1", &TaskId::new("t1"), &mut |current: Option<&Task>| {
                let mut next = current.cloned().unwrap();
                next.completed = true;
                next.updated_at = Some(from_millis(2_000));
                Ok(Some(next))
            })
            .unwrap();

        assert!(saved.is_some_and(|t| t.completed));
        let fetched = store.get("u1", &TaskId::new("t1")).unwrap().unwrap();
        assert!(fetched.completed);
    }

    #[test]
    fn test_update_atomically_none_leaves_store_untouched() {
        let store = setup();
        store.save(&task("t1", "u1", 1_000)).unwrap();

        let saved = store
            .update_atomically("u1", &TaskId::new("t1"), &mut |_: Option<&Task>| Ok(None))
            .unwrap();

        assert!(saved.is_none());
        let fetched = store.get("u1", &TaskId::new("t1")).unwrap().unwrap();
        assert_eq!(fetched.updated_at, Some(from_millis(1_000)));
    }

    #[test]
    fn test_update_atomically_rolls_back_on_error() {
        let store = setup();

        let result = store.update_atomically("u1", &TaskId::new("t1"), &mut |_: Option<&Task>| {
            Err(Error::validation("rejected"))
        });

        assert!(result.is_err());
        assert!(store.get("u1", &TaskId::new("t1")).unwrap().is_none());
    }

    #[test]
    fn test_resolution_log_round_trip() {
        let store = setup();
        let record = ConflictRecord {
            id: 0,
            task_id: TaskId::new("t1"),
            user_id: "u1".into(),
            device_id: "d1".into(),
            local_updated_at: Some(from_millis(2_000)),
            server_updated_at: None,
            resolved_at: from_millis(3_000),
            strategy: SyncStrategy::ClientWins,
            winner: ConflictWinner::Local,
        };
        store.record_resolution(&record).unwrap();

        let records = store.list_resolutions("u1", 10).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].id > 0);
        assert_eq!(records[0].strategy, SyncStrategy::ClientWins);
        assert_eq!(records[0].winner, ConflictWinner::Local);
        assert_eq!(records[0].server_updated_at, None);
        assert!(store.list_resolutions("u2", 10).unwrap().is_empty());
    }
}
