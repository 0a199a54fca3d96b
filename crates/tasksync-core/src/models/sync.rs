//! Sync round request/response models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::Task;

/// One device's request to synchronize its task list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Owning user
    #[serde(default)]
    pub user_id: String,
    /// Originating device
    #[serde(default)]
    pub device_id: String,
    /// High-water mark from the device's last successful sync
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Tasks the device wants to push, in processing order
    #[serde(default)]
    pub todos: Vec<Task>,
}

impl SyncRequest {
    pub fn new(user_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            device_id: device_id.into(),
            last_sync_at: None,
            todos: Vec::new(),
        }
    }

    #[must_use]
    pub const fn since(mut self, checkpoint: DateTime<Utc>) -> Self {
        self.last_sync_at = Some(checkpoint);
        self
    }

    #[must_use]
    pub fn with_todos(mut self, todos: Vec<Task>) -> Self {
        self.todos = todos;
        self
    }

    /// Checkpoint the server delta is measured from.
    ///
    /// A device that has never synced pulls everything.
    pub fn checkpoint(&self) -> DateTime<Utc> {
        self.last_sync_at.unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Result of one sync round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    /// The device's next checkpoint, just behind the server time of the pull
    pub last_sync_at: DateTime<Utc>,
    /// Server tasks changed after the request's checkpoint
    pub todos: Vec<Task>,
    /// Unresolved conflicts (manual resolution only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<Conflict>,
}

/// A locally submitted version and the server-held version of the same task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    #[serde(rename = "local_todo")]
    pub local: Task,
    #[serde(rename = "server_todo")]
    pub server: Task,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_omits_empty_conflicts() {
        let response = SyncResponse {
            last_sync_at: crate::util::from_millis(0),
            todos: Vec::new(),
            conflicts: Vec::new(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("conflicts").is_none());
    }

    #[test]
    fn conflict_uses_wire_field_names() {
        let conflict = Conflict {
            local: Task::new("t1", "local"),
            server: Task::new("t1", "server"),
        };
        let json = serde_json::to_value(&conflict).unwrap();
        assert_eq!(json["local_todo"]["name"], "local");
        assert_eq!(json["server_todo"]["name"], "server");
    }

    #[test]
    fn request_parses_rfc3339_checkpoint() {
        let request: SyncRequest = serde_json::from_str(
            r#"{"user_id":"u1","device_id":"d1","last_sync_at":"2024-01-01T00:00:00Z","todos":[]}"#,
        )
        .unwrap();
        assert_eq!(
            request.checkpoint(),
            "2024-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn missing_checkpoint_pulls_everything() {
        let request = SyncRequest::new("u1", "d1");
        assert_eq!(request.checkpoint(), DateTime::<Utc>::MIN_UTC);
    }
}
