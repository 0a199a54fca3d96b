//! Resolution log entry model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::TaskId;
use crate::sync::SyncStrategy;

/// Which side of a conflict the strategy kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictWinner {
    Local,
    Server,
}

impl ConflictWinner {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Server => "server",
        }
    }

    /// Parse a stored winner tag
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "local" => Some(Self::Local),
            "server" => Some(Self::Server),
            _ => None,
        }
    }
}

/// An automatically resolved conflict, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Row identifier assigned by the store (0 before insert)
    pub id: i64,
    pub task_id: TaskId,
    pub user_id: String,
    /// Device that submitted the losing or winning local version
    pub device_id: String,
    pub local_updated_at: Option<DateTime<Utc>>,
    pub server_updated_at: Option<DateTime<Utc>>,
    pub resolved_at: DateTime<Utc>,
    pub strategy: SyncStrategy,
    pub winner: ConflictWinner,
}
