//! Device model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A registered device that may take part in sync rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Registry row identifier (UUID v7)
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Human-readable device name
    pub name: String,
    /// Unique device identity carried by sync requests
    pub device_id: String,
    /// Last time the device completed a sync touch
    pub last_seen: DateTime<Utc>,
    /// Registration timestamp
    pub created_at: DateTime<Utc>,
}

impl Device {
    /// Create a new device record for `user_id`.
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Result<Self> {
        let user_id = user_id.into().trim().to_string();
        let name = name.into().trim().to_string();
        let device_id = device_id.into().trim().to_string();

        if user_id.is_empty() {
            return Err(Error::validation("Device user_id cannot be empty"));
        }
        if device_id.is_empty() {
            return Err(Error::validation("Device device_id cannot be empty"));
        }

        let now = crate::util::now();
        Ok(Self {
            id: Uuid::now_v7().to_string(),
            user_id,
            name,
            device_id,
            last_seen: now,
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_new() {
        let device = Device::new("u1", " Laptop ", "d1").unwrap();
        assert_eq!(device.name, "Laptop");
        assert_eq!(device.device_id, "d1");
        assert_eq!(device.last_seen, device.created_at);
    }

    #[test]
    fn test_device_validation() {
        assert!(Device::new("", "Laptop", "d1").is_err());
        assert!(Device::new("u1", "Laptop", "  ").is_err());
    }
}
