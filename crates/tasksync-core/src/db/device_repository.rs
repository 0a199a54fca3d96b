//! Device registry implementation

use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::Database;
use crate::error::{Error, Result};
use crate::models::Device;
use crate::store::DeviceRegistry;
use crate::util::{from_millis, now, to_millis};

const DEVICE_COLUMNS: &str = "id, user_id, name, device_id, last_seen, created_at";

/// `SQLite` implementation of `DeviceRegistry`
#[derive(Clone)]
pub struct SqliteDeviceRegistry {
    db: Arc<Database>,
}

impl SqliteDeviceRegistry {
    /// Create a new registry over the given database
    pub const fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn parse_device(row: &rusqlite::Row<'_>) -> rusqlite::Result<Device> {
        Ok(Device {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            device_id: row.get(3)?,
            last_seen: from_millis(row.get(4)?),
            created_at: from_millis(row.get(5)?),
        })
    }

    fn find(conn: &Connection, device_id: &str) -> Result<Option<Device>> {
        let device = conn
            .query_row(
                &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE device_id = ?1"),
                params![device_id],
                Self::parse_device,
            )
            .optional()?;
        Ok(device)
    }

    fn not_registered(device_id: &str) -> Error {
        Error::device(format!("device {device_id} is not registered"))
    }
}

impl DeviceRegistry for SqliteDeviceRegistry {
    fn resolve(&self, device_id: &str) -> Result<Option<Device>> {
        Self::find(&self.db.connection(), device_id.trim())
    }

    fn touch(&self, device: &mut Device) -> Result<()> {
        let seen_at = now();
        let rows = self.db.connection().execute(
            "UPDATE devices SET last_seen = ?1 WHERE device_id = ?2 AND user_id = ?3",
            params![to_millis(seen_at), device.device_id, device.user_id],
        )?;

        if rows == 0 {
            return Err(Self::not_registered(&device.device_id));
        }

        device.last_seen = seen_at;
        Ok(())
    }

    fn register(&self, user_id: &str, name: &str, device_id: &str) -> Result<Device> {
        let candidate = Device::new(user_id, name, device_id)?;

        let mut conn = self.db.connection();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(existing) = Self::find(&tx, &candidate.device_id)? {
            if existing.user_id != candidate.user_id {
                return Err(Error::device(format!(
                    "device {} is registered to another user",
                    candidate.device_id
                )));
            }
            return Ok(existing);
        }

        tx.execute(
            "INSERT INTO devices (id, user_id, name, device_id, last_seen, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                candidate.id,
                candidate.user_id,
                candidate.name,
                candidate.device_id,
                to_millis(candidate.last_seen),
                to_millis(candidate.created_at),
            ],
        )?;
        tx.commit()?;

        tracing::info!(
            user_id = %candidate.user_id,
            device_id = %candidate.device_id,
            "Registered device"
        );
        Ok(candidate)
    }

    fn list_recent(&self, user_id: &str, limit: usize) -> Result<Vec<Device>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices
             WHERE user_id = ?1
             ORDER BY last_seen DESC, created_at DESC
             LIMIT ?2"
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let devices = stmt
            .query_map(params![user_id, limit], Self::parse_device)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(devices)
    }

    fn rename(&self, user_id: &str, device_id: &str, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("Device name cannot be empty"));
        }

        let rows = self.db.connection().execute(
            "UPDATE devices SET name = ?1 WHERE device_id = ?2 AND user_id = ?3",
            params![name, device_id, user_id],
        )?;

        if rows == 0 {
            return Err(Self::not_registered(device_id));
        }
        Ok(())
    }

    fn remove(&self, user_id: &str, device_id: &str) -> Result<()> {
        let rows = self.db.connection().execute(
            "DELETE FROM devices WHERE device_id = ?1 AND user_id = ?2",
            params![device_id, user_id],
        )?;

        if rows == 0 {
            return Err(Self::not_registered(device_id));
        }

        tracing::info!(user_id, device_id, "Removed device");
        Ok(())
    }
}
