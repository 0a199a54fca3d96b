//! `SQLite` implementation of the store and registry contracts

mod connection;
mod device_repository;
mod migrations;
mod task_repository;

pub use connection::Database;
pub use device_repository::SqliteDeviceRegistry;
pub use task_repository::SqliteTaskStore;
