//! Synchronization engine.
//!
//! A sync round pushes a device's local changes, pulls everything the server
//! changed since the device's checkpoint, and settles conflicting edits with
//! the configured [`SyncStrategy`]. [`merge`] reconciles two collections
//! without a store.

mod detector;
mod merge;
mod orchestrator;
mod strategy;

pub use detector::has_conflict;
pub use merge::merge;
pub use orchestrator::SyncService;
pub use strategy::SyncStrategy;
