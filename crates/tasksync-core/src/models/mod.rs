//! Data models for tasksync

mod conflict_record;
mod device;
mod sync;
mod task;

pub use conflict_record::{ConflictRecord, ConflictWinner};
pub use device::Device;
pub use sync::{Conflict, SyncRequest, SyncResponse};
pub use task::{Task, TaskId};
