//! Conflict detection.

use crate::models::Task;

/// Decide whether two versions of the same task conflict.
///
/// Both versions must share an ID. They conflict when their modification
/// times differ and they were last written by different devices. A device
/// overwriting its own earlier write is never a conflict, and neither are
/// identical timestamps.
pub fn has_conflict(local: &Task, server: &Task) -> bool {
    local.updated_at != server.updated_at && local.device_id != server.device_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::from_millis;
    use proptest::prelude::*;

    fn version(device: &str, ms: i64) -> Task {
        Task::new("t1", "Buy milk")
            .with_device(device)
            .with_updated_at(from_millis(ms))
    }

    #[test]
    fn different_device_and_time_conflicts() {
        assert!(has_conflict(&version("d1", 2_000), &version("d2", 1_000)));
    }

    #[test]
    fn same_device_never_conflicts() {
        assert!(!has_conflict(&version("d1", 2_000), &version("d1", 1_000)));
    }

    #[test]
    fn same_timestamp_never_conflicts() {
        assert!(!has_conflict(&version("d1", 1_000), &version("d2", 1_000)));
    }

    #[test]
    fn missing_device_compares_as_distinct() {
        let mut server = version("d2", 1_000);
        server.device_id = None;
        assert!(has_conflict(&version("d1", 2_000), &server));
    }

    proptest! {
        #[test]
        fn detection_is_symmetric(a in 0i64..10_000, b in 0i64..10_000, same_device: bool) {
            let local = version("d1", a);
            let server = version(if same_device { "d1" } else { "d2" }, b);
            prop_assert_eq!(has_conflict(&local, &server), has_conflict(&server, &local));
        }

        #[test]
        fn a_version_never_conflicts_with_itself(ms in 0i64..10_000) {
            let task = version("d1", ms);
            prop_assert!(!has_conflict(&task, &task));
        }
    }
}
