//! Merge of two independent task collections.
//!
//! Used for offline reconciliation and backup restore. Operates on plain
//! slices and never touches a store.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::SyncStrategy;
use crate::models::{ConflictWinner, Task, TaskId};

/// Merge two task collections into one list with a single version per ID.
///
/// For IDs present on both sides the later `updated_at` wins, with ties
/// going to `server`. IDs present on one side only are carried as they are.
/// The output is ordered by `updated_at` descending, then by ID ascending.
/// Within one input, a later duplicate of an ID replaces an earlier one.
pub fn merge(local: &[Task], server: &[Task]) -> Vec<Task> {
    let local_map = index_by_id(local);
    let server_map = index_by_id(server);

    let mut merged: Vec<Task> = Vec::with_capacity(local_map.len().max(server_map.len()));

    for (id, local_task) in &local_map {
        let chosen = match server_map.get(id) {
            Some(server_task) => later_of(local_task, server_task),
            None => *local_task,
        };
        merged.push(chosen.clone());
    }

    merged.extend(
        server_map
            .iter()
            .filter(|(id, _)| !local_map.contains_key(*id))
            .map(|(_, task)| (*task).clone()),
    );

    merged.sort_by(newest_first);
    merged
}

fn index_by_id(tasks: &[Task]) -> HashMap<&TaskId, &Task> {
    tasks.iter().map(|task| (&task.id, task)).collect()
}

fn later_of<'a>(local: &'a Task, server: &'a Task) -> &'a Task {
    match SyncStrategy::TimeBased.winner(local, server) {
        ConflictWinner::Local => local,
        ConflictWinner::Server => server,
    }
}

fn newest_first(a: &Task, b: &Task) -> Ordering {
    b.updated_at
        .cmp(&a.updated_at)
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::from_millis;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn task(id: &str, name: &str, ms: i64) -> Task {
        Task::new(id, name).with_updated_at(from_millis(ms))
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|task| task.id.as_str()).collect()
    }

    // --- overlap tests ---

    #[test]
    fn newer_local_wins_and_order_is_newest_first() {
        let local = vec![task("t1", "local t1", 5_000), task("t2", "local t2", 6_000)];
        let server = vec![task("t1", "server t1", 3_000), task("t3", "server t3", 2_000)];

        let merged = merge(&local, &server);

        assert_eq!(ids(&merged), vec!["t2", "t1", "t3"]);
        assert_eq!(merged[1].name, "local t1");
    }

    #[test]
    fn newer_server_wins() {
        let local = vec![task("t1", "local", 1_000)];
        let server = vec![task("t1", "server", 2_000)];

        let merged = merge(&local, &server);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "server");
    }

    #[test]
    fn equal_timestamps_go_to_server() {
        let local = vec![task("t1", "local", 1_000)];
        let server = vec![task("t1", "server", 1_000)];

        let merged = merge(&local, &server);
        assert_eq!(merged[0].name, "server");
    }

    // --- edge case tests ---

    #[test]
    fn empty_inputs_produce_empty_output() {
        assert!(merge(&[], &[]).is_empty());
    }

    #[test]
    fn one_sided_input_is_sorted_copy() {
        let server = vec![task("a", "old", 1_000), task("b", "new", 2_000)];
        let merged = merge(&[], &server);
        assert_eq!(ids(&merged), vec!["b", "a"]);
    }

    #[test]
    fn equal_timestamps_order_by_id() {
        let local = vec![task("b", "b", 1_000), task("a", "a", 1_000)];
        let merged = merge(&local, &[]);
        assert_eq!(ids(&merged), vec!["a", "b"]);
    }

    #[test]
    fn later_duplicate_within_one_side_wins() {
        let local = vec![task("t1", "first", 1_000), task("t1", "second", 1_000)];
        let merged = merge(&local, &[]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "second");
    }

    #[test]
    fn tombstones_merge_like_any_other_version() {
        let mut deleted = task("t1", "gone", 2_000);
        deleted.deleted = true;
        let merged = merge(&[deleted], &[task("t1", "alive", 1_000)]);
        assert!(merged[0].deleted);
    }

    // --- property tests ---

    fn arb_tasks() -> impl Strategy<Value = Vec<Task>> {
        prop::collection::vec((0u8..8, 0i64..50), 0..12).prop_map(|entries| {
            let mut seen = std::collections::HashSet::new();
            entries
                .into_iter()
                .filter(|(id, _)| seen.insert(*id))
                .map(|(id, ms)| task(&format!("t{id}"), "task", ms))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn output_ids_are_the_union_without_duplicates(local in arb_tasks(), server in arb_tasks()) {
            let merged = merge(&local, &server);
            let mut expected: Vec<&TaskId> = local.iter().chain(server.iter()).map(|t| &t.id).collect();
            expected.sort();
            expected.dedup();
            let mut actual: Vec<&TaskId> = merged.iter().map(|t| &t.id).collect();
            actual.sort();
            prop_assert_eq!(actual, expected);
        }

        #[test]
        fn output_is_sorted_newest_first(local in arb_tasks(), server in arb_tasks()) {
            let merged = merge(&local, &server);
            for pair in merged.windows(2) {
                prop_assert!(newest_first(&pair[0], &pair[1]) != Ordering::Greater);
            }
        }

        #[test]
        fn each_output_is_the_latest_input_version(local in arb_tasks(), server in arb_tasks()) {
            let merged = merge(&local, &server);
            for out in &merged {
                let latest = local
                    .iter()
                    .chain(server.iter())
                    .filter(|t| t.id == out.id)
                    .filter_map(|t| t.updated_at)
                    .max();
                prop_assert_eq!(out.updated_at, latest);
            }
        }

        #[test]
        fn merging_a_collection_with_itself_is_a_no_op(tasks in arb_tasks()) {
            let mut expected = tasks.clone();
            expected.sort_by(newest_first);
            prop_assert_eq!(merge(&tasks, &tasks), expected);
        }

        #[test]
        fn merge_with_empty_server_keeps_local(local in arb_tasks()) {
            let mut expected = local.clone();
            expected.sort_by(newest_first);
            prop_assert_eq!(merge(&local, &[]), expected);
        }
    }
}
