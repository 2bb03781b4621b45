// Task actions and the pure transition function

use crate::models::{Task, TaskStatus, TaskUpdate};

/// A mutation request against the task collection
#[derive(Debug, Clone, PartialEq)]
pub enum TaskAction {
    /// Append a task. The caller guarantees the id is unused.
    Add(Task),
    /// Shallow-merge `updates` into the task with `id`
    Edit { id: String, updates: TaskUpdate },
    Delete(String),
    /// Set `completed` and `status` together
    Complete(String),
    /// Replace the task with the same id wholesale, or append it
    ///
    /// If ids were duplicated by the caller, only the first task with the id
    /// is replaced and later ones are kept; `Delete` removes them all.
    Sync(Task),
    /// Move the task at `source` to `destination`
    Reorder { source: usize, destination: usize },
}

impl TaskAction {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            TaskAction::Add(_) => "add",
            TaskAction::Edit { .. } => "edit",
            TaskAction::Delete(_) => "delete",
            TaskAction::Complete(_) => "complete",
            TaskAction::Sync(_) => "sync",
            TaskAction::Reorder { .. } => "reorder",
        }
    }
}

/// Result of applying an action
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub tasks: Vec<Task>,
    /// False when the action referred to nothing (unknown id, source index
    /// out of range). `tasks` is then equal to the input.
    pub matched: bool,
}

/// Compute the next collection from `tasks` and `action`
///
/// Pure: no I/O, and `tasks` is never modified.
pub fn reduce(tasks: &[Task], action: TaskAction) -> Transition {
    match action {
        TaskAction::Add(task) => {
            let mut next = Vec::with_capacity(tasks.len() + 1);
            next.extend_from_slice(tasks);
            next.push(task);
            Transition { tasks: next, matched: true }
        }
        TaskAction::Edit { id, updates } => map_matching(tasks, &id, |task| updates.apply_to(task)),
        TaskAction::Complete(id) => map_matching(tasks, &id, |task| {
            task.completed = Some(true);
            task.status = Some(TaskStatus::Completed);
        }),
        TaskAction::Delete(id) => {
            let next: Vec<Task> = tasks.iter().filter(|t| t.id != id).cloned().collect();
            let matched = next.len() != tasks.len();
            Transition { tasks: next, matched }
        }
        TaskAction::Sync(task) => {
            let mut next = tasks.to_vec();
            match next.iter_mut().find(|t| t.id == task.id) {
                Some(existing) => *existing = task,
                None => next.push(task),
            }
            Transition { tasks: next, matched: true }
        }
        TaskAction::Reorder { source, destination } => {
            let mut next = tasks.to_vec();
            if source >= next.len() {
                return Transition { tasks: next, matched: false };
            }
            let moved = next.remove(source);
            let destination = destination.min(next.len());
            next.insert(destination, moved);
            Transition { tasks: next, matched: true }
        }
    }
}

fn map_matching(tasks: &[Task], id: &str, mut apply: impl FnMut(&mut Task)) -> Transition {
    let mut matched = false;
    let next = tasks
        .iter()
        .map(|task| {
            let mut task = task.clone();
            if task.id == id {
                apply(&mut task);
                matched = true;
            }
            task
        })
        .collect();
    Transition { tasks: next, matched }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    fn abc() -> Vec<Task> {
        vec![Task::new("a", "A"), Task::new("b", "B"), Task::new("c", "C")]
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_add_appends() {
        let before = abc();
        let result = reduce(&before, TaskAction::Add(Task::new("d", "D")));
        assert!(result.matched);
        assert_eq!(ids(&result.tasks), vec!["a", "b", "c", "d"]);
        assert_eq!(before.len(), 3);
    }

    #[test]
    fn test_add_does_not_deduplicate() {
        let result = reduce(&abc(), TaskAction::Add(Task::new("a", "Again")));
        assert_eq!(ids(&result.tasks), vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn test_edit_changes_only_given_field() {
        let mut before = abc();
        before[1].description = Some("keep me".to_string());
        before[1].priority = Priority::High;

        let result = reduce(
            &before,
            TaskAction::Edit {
                id: "b".to_string(),
                updates: TaskUpdate::priority(Priority::Low),
            },
        );

        assert!(result.matched);
        let mut expected = before[1].clone();
        expected.priority = Priority::Low;
        assert_eq!(result.tasks[1], expected);
        assert_eq!(result.tasks[0], before[0]);
        assert_eq!(result.tasks[2], before[2]);
    }

    #[test]
    fn test_edit_unknown_id_is_noop() {
        let before = abc();
        let result = reduce(
            &before,
            TaskAction::Edit {
                id: "zzz".to_string(),
                updates: TaskUpdate::priority(Priority::Low),
            },
        );
        assert!(!result.matched);
        assert_eq!(result.tasks, before);
    }

    #[test]
    fn test_edit_can_desync_completion_flags() {
        let done = reduce(&abc(), TaskAction::Complete("a".to_string())).tasks;
        let result = reduce(
            &done,
            TaskAction::Edit {
                id: "a".to_string(),
                updates: TaskUpdate::status(TaskStatus::Todo),
            },
        );
        assert_eq!(result.tasks[0].status, Some(TaskStatus::Todo));
        assert_eq!(result.tasks[0].completed, Some(true));
    }

    #[test]
    fn test_complete_sets_both_flags() {
        let result = reduce(&abc(), TaskAction::Complete("c".to_string()));
        assert!(result.matched);
        assert_eq!(result.tasks[2].completed, Some(true));
        assert_eq!(result.tasks[2].status, Some(TaskStatus::Completed));
        assert_eq!(result.tasks[0].completed, None);
    }

    #[test]
    fn test_complete_unknown_id_is_noop() {
        let before = abc();
        let result = reduce(&before, TaskAction::Complete("zzz".to_string()));
        assert!(!result.matched);
        assert_eq!(result.tasks, before);
    }

    #[test]
    fn test_delete_keeps_relative_order() {
        let result = reduce(&abc(), TaskAction::Delete("b".to_string()));
        assert!(result.matched);
        assert_eq!(ids(&result.tasks), vec!["a", "c"]);

        let result = reduce(&abc(), TaskAction::Delete("zzz".to_string()));
        assert!(!result.matched);
        assert_eq!(ids(&result.tasks), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_sync_replaces_wholesale() {
        let mut before = abc();
        before[0].subject = Some("Maths".to_string());

        let replacement = Task::new("a", "A v2").with_priority(Priority::High);
        let result = reduce(&before, TaskAction::Sync(replacement.clone()));

        assert!(result.matched);
        assert_eq!(result.tasks[0], replacement);
        // Unlike edit, fields absent from the new task are gone
        assert_eq!(result.tasks[0].subject, None);
        assert_eq!(result.tasks.len(), 3);
    }

    #[test]
    fn test_sync_with_duplicate_ids_replaces_first_only() {
        let mut before = abc();
        before.push(Task::new("a", "A copy"));

        let result = reduce(&before, TaskAction::Sync(Task::new("a", "A v2")));
        assert_eq!(ids(&result.tasks), vec!["a", "b", "c", "a"]);
        assert_eq!(result.tasks[0].title, "A v2");
        assert_eq!(result.tasks[3].title, "A copy");

        let result = reduce(&before, TaskAction::Delete("a".to_string()));
        assert_eq!(ids(&result.tasks), vec!["b", "c"]);
    }

    #[test]
    fn test_sync_appends_unknown() {
        let result = reduce(&abc(), TaskAction::Sync(Task::new("d", "D")));
        assert_eq!(ids(&result.tasks), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_reorder_moves_element() {
        let result = reduce(&abc(), TaskAction::Reorder { source: 0, destination: 2 });
        assert!(result.matched);
        assert_eq!(ids(&result.tasks), vec!["b", "c", "a"]);

        let result = reduce(&abc(), TaskAction::Reorder { source: 2, destination: 0 });
        assert_eq!(ids(&result.tasks), vec!["c", "a", "b"]);

        let result = reduce(&abc(), TaskAction::Reorder { source: 1, destination: 1 });
        assert_eq!(ids(&result.tasks), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_reorder_out_of_range() {
        let result = reduce(&abc(), TaskAction::Reorder { source: 3, destination: 0 });
        assert!(!result.matched);
        assert_eq!(ids(&result.tasks), vec!["a", "b", "c"]);

        // Destination past the end clamps to the last slot
        let result = reduce(&abc(), TaskAction::Reorder { source: 0, destination: 99 });
        assert!(result.matched);
        assert_eq!(ids(&result.tasks), vec!["b", "c", "a"]);

        let result = reduce(&[], TaskAction::Reorder { source: 0, destination: 0 });
        assert!(!result.matched);
        assert!(result.tasks.is_empty());
    }
}
