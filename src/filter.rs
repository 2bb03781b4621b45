// Read-only filtering over a task snapshot

use crate::models::{Priority, Task, TaskStatus};

/// A single condition a task must satisfy
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Status(TaskStatus),
    Priority(Priority),
    /// Case-insensitive subject match
    Subject(String),
    InFocus(bool),
    InPlanner(bool),
    /// Either completion signal counts (`completed` flag or status)
    Completed(bool),
}

impl Criterion {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Criterion::Status(status) => task.status == Some(*status),
            Criterion::Priority(priority) => task.priority == *priority,
            Criterion::Subject(subject) => task
                .subject
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(subject)),
            Criterion::InFocus(flag) => task.in_focus.unwrap_or(false) == *flag,
            Criterion::InPlanner(flag) => task.in_planner.unwrap_or(false) == *flag,
            Criterion::Completed(flag) => task.is_completed() == *flag,
        }
    }
}

impl std::fmt::Display for Criterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Criterion::Status(s) => write!(f, "status={}", s),
            Criterion::Priority(p) => write!(f, "priority={}", p),
            Criterion::Subject(s) => write!(f, "subject={}", s),
            Criterion::InFocus(b) => write!(f, "inFocus={}", b),
            Criterion::InPlanner(b) => write!(f, "inPlanner={}", b),
            Criterion::Completed(b) => write!(f, "completed={}", b),
        }
    }
}

/// Conjunction of criteria; empty matches everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    criteria: Vec<Criterion>,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, criterion: Criterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.criteria.iter().all(|c| c.matches(task))
    }

    /// Matching tasks, in snapshot order
    pub fn apply<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        tasks.iter().filter(|t| self.matches(t)).collect()
    }
}
