// Data models for the task board

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A user-visible to-do item
///
/// `completed` and `status == Completed` carry the same meaning. Only
/// [`TaskAction::Complete`](crate::action::TaskAction::Complete) sets both;
/// a direct edit can leave them disagreeing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_planner: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_focus: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_fields: Option<FocusFields>,
}

impl Task {
    /// Create a task with the given id and title, everything else unset
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            due_time: None,
            subject: None,
            priority: Priority::default(),
            status: None,
            completed: None,
            in_planner: None,
            in_focus: None,
            focus_fields: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// True if either completion signal is set
    pub fn is_completed(&self) -> bool {
        self.completed == Some(true) || self.status == Some(TaskStatus::Completed)
    }

    pub fn is_in_focus(&self) -> bool {
        self.in_focus == Some(true)
    }
}

/// Generate a fresh, time-ordered task id
///
/// The store never generates ids itself; callers that do not have their
/// own scheme can use this.
pub fn new_task_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Task priority
///
/// Accepts any letter case when parsing (older snapshots wrote `high`),
/// always written back capitalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

impl TryFrom<String> for Priority {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Priority> for &'static str {
    fn from(priority: Priority) -> Self {
        priority.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "todo" => Ok(TaskStatus::Todo),
            "in-progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// Extra state owned by the focus view
///
/// Opaque to the store: the object is kept exactly as written and never
/// validated. The accessors read well-known keys leniently and return
/// `None` when a key is missing or holds an unexpected type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FocusFields(pub Map<String, Value>);

impl FocusFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn notes(&self) -> Option<&str> {
        self.get("notes").and_then(Value::as_str)
    }

    /// String entries of `tags`; anything else in the array is ignored
    pub fn tags(&self) -> Vec<&str> {
        self.get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Accepts a number or a numeric string
    pub fn pomodoro_count(&self) -> Option<u64> {
        match self.get("pomodoroCount")? {
            Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn subtasks(&self) -> &[Value] {
        self.get("subtasks")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Stringified whatever the focus view stored (date string or timestamp)
    pub fn due_date(&self) -> Option<String> {
        match self.get("dueDate")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Drag order; fractional values are kept
    pub fn order(&self) -> Option<f64> {
        self.get("order").and_then(Value::as_f64)
    }
}

/// Partial update for an existing task
///
/// Shallow merge: a present field overrides, an absent one is kept. For
/// optional task fields an explicit `null` clears the value. The id cannot
/// be changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub due_time: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub subject: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub status: Option<Option<TaskStatus>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub completed: Option<Option<bool>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub in_planner: Option<Option<bool>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub in_focus: Option<Option<bool>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub focus_fields: Option<Option<FocusFields>>,
}

impl TaskUpdate {
    pub fn priority(priority: Priority) -> Self {
        Self {
            priority: Some(priority),
            ..Self::default()
        }
    }

    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(Some(status)),
            ..Self::default()
        }
    }

    /// True if applying this update would change nothing on any task
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge this update into `task`
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        merge(&mut task.description, &self.description);
        merge(&mut task.due_time, &self.due_time);
        merge(&mut task.subject, &self.subject);
        merge(&mut task.status, &self.status);
        merge(&mut task.completed, &self.completed);
        merge(&mut task.in_planner, &self.in_planner);
        merge(&mut task.in_focus, &self.in_focus);
        merge(&mut task.focus_fields, &self.focus_fields);
    }
}

fn merge<T: Clone>(field: &mut Option<T>, update: &Option<Option<T>>) {
    if let Some(value) = update {
        *field = value.clone();
    }
}

// Distinguishes a missing key (outer None, via `default`) from an explicit null
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_priority_parses_any_case() {
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("MEDIUM".parse::<Priority>().unwrap(), Priority::Medium);
        assert_eq!("Low".parse::<Priority>().unwrap(), Priority::Low);
        assert!("urgent".parse::<Priority>().is_err());

        let task: Task = serde_json::from_value(json!({"id": "1", "title": "T", "priority": "high"})).unwrap();
        assert_eq!(task.priority, Priority::High);

        // Always written back capitalized
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["priority"], "High");
    }

    #[test]
    fn test_task_missing_priority_defaults_to_medium() {
        let task: Task = serde_json::from_value(json!({"id": "1", "title": "T"})).unwrap();
        assert_eq!(task.priority, Priority::Medium);
    }

    #[test]
    fn test_task_serializes_camel_case_and_skips_unset() {
        let mut task = Task::new("1", "Write report").with_priority(Priority::High);
        task.due_time = Some("10:00 AM".to_string());
        task.in_focus = Some(true);

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "1",
                "title": "Write report",
                "dueTime": "10:00 AM",
                "priority": "High",
                "inFocus": true,
            })
        );
    }

    #[test]
    fn test_status_kebab_case() {
        let status: TaskStatus = serde_json::from_value(json!("in-progress")).unwrap();
        assert_eq!(status, TaskStatus::InProgress);
        assert_eq!(serde_json::to_value(TaskStatus::Completed).unwrap(), json!("completed"));
        assert_eq!("todo".parse::<TaskStatus>().unwrap(), TaskStatus::Todo);
    }

    #[test]
    fn test_focus_fields_keep_unknown_keys() {
        let raw = json!({
            "notes": "chapter 3",
            "pomodoroCount": 2,
            "subtasks": [{"text": "outline", "done": false}],
            "colour": "teal",
        });

        let fields: FocusFields = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(fields.notes(), Some("chapter 3"));
        assert_eq!(fields.pomodoro_count(), Some(2));
        assert_eq!(fields.subtasks().len(), 1);
        assert_eq!(fields.get("colour"), Some(&json!("teal")));
        assert_eq!(serde_json::to_value(&fields).unwrap(), raw);
    }

    #[test]
    fn test_focus_fields_accept_unexpected_types() {
        let raw = json!({
            "order": 1.5,
            "pomodoroCount": "3",
            "dueDate": 1760695200000u64,
            "tags": ["exam", 7],
            "subtasks": "none",
        });

        let task: Task = serde_json::from_value(json!({"id": "1", "title": "T", "focusFields": raw.clone()})).unwrap();
        let fields = task.focus_fields.as_ref().unwrap();

        assert_eq!(fields.order(), Some(1.5));
        assert_eq!(fields.pomodoro_count(), Some(3));
        assert_eq!(fields.due_date().as_deref(), Some("1760695200000"));
        assert_eq!(fields.tags(), vec!["exam"]);
        assert!(fields.subtasks().is_empty());
        assert_eq!(fields.notes(), None);

        // Written back untouched
        assert_eq!(serde_json::to_value(&task).unwrap()["focusFields"], raw);
    }

    #[test]
    fn test_update_merge_overrides_only_present_fields() {
        let mut task = Task::new("1", "Write report").with_priority(Priority::High);
        task.subject = Some("Physics".to_string());

        TaskUpdate::priority(Priority::Low).apply_to(&mut task);

        assert_eq!(task.priority, Priority::Low);
        assert_eq!(task.title, "Write report");
        assert_eq!(task.subject.as_deref(), Some("Physics"));
    }

    #[test]
    fn test_update_null_clears_field() {
        let mut task = Task::new("1", "Write report");
        task.subject = Some("Physics".to_string());
        task.description = Some("draft".to_string());

        let update: TaskUpdate = serde_json::from_value(json!({"subject": null})).unwrap();
        assert_eq!(update.subject, Some(None));
        assert_eq!(update.description, None);

        update.apply_to(&mut task);
        assert_eq!(task.subject, None);
        assert_eq!(task.description.as_deref(), Some("draft"));
    }

    #[test]
    fn test_update_rejects_id_and_unknown_keys() {
        assert!(serde_json::from_value::<TaskUpdate>(json!({"id": "2"})).is_err());
        assert!(serde_json::from_value::<TaskUpdate>(json!({"tittle": "x"})).is_err());
        assert!(TaskUpdate::default().is_empty());
    }

    #[test]
    fn test_is_completed_uses_either_flag() {
        let mut task = Task::new("1", "T");
        assert!(!task.is_completed());

        task.completed = Some(true);
        assert!(task.is_completed());

        task.completed = None;
        task.status = Some(TaskStatus::Completed);
        assert!(task.is_completed());
    }

    #[test]
    fn test_new_task_id_is_unique() {
        let a = new_task_id();
        let b = new_task_id();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }
}
