// Task store: current snapshot plus write-through persistence

use crate::action::{TaskAction, reduce};
use crate::error::{StoreError, StoreResult};
use crate::models::{Task, TaskUpdate};
use crate::slot::{KeyValueSlot, now_ms, validate_key};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key the task collection is persisted under
pub const TASKS_KEY: &str = "tasks";

/// Schema version written into the persisted envelope
pub const SNAPSHOT_VERSION: u32 = 1;

/// Immutable view of the task collection
///
/// Each mutation installs a new snapshot; a snapshot handed out earlier is
/// never changed. Identity changes on every dispatch, so [`Snapshot::ptr_eq`]
/// returning false means "maybe changed", not "different content".
#[derive(Debug, Clone, Default)]
pub struct Snapshot(Arc<[Task]>);

impl Snapshot {
    fn new(tasks: Vec<Task>) -> Self {
        Self(tasks.into())
    }

    pub fn ptr_eq(a: &Snapshot, b: &Snapshot) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.0.iter().find(|t| t.id == id)
    }

    pub fn to_vec(&self) -> Vec<Task> {
        self.0.to_vec()
    }
}

impl Deref for Snapshot {
    type Target = [Task];

    fn deref(&self) -> &[Task] {
        &self.0
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.0[..] == other.0[..]
    }
}

/// What `open` found in the slot
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Nothing stored yet
    Fresh,
    /// Restored `count` tasks; `skipped` entries did not decode and were dropped
    Restored { count: usize, skipped: usize },
    /// Stored value did not decode; started empty
    Corrupted { error: String },
    /// Slot read failed; started empty
    Unreadable { error: String },
}

impl LoadOutcome {
    /// True if the stored value held data the store could not take in
    pub fn lost_data(&self) -> bool {
        match self {
            LoadOutcome::Corrupted { .. } => true,
            LoadOutcome::Restored { skipped, .. } => *skipped > 0,
            LoadOutcome::Fresh | LoadOutcome::Unreadable { .. } => false,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    tasks: &'a [Task],
}

/// A decoded persisted value
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub tasks: Vec<Task>,
    /// Entries that failed to decode and were left out
    pub skipped: usize,
    /// `None` for the legacy layout or when the field is missing or unparsable
    pub saved_at: Option<DateTime<Utc>>,
}

/// Encode tasks in the persisted layout
pub fn encode_snapshot(tasks: &[Task]) -> StoreResult<String> {
    let envelope = Envelope {
        version: SNAPSHOT_VERSION,
        saved_at: Utc::now(),
        tasks,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Decode a persisted value, accepting the envelope and the legacy bare array
///
/// Tasks are decoded one at a time; an entry that does not decode is logged
/// and skipped so the rest of the collection survives.
pub fn decode_snapshot(key: &str, raw: &str) -> StoreResult<Decoded> {
    let value: Value = serde_json::from_str(raw).map_err(|source| StoreError::Corrupted {
        key: key.to_string(),
        source,
    })?;

    let malformed = |reason: &str| StoreError::Malformed {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    let (entries, saved_at) = match value {
        // Layout written before the envelope existed
        Value::Array(entries) => (entries, None),
        Value::Object(mut envelope) => {
            let version = envelope
                .get("version")
                .ok_or_else(|| malformed("missing 'version'"))?
                .as_u64()
                .ok_or_else(|| malformed("'version' is not a non-negative integer"))?;
            if version > u64::from(SNAPSHOT_VERSION) {
                return Err(StoreError::UnsupportedVersion {
                    key: key.to_string(),
                    version,
                    supported: SNAPSHOT_VERSION,
                });
            }

            let saved_at = envelope
                .get("savedAt")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));

            match envelope.remove("tasks") {
                Some(Value::Array(entries)) => (entries, saved_at),
                Some(_) => return Err(malformed("'tasks' is not an array")),
                None => return Err(malformed("missing 'tasks'")),
            }
        }
        _ => return Err(malformed("expected an array or an object")),
    };

    let mut tasks = Vec::with_capacity(entries.len());
    let mut skipped = 0;
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<Task>(entry) {
            Ok(task) => tasks.push(task),
            Err(e) => {
                warn!(key, index, error = %e, "Failed to decode task, skipping");
                skipped += 1;
            }
        }
    }

    Ok(Decoded {
        tasks,
        skipped,
        saved_at,
    })
}

/// Key the raw value is copied to before a lossy load gets overwritten
///
/// Truncates `key` so the result still passes [`validate_key`].
pub fn backup_key(key: &str, stamp_ms: i64) -> String {
    let suffix = format!("-backup-{}", stamp_ms);
    let keep = 64usize.saturating_sub(suffix.len());
    let prefix: String = key.chars().take(keep).collect();
    format!("{}{}", prefix, suffix)
}

/// Authoritative task collection for one process
///
/// Every mutation goes through [`TaskStore::dispatch`]: the pure transition
/// runs first, the new snapshot is installed, then the whole collection is
/// written to the slot before the call returns.
pub struct TaskStore<S: KeyValueSlot> {
    slot: S,
    key: String,
    tasks: Snapshot,
    load_outcome: LoadOutcome,
    // Raw value to copy aside before the first write, after a lossy load
    pending_backup: Option<String>,
    backup_key: Option<String>,
}

impl<S: KeyValueSlot> TaskStore<S> {
    /// Open the store over `slot`, restoring from the default key
    pub fn open(slot: S) -> Self {
        Self::load(slot, TASKS_KEY.to_string())
    }

    /// Open the store over `slot`, restoring from `key`
    pub fn open_with_key(slot: S, key: impl Into<String>) -> StoreResult<Self> {
        let key = key.into();
        validate_key(&key).map_err(StoreError::InvalidKey)?;
        Ok(Self::load(slot, key))
    }

    fn load(slot: S, key: String) -> Self {
        let mut raw_value = None;
        let (tasks, load_outcome) = match slot.read(&key) {
            Ok(None) => {
                info!(key = %key, "No persisted tasks, starting empty");
                (Vec::new(), LoadOutcome::Fresh)
            }
            Ok(Some(raw)) => {
                let decoded = decode_snapshot(&key, &raw);
                raw_value = Some(raw);
                match decoded {
                    Ok(Decoded {
                        tasks,
                        skipped,
                        saved_at,
                    }) => {
                        info!(key = %key, count = tasks.len(), skipped, ?saved_at, "Restored tasks");
                        let count = tasks.len();
                        (tasks, LoadOutcome::Restored { count, skipped })
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "Persisted tasks are corrupted, starting empty");
                        (Vec::new(), LoadOutcome::Corrupted { error: e.to_string() })
                    }
                }
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read persisted tasks, starting empty");
                (Vec::new(), LoadOutcome::Unreadable { error: e.to_string() })
            }
        };

        let pending_backup = raw_value.filter(|_| load_outcome.lost_data());

        Self {
            slot,
            key,
            tasks: Snapshot::new(tasks),
            load_outcome,
            pending_backup,
            backup_key: None,
        }
    }

    /// Current tasks in display order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Shared handle to the current snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.tasks.clone()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn load_outcome(&self) -> &LoadOutcome {
        &self.load_outcome
    }

    /// Key holding the copy of a lossy load, once it has been written
    pub fn backup_key(&self) -> Option<&str> {
        self.backup_key.as_deref()
    }

    pub fn slot(&self) -> &S {
        &self.slot
    }

    /// Give back the slot, dropping the in-memory state
    pub fn into_slot(self) -> S {
        self.slot
    }

    /// Apply `action` and persist the result
    ///
    /// Returns whether the action matched anything. On
    /// [`StoreError::PersistenceWrite`] the in-memory snapshot already holds
    /// the mutation and stays that way.
    pub fn dispatch(&mut self, action: TaskAction) -> StoreResult<bool> {
        let kind = action.kind();
        let transition = reduce(&self.tasks, action);
        debug!(
            action = kind,
            matched = transition.matched,
            count = transition.tasks.len(),
            "dispatch: applied"
        );

        self.tasks = Snapshot::new(transition.tasks);
        self.persist()?;
        Ok(transition.matched)
    }

    pub fn add_task(&mut self, task: Task) -> StoreResult<()> {
        self.dispatch(TaskAction::Add(task)).map(|_| ())
    }

    pub fn edit_task(&mut self, id: &str, updates: TaskUpdate) -> StoreResult<bool> {
        self.dispatch(TaskAction::Edit {
            id: id.to_string(),
            updates,
        })
    }

    pub fn delete_task(&mut self, id: &str) -> StoreResult<bool> {
        self.dispatch(TaskAction::Delete(id.to_string()))
    }

    pub fn complete_task(&mut self, id: &str) -> StoreResult<bool> {
        self.dispatch(TaskAction::Complete(id.to_string()))
    }

    pub fn sync_task(&mut self, task: Task) -> StoreResult<()> {
        self.dispatch(TaskAction::Sync(task)).map(|_| ())
    }

    pub fn reorder_tasks(&mut self, source: usize, destination: usize) -> StoreResult<bool> {
        self.dispatch(TaskAction::Reorder { source, destination })
    }

    /// Post a task into the focus view
    ///
    /// Returns false without writing if the task is unknown or already in
    /// focus.
    pub fn send_to_focus(&mut self, id: &str) -> StoreResult<bool> {
        let task = match self.tasks.get(id) {
            Some(task) if !task.is_in_focus() => task.clone(),
            Some(_) => {
                debug!(id, "send_to_focus: already in focus");
                return Ok(false);
            }
            None => return Ok(false),
        };

        self.sync_task(Task {
            in_focus: Some(true),
            ..task
        })?;
        Ok(true)
    }

    // Full-collection write, retried once
    fn persist(&mut self) -> StoreResult<()> {
        self.write_backup()?;

        let encoded = encode_snapshot(&self.tasks)?;
        let key = self.key.clone();
        self.write_with_retry(&key, &encoded)?;

        debug!(key = %self.key, bytes = encoded.len(), "persist: written");
        Ok(())
    }

    // The original value must be safe before it is overwritten; if the copy
    // fails, the main key is left alone.
    fn write_backup(&mut self) -> StoreResult<()> {
        let Some(raw) = self.pending_backup.take() else {
            return Ok(());
        };

        let key = backup_key(&self.key, now_ms());
        if let Err(e) = self.write_with_retry(&key, &raw) {
            self.pending_backup = Some(raw);
            return Err(e);
        }

        warn!(key = %self.key, backup = %key, "Saved unreadable tasks before overwriting");
        self.backup_key = Some(key);
        Ok(())
    }

    fn write_with_retry(&mut self, key: &str, value: &str) -> StoreResult<()> {
        if let Err(first) = self.slot.write(key, value) {
            warn!(key, error = %first, "Write failed, retrying once");
            self.slot
                .write(key, value)
                .map_err(|source| StoreError::PersistenceWrite {
                    key: key.to_string(),
                    source,
                })?;
        }
        Ok(())
    }
}
