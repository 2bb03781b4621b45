// Taskboard - reducer-backed task store with durable key-value persistence

pub mod action;
pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod slot;
pub mod store;

// Re-export main types for convenience
pub use action::{TaskAction, Transition, reduce};
pub use error::{StoreError, StoreResult};
pub use filter::{Criterion, TaskFilter};
pub use models::{FocusFields, Priority, Task, TaskStatus, TaskUpdate, new_task_id};
pub use slot::{FileSlot, KeyValueSlot, MemorySlot, SqliteSlot, now_ms};
pub use store::{LoadOutcome, Snapshot, TASKS_KEY, TaskStore};
