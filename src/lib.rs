// Meshek - recurring farm-operation task tracker over a JSONL+SQLite store

pub mod backend;
pub mod calendar;
pub mod config;
pub mod error;
pub mod jsonl;
pub mod local;
pub mod record;
pub mod recurrence;
pub mod registry;
pub mod report;
pub mod store;
pub mod task;
pub mod views;

// Re-export main types for convenience
pub use backend::{ChangeCallback, MemoryBackend, TaskBackend};
pub use calendar::calendar_link;
pub use config::Config;
pub use error::{RegistryError, Result};
pub use local::LocalBackend;
pub use record::Record;
pub use recurrence::advance;
pub use registry::{Change, Clock, Registry, RegistryOptions, Toggled};
pub use report::{export_filename, render_report};
pub use store::{Store, now_ms};
pub use task::{Branch, NewTask, Recurrence, Task, TaskChanges, TaskEdit};
pub use views::{DUE_SOON_DAYS, Stats, Urgency, YearMonth, classify_urgency};
