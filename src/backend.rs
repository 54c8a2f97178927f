// Persistence collaborator for the registry

use crate::error::{RegistryError, Result};
use crate::task::{Task, TaskChanges};
use eyre::eyre;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Invoked with no payload whenever the backing collection changes
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Storage the registry reads snapshots from and writes mutations to
pub trait TaskBackend {
    /// Full snapshot of the collection, in no particular order
    fn get_all(&mut self) -> Result<Vec<Task>>;

    fn insert(&mut self, task: &Task) -> Result<String>;

    /// Apply a partial update. Fails with NotFound if the id is missing.
    fn update(&mut self, id: &str, changes: &TaskChanges) -> Result<()>;

    /// Fails with NotFound if the id is missing
    fn delete(&mut self, id: &str) -> Result<()>;

    /// Register for change notifications. Returns false if unsupported.
    fn subscribe(&mut self, _on_change: ChangeCallback) -> bool {
        false
    }
}

#[derive(Default)]
struct Shared {
    docs: Vec<Task>,
    listeners: Vec<ChangeCallback>,
    unavailable: bool,
}

/// In-memory document collection shared by every clone of the handle
///
/// Each successful write notifies all subscribers, including those attached
/// through other handles, the way a remote document store pushes change events.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every operation fails with a persistence error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    pub fn len(&self) -> usize {
        self.lock().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        // A panic while holding the lock cannot leave `Shared` half-written
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write<F>(&self, op: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<Task>) -> Result<()>,
    {
        let listeners = {
            let mut shared = self.lock();
            if shared.unavailable {
                return Err(RegistryError::Persistence(eyre!("document store unavailable during {}", op)));
            }
            f(&mut shared.docs)?;
            shared.listeners.clone()
        };

        debug!(op, listeners = listeners.len(), "Notifying subscribers");
        // Called outside the lock so a callback may read the store
        for listener in listeners {
            listener();
        }
        Ok(())
    }
}

impl TaskBackend for MemoryBackend {
    fn get_all(&mut self) -> Result<Vec<Task>> {
        let shared = self.lock();
        if shared.unavailable {
            return Err(RegistryError::Persistence(eyre!("document store unavailable during get_all")));
        }
        Ok(shared.docs.clone())
    }

    fn insert(&mut self, task: &Task) -> Result<String> {
        self.write("insert", |docs| {
            if docs.iter().any(|t| t.id == task.id) {
                return Err(RegistryError::Persistence(eyre!("duplicate id {}", task.id)));
            }
            docs.push(task.clone());
            Ok(())
        })?;
        Ok(task.id.clone())
    }

    fn update(&mut self, id: &str, changes: &TaskChanges) -> Result<()> {
        self.write("update", |docs| {
            let task = docs
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| RegistryError::not_found(id))?;
            task.apply(changes);
            Ok(())
        })
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        self.write("delete", |docs| {
            let pos = docs
                .iter()
                .position(|t| t.id == id)
                .ok_or_else(|| RegistryError::not_found(id))?;
            docs.remove(pos);
            Ok(())
        })
    }

    fn subscribe(&mut self, on_change: ChangeCallback) -> bool {
        self.lock().listeners.push(on_change);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Branch, Recurrence};
    use chrono::{NaiveDate, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            title: "Irrigate".to_string(),
            branch: Branch::Avocado,
            assignee: None,
            due_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            notes: String::new(),
            recurring: Recurrence::None,
            completed: false,
            completed_date: None,
            created_at: Utc::now(),
            updated_at: 1,
        }
    }

    #[test]
    fn test_memory_crud() {
        let mut backend = MemoryBackend::new();
        assert_eq!(backend.insert(&task("a")).unwrap(), "a");
        backend.insert(&task("b")).unwrap();

        let changes = TaskChanges {
            title: Some("Irrigate north rows".to_string()),
            updated_at: 2,
            ..Default::default()
        };
        backend.update("a", &changes).unwrap();
        backend.delete("b").unwrap();

        let all = backend.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Irrigate north rows");
    }

    #[test]
    fn test_memory_missing_ids() {
        let mut backend = MemoryBackend::new();
        assert!(backend.update("nope", &TaskChanges::default()).unwrap_err().is_not_found());
        assert!(backend.delete("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_memory_rejects_duplicate_id() {
        let mut backend = MemoryBackend::new();
        backend.insert(&task("a")).unwrap();
        assert!(matches!(
            backend.insert(&task("a")),
            Err(RegistryError::Persistence(_))
        ));
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_clones_share_documents_and_notify() {
        let mut writer = MemoryBackend::new();
        let mut watcher = writer.clone();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        assert!(watcher.subscribe(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        writer.insert(&task("a")).unwrap();
        writer.delete("a").unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(watcher.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_unavailable_fails_without_notifying() {
        let mut backend = MemoryBackend::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        backend.subscribe(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        backend.set_unavailable(true);
        assert!(matches!(backend.insert(&task("a")), Err(RegistryError::Persistence(_))));
        assert!(backend.get_all().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        backend.set_unavailable(false);
        assert!(backend.is_empty());
    }
}
