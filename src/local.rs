// TaskBackend over the local JSONL + SQLite store

use crate::backend::TaskBackend;
use crate::error::{RegistryError, Result};
use crate::store::Store;
use crate::task::{Task, TaskChanges};
use eyre::Context;
use std::path::Path;
use tracing::{debug, info};

pub struct LocalBackend {
    store: Store,
}

impl LocalBackend {
    /// Open the store under `data_dir`
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let store = Store::open(data_dir)
            .with_context(|| format!("Failed to open task store in {}", data_dir.display()))?;
        Ok(Self { store })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Rebuild the SQLite cache from the JSONL files
    pub fn sync(&mut self) -> Result<()> {
        self.store.sync()?;
        Ok(())
    }
}

impl TaskBackend for LocalBackend {
    fn get_all(&mut self) -> Result<Vec<Task>> {
        // Another process may have appended since we opened
        if self.store.is_stale()? {
            info!("Task file changed on disk, resyncing");
            self.store.sync()?;
        }
        Ok(self.store.list::<Task>()?)
    }

    fn insert(&mut self, task: &Task) -> Result<String> {
        Ok(self.store.create(task.clone())?)
    }

    fn update(&mut self, id: &str, changes: &TaskChanges) -> Result<()> {
        let mut task: Task = self.store.get(id)?.ok_or_else(|| RegistryError::not_found(id))?;
        task.apply(changes);
        self.store.update(task)?;
        debug!(id, "Task updated");
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        if !self.store.delete::<Task>(id)? {
            return Err(RegistryError::not_found(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::now_ms;
    use crate::task::{Branch, Recurrence};
    use chrono::{NaiveDate, Utc};
    use tempfile::TempDir;

    fn task(id: &str, title: &str) -> Task {
        Task {
            id: id.to_string(),
            title: title.to_string(),
            branch: Branch::Olives,
            assignee: Some("avi".to_string()),
            due_date: NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
            notes: "north grove".to_string(),
            recurring: Recurrence::Monthly,
            completed: false,
            completed_date: None,
            created_at: Utc::now(),
            updated_at: now_ms(),
        }
    }

    #[test]
    fn test_round_trip_through_store() {
        let temp = TempDir::new().unwrap();
        let mut backend = LocalBackend::open(temp.path()).unwrap();

        let original = task("t1", "Harvest olives");
        backend.insert(&original).unwrap();

        let all = backend.get_all().unwrap();
        assert_eq!(all, vec![original]);
    }

    #[test]
    fn test_update_applies_partial_changes() {
        let temp = TempDir::new().unwrap();
        let mut backend = LocalBackend::open(temp.path()).unwrap();
        backend.insert(&task("t1", "Harvest olives")).unwrap();

        let done_at = Utc::now();
        backend
            .update("t1", &TaskChanges::completion(true, Some(done_at), now_ms() + 1))
            .unwrap();

        let stored: Task = backend.store().get("t1").unwrap().unwrap();
        assert!(stored.completed);
        assert_eq!(stored.completed_date, Some(done_at));
        assert_eq!(stored.title, "Harvest olives");
    }

    #[test]
    fn test_missing_ids_are_not_found() {
        let temp = TempDir::new().unwrap();
        let mut backend = LocalBackend::open(temp.path()).unwrap();

        assert!(backend.update("ghost", &TaskChanges::default()).unwrap_err().is_not_found());
        assert!(backend.delete("ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_survives_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let mut backend = LocalBackend::open(temp.path()).unwrap();
            backend.insert(&task("t1", "Keep")).unwrap();
            backend.insert(&task("t2", "Remove")).unwrap();
            backend.delete("t2").unwrap();
        }

        let mut backend = LocalBackend::open(temp.path()).unwrap();
        backend.sync().unwrap();
        let titles: Vec<String> = backend.get_all().unwrap().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["Keep"]);
    }
}
