// Task registry: owns the cached collection and every mutation path

use crate::backend::TaskBackend;
use crate::error::{RegistryError, Result};
use crate::recurrence::advance;
use crate::task::{Branch, NewTask, Task, TaskChanges, TaskEdit, validate_assignee, validate_branch, validate_title};
use crate::views::{Stats, Urgency, YearMonth, classify_urgency};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Source of the current time
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone)]
pub struct RegistryOptions {
    /// Reject tasks without an assignee
    pub require_assignee: bool,
    pub clock: Clock,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            require_assignee: false,
            clock: Arc::new(Utc::now),
        }
    }
}

impl RegistryOptions {
    pub fn require_assignee(mut self, required: bool) -> Self {
        self.require_assignee = required;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

/// Emitted to observers after each successful mutation or reload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Created(String),
    Updated(String),
    Deleted(String),
    Reloaded,
}

/// Result of a completion toggle
#[derive(Debug, Clone, PartialEq)]
pub struct Toggled {
    pub task: Task,
    /// Next occurrence created when a recurring task was completed
    pub successor: Option<Task>,
}

type Observer = Box<dyn FnMut(&Change)>;

pub struct Registry<B: TaskBackend> {
    backend: B,
    /// Most recently created first
    tasks: Vec<Task>,
    options: RegistryOptions,
    observers: Vec<Observer>,
    external_change: Arc<AtomicBool>,
    watching: bool,
}

impl<B: TaskBackend> Registry<B> {
    /// Load the full snapshot from `backend` and watch it for external changes
    pub fn open(mut backend: B, options: RegistryOptions) -> Result<Self> {
        let external_change = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&external_change);
        let watching = backend.subscribe(Arc::new(move || flag.store(true, Ordering::SeqCst)));

        let tasks = Self::snapshot(&mut backend)?;
        external_change.store(false, Ordering::SeqCst);
        info!(count = tasks.len(), watching, "Registry loaded");

        Ok(Self {
            backend,
            tasks,
            options,
            observers: Vec::new(),
            external_change,
            watching,
        })
    }

    fn snapshot(backend: &mut B) -> Result<Vec<Task>> {
        let mut tasks = backend.get_all()?;
        // v7 ids order creations that share a timestamp
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(tasks)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Whether the backend pushes change notifications
    pub fn is_watching(&self) -> bool {
        self.watching
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.options.clock)()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    // ========================================================================
    // Observers and refresh
    // ========================================================================

    /// Register an observer called after every successful change
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&Change) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    fn emit(&mut self, change: Change) {
        debug!(?change, "Emitting change");
        for observer in &mut self.observers {
            observer(&change);
        }
    }

    /// Replace the cache with a fresh snapshot. The cache is untouched on failure.
    pub fn reload(&mut self) -> Result<()> {
        let pending = self.external_change.swap(false, Ordering::SeqCst);
        match Self::snapshot(&mut self.backend) {
            Ok(tasks) => {
                debug!(count = tasks.len(), "Reloaded snapshot");
                self.tasks = tasks;
                self.emit(Change::Reloaded);
                Ok(())
            }
            Err(e) => {
                if pending {
                    self.external_change.store(true, Ordering::SeqCst);
                }
                Err(e)
            }
        }
    }

    /// Reload once if any external change notifications arrived since the last reload
    pub fn poll_changes(&mut self) -> Result<bool> {
        if !self.external_change.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.reload()?;
        Ok(true)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub fn create(&mut self, new: NewTask) -> Result<Task> {
        let title = validate_title(&new.title)?;
        validate_branch(&new.branch)?;
        let assignee = validate_assignee(new.assignee.as_deref(), self.options.require_assignee)?;

        let now = self.now();
        let task = Task {
            id: self.fresh_id(),
            title,
            branch: new.branch,
            assignee,
            due_date: new.due_date,
            notes: new.notes.trim().to_string(),
            recurring: new.recurring,
            completed: false,
            completed_date: None,
            created_at: now,
            updated_at: now.timestamp_millis(),
        };

        self.backend.insert(&task)?;
        info!(id = %task.id, branch = task.branch.code(), due = %task.due_date, "Task created");

        self.tasks.insert(0, task.clone());
        self.emit(Change::Created(task.id.clone()));
        Ok(task)
    }

    /// Flip completion. Completing a recurring task also creates its next occurrence.
    pub fn toggle(&mut self, id: &str) -> Result<Toggled> {
        let idx = self.position(id)?;
        let current = self.tasks[idx].clone();
        let completing = !current.completed;
        let now = self.now();

        let changes = TaskChanges::completion(completing, completing.then_some(now), self.next_version(&current));
        let successor = (completing && current.recurring.is_recurring()).then(|| self.successor_of(&current, now));

        self.backend.update(id, &changes)?;

        if let Some(next) = &successor {
            if let Err(e) = self.backend.insert(next) {
                let revert = TaskChanges::completion(current.completed, current.completed_date, changes.updated_at + 1);
                match self.backend.update(id, &revert) {
                    Ok(()) => self.tasks[idx].updated_at = revert.updated_at,
                    Err(revert_err) => {
                        warn!(id, error = %revert_err, "Failed to revert completion after successor insert failed");
                        self.tasks[idx].updated_at = changes.updated_at;
                    }
                }
                return Err(e);
            }
        }

        self.tasks[idx].apply(&changes);
        let task = self.tasks[idx].clone();
        info!(id, completed = task.completed, "Task toggled");
        self.emit(Change::Updated(task.id.clone()));

        if let Some(next) = &successor {
            info!(id = %next.id, due = %next.due_date, recurring = %next.recurring, "Scheduled next occurrence");
            self.tasks.insert(0, next.clone());
            self.emit(Change::Created(next.id.clone()));
        }

        Ok(Toggled { task, successor })
    }

    /// Update descriptive fields. Completion state, id and creation time are untouched.
    pub fn edit(&mut self, id: &str, edit: TaskEdit) -> Result<Task> {
        let idx = self.position(id)?;
        if edit.is_empty() {
            return Ok(self.tasks[idx].clone());
        }

        let mut changes = TaskChanges {
            updated_at: self.next_version(&self.tasks[idx]),
            ..Default::default()
        };
        if let Some(title) = &edit.title {
            changes.title = Some(validate_title(title)?);
        }
        if let Some(branch) = edit.branch {
            validate_branch(&branch)?;
            changes.branch = Some(branch);
        }
        if let Some(assignee) = &edit.assignee {
            changes.assignee = Some(validate_assignee(assignee.as_deref(), self.options.require_assignee)?);
        }
        changes.due_date = edit.due_date;
        changes.notes = edit.notes.map(|n| n.trim().to_string());
        changes.recurring = edit.recurring;

        self.backend.update(id, &changes)?;

        self.tasks[idx].apply(&changes);
        info!(id, "Task edited");
        self.emit(Change::Updated(id.to_string()));
        Ok(self.tasks[idx].clone())
    }

    /// Force a task back to active. Restoring an active task writes nothing.
    pub fn restore(&mut self, id: &str) -> Result<Task> {
        let idx = self.position(id)?;
        let current = &self.tasks[idx];
        if !current.completed && current.completed_date.is_none() {
            return Ok(current.clone());
        }

        let changes = TaskChanges::completion(false, None, self.next_version(current));
        self.backend.update(id, &changes)?;

        self.tasks[idx].apply(&changes);
        info!(id, "Task restored");
        self.emit(Change::Updated(id.to_string()));
        Ok(self.tasks[idx].clone())
    }

    pub fn delete(&mut self, id: &str) -> Result<()> {
        self.backend.delete(id)?;

        if let Some(idx) = self.tasks.iter().position(|t| t.id == id) {
            self.tasks.remove(idx);
        }
        info!(id, "Task deleted");
        self.emit(Change::Deleted(id.to_string()));
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// All tasks, most recently created first
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Open tasks, earliest due first; equal due dates keep creation order
    pub fn list_active(&self, branch: Option<&Branch>) -> Vec<&Task> {
        let mut active: Vec<&Task> = self
            .tasks
            .iter()
            .rev()
            .filter(|t| !t.completed)
            .filter(|t| branch.is_none_or(|b| &t.branch == b))
            .collect();
        active.sort_by_key(|t| t.due_date);
        active
    }

    /// Completed tasks, most recently completed first
    pub fn list_completed(&self, branch: Option<&Branch>, month: Option<YearMonth>) -> Vec<&Task> {
        let mut completed: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| t.completed)
            .filter(|t| branch.is_none_or(|b| &t.branch == b))
            .filter(|t| month.is_none_or(|m| t.completed_date.is_some_and(|d| m.contains(&d))))
            .collect();
        completed.sort_by(|a, b| b.completed_date.cmp(&a.completed_date));
        completed
    }

    pub fn stats(&self) -> Stats {
        Stats::from_tasks(&self.tasks)
    }

    pub fn urgency(&self, task: &Task) -> Urgency {
        classify_urgency(task, self.today())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn position(&self, id: &str) -> Result<usize> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| RegistryError::not_found(id))
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = Uuid::now_v7().to_string();
            if self.get(&id).is_none() {
                return id;
            }
        }
    }

    /// Strictly increasing per record so the latest write wins on load
    fn next_version(&self, task: &Task) -> i64 {
        self.now().timestamp_millis().max(task.updated_at + 1)
    }

    fn successor_of(&self, task: &Task, now: DateTime<Utc>) -> Task {
        Task {
            id: self.fresh_id(),
            title: task.title.clone(),
            branch: task.branch.clone(),
            assignee: task.assignee.clone(),
            due_date: advance(task.due_date, task.recurring),
            notes: task.notes.clone(),
            recurring: task.recurring,
            completed: false,
            completed_date: None,
            created_at: now,
            updated_at: now.timestamp_millis(),
        }
    }
}
