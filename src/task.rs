// Task record and the value types it is built from

use crate::error::{RegistryError, Result};
use crate::record::Record;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Operational area of the farm a task belongs to
///
/// Codes outside the known set survive a load as `Unknown` and are shown
/// with their raw code as the label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Branch {
    Solar,
    Dir,
    Lychee,
    Olives,
    Avocado,
    Unknown(String),
}

impl Branch {
    pub const KNOWN: [Branch; 5] = [
        Branch::Solar,
        Branch::Dir,
        Branch::Lychee,
        Branch::Olives,
        Branch::Avocado,
    ];

    pub fn code(&self) -> &str {
        match self {
            Branch::Solar => "solar",
            Branch::Dir => "dir",
            Branch::Lychee => "lychee",
            Branch::Olives => "olives",
            Branch::Avocado => "avocado",
            Branch::Unknown(raw) => raw,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Branch::Solar => "☀️ Solar systems",
            Branch::Dir => "🐑 Sheep pen",
            Branch::Lychee => "🍒 Lychee",
            Branch::Olives => "🫒 Olives",
            Branch::Avocado => "🥑 Avocado",
            Branch::Unknown(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Branch::Unknown(_))
    }
}

impl From<&str> for Branch {
    fn from(code: &str) -> Self {
        match code.trim() {
            "solar" => Branch::Solar,
            "dir" => Branch::Dir,
            "lychee" => Branch::Lychee,
            "olives" => Branch::Olives,
            "avocado" => Branch::Avocado,
            other => Branch::Unknown(other.to_string()),
        }
    }
}

impl From<String> for Branch {
    fn from(code: String) -> Self {
        Branch::from(code.as_str())
    }
}

impl From<Branch> for String {
    fn from(branch: Branch) -> Self {
        branch.code().to_string()
    }
}

impl FromStr for Branch {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let branch = Branch::from(s);
        if branch.is_known() {
            Ok(branch)
        } else {
            let codes: Vec<&str> = Branch::KNOWN.iter().map(|b| b.code()).collect();
            Err(format!("unknown branch '{}' (expected one of: {})", s, codes.join(", ")))
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Cadence at which a completed task spawns its successor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::None => "none",
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
        }
    }

    pub fn is_recurring(&self) -> bool {
        *self != Recurrence::None
    }
}

impl FromStr for Recurrence {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "" | "none" => Ok(Recurrence::None),
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            other => Err(format!(
                "unknown recurrence '{}' (expected none, daily, weekly or monthly)",
                other
            )),
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A farm-operation task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub branch: Branch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub recurring: Recurrence,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Milliseconds since epoch of the last write
    pub updated_at: i64,
}

impl Task {
    /// Apply a partial update in place. `id` and `created_at` are never touched.
    pub fn apply(&mut self, changes: &TaskChanges) {
        if let Some(title) = &changes.title {
            self.title = title.clone();
        }
        if let Some(branch) = &changes.branch {
            self.branch = branch.clone();
        }
        if let Some(assignee) = &changes.assignee {
            self.assignee = assignee.clone();
        }
        if let Some(due_date) = changes.due_date {
            self.due_date = due_date;
        }
        if let Some(notes) = &changes.notes {
            self.notes = notes.clone();
        }
        if let Some(recurring) = changes.recurring {
            self.recurring = recurring;
        }
        if let Some(completed) = changes.completed {
            self.completed = completed;
        }
        if let Some(completed_date) = changes.completed_date {
            self.completed_date = completed_date;
        }
        self.updated_at = changes.updated_at;
    }

    /// Label for the assignee, falling back to the raw code
    pub fn assignee_label<'a>(&'a self, names: &'a BTreeMap<String, String>) -> Option<&'a str> {
        self.assignee
            .as_deref()
            .map(|code| names.get(code).map(String::as_str).unwrap_or(code))
    }
}

impl Record for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "tasks"
    }
}

/// Input for creating a task
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub branch: Branch,
    pub assignee: Option<String>,
    pub due_date: NaiveDate,
    pub notes: String,
    pub recurring: Recurrence,
}

impl NewTask {
    pub fn new(title: impl Into<String>, branch: Branch, due_date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            branch,
            assignee: None,
            due_date,
            notes: String::new(),
            recurring: Recurrence::None,
        }
    }

    pub fn assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn recurring(mut self, recurring: Recurrence) -> Self {
        self.recurring = recurring;
        self
    }
}

/// User-facing edit of a task's descriptive fields. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskEdit {
    pub title: Option<String>,
    pub branch: Option<Branch>,
    /// `Some(None)` clears the assignee
    pub assignee: Option<Option<String>>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub recurring: Option<Recurrence>,
}

impl TaskEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.branch.is_none()
            && self.assignee.is_none()
            && self.due_date.is_none()
            && self.notes.is_none()
            && self.recurring.is_none()
    }
}

/// Partial field update handed to a backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<Branch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring: Option<Recurrence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<Option<DateTime<Utc>>>,
    pub updated_at: i64,
}

impl TaskChanges {
    pub fn completion(completed: bool, completed_date: Option<DateTime<Utc>>, updated_at: i64) -> Self {
        Self {
            completed: Some(completed),
            completed_date: Some(completed_date),
            updated_at,
            ..Default::default()
        }
    }
}

pub(crate) fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(RegistryError::validation("title is required"));
    }
    Ok(title.to_string())
}

pub(crate) fn validate_branch(branch: &Branch) -> Result<()> {
    match branch {
        Branch::Unknown(raw) if raw.trim().is_empty() => Err(RegistryError::validation("branch is required")),
        Branch::Unknown(raw) => Err(RegistryError::validation(format!("unknown branch '{}'", raw))),
        _ => Ok(()),
    }
}

/// Normalizes an assignee, treating blank input as absent
pub(crate) fn validate_assignee(assignee: Option<&str>, required: bool) -> Result<Option<String>> {
    let assignee = assignee.map(str::trim).filter(|a| !a.is_empty());
    if required && assignee.is_none() {
        return Err(RegistryError::validation("assignee is required"));
    }
    Ok(assignee.map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task {
            id: "t1".to_string(),
            title: "Clean panels".to_string(),
            branch: Branch::Solar,
            assignee: None,
            due_date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            notes: String::new(),
            recurring: Recurrence::Weekly,
            completed: false,
            completed_date: None,
            created_at: DateTime::parse_from_rfc3339("2024-03-01T08:00:00Z").unwrap().with_timezone(&Utc),
            updated_at: 1000,
        }
    }

    #[test]
    fn test_branch_codes_and_labels() {
        for branch in Branch::KNOWN {
            assert_eq!(Branch::from(branch.code()), branch);
            assert!(branch.is_known());
        }
        assert_eq!(Branch::Dir.display_name(), "🐑 Sheep pen");
    }

    #[test]
    fn test_unknown_branch_falls_back_to_raw_code() {
        let branch = Branch::from("vineyard");
        assert_eq!(branch, Branch::Unknown("vineyard".to_string()));
        assert_eq!(branch.display_name(), "vineyard");
        assert!("vineyard".parse::<Branch>().is_err());
    }

    #[test]
    fn test_task_serialization_keeps_unknown_branch() {
        let json = r#"{"id":"x","title":"Prune","branch":"vineyard","due_date":"2024-03-10",
            "created_at":"2024-03-01T08:00:00Z","updated_at":1}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.branch.display_name(), "vineyard");
        assert_eq!(task.recurring, Recurrence::None);
        assert!(!task.completed);
        assert!(task.completed_date.is_none());

        let back = serde_json::to_string(&task).unwrap();
        assert!(back.contains("\"branch\":\"vineyard\""));
        assert!(back.contains("\"due_date\":\"2024-03-10\""));
    }

    #[test]
    fn test_recurrence_parse() {
        assert_eq!("weekly".parse::<Recurrence>().unwrap(), Recurrence::Weekly);
        assert_eq!("".parse::<Recurrence>().unwrap(), Recurrence::None);
        assert!("yearly".parse::<Recurrence>().is_err());
        assert_eq!(serde_json::to_string(&Recurrence::Monthly).unwrap(), "\"monthly\"");
    }

    #[test]
    fn test_apply_changes_preserves_identity() {
        let mut task = sample_task();
        let changes = TaskChanges {
            title: Some("Wash panels".to_string()),
            notes: Some("use soft brush".to_string()),
            updated_at: 2000,
            ..Default::default()
        };
        task.apply(&changes);
        assert_eq!(task.title, "Wash panels");
        assert_eq!(task.notes, "use soft brush");
        assert_eq!(task.id, "t1");
        assert_eq!(task.updated_at, 2000);
        assert_eq!(task.branch, Branch::Solar);
    }

    #[test]
    fn test_assignee_label_fallback() {
        let mut names = BTreeMap::new();
        names.insert("avi".to_string(), "Avi Klein".to_string());

        let mut task = sample_task();
        assert_eq!(task.assignee_label(&names), None);
        task.assignee = Some("avi".to_string());
        assert_eq!(task.assignee_label(&names), Some("Avi Klein"));
        task.assignee = Some("dana".to_string());
        assert_eq!(task.assignee_label(&names), Some("dana"));
    }

    #[test]
    fn test_validation_helpers() {
        assert_eq!(validate_title("  Feed sheep ").unwrap(), "Feed sheep");
        assert!(validate_title("   ").is_err());
        assert!(validate_branch(&Branch::Olives).is_ok());
        assert!(validate_branch(&Branch::from("")).is_err());
        assert!(validate_branch(&Branch::from("vineyard")).is_err());
        assert_eq!(validate_assignee(Some("  "), false).unwrap(), None);
        assert!(validate_assignee(None, true).is_err());
        assert_eq!(validate_assignee(Some("avi"), true).unwrap().as_deref(), Some("avi"));
    }
}
