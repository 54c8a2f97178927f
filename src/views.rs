// Derived views over the task collection: urgency, month filter, counts

use crate::task::Task;
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;

/// Inclusive lookahead in days for the due-soon window
pub const DUE_SOON_DAYS: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Overdue,
    DueSoon,
    Normal,
}

/// Classify a task against the current date. Completed tasks are always `Normal`.
pub fn classify_urgency(task: &Task, today: NaiveDate) -> Urgency {
    if task.completed {
        return Urgency::Normal;
    }
    if task.due_date < today {
        return Urgency::Overdue;
    }
    let window_end = today.checked_add_days(Days::new(DUE_SOON_DAYS)).unwrap_or(NaiveDate::MAX);
    if task.due_date <= window_end {
        Urgency::DueSoon
    } else {
        Urgency::Normal
    }
}

/// Calendar month filter for the completion log, written `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(ts: &DateTime<Utc>) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
        }
    }

    /// True when the timestamp falls within this month (UTC)
    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        Self::of(ts) == *self
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid month '{}' (expected YYYY-MM)", s);
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        YearMonth::new(year, month).ok_or_else(invalid)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Aggregate counts over the full collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

impl Stats {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let completed = tasks.iter().filter(|t| t.completed).count();
        Self {
            total: tasks.len(),
            active: tasks.len() - completed,
            completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Branch, Recurrence};

    fn task_due(due_date: NaiveDate) -> Task {
        Task {
            id: "t".to_string(),
            title: "Check fences".to_string(),
            branch: Branch::Dir,
            assignee: None,
            due_date,
            notes: String::new(),
            recurring: Recurrence::None,
            completed: false,
            completed_date: None,
            created_at: Utc::now(),
            updated_at: 0,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn test_overdue_due_soon_normal() {
        let t = today();
        assert_eq!(classify_urgency(&task_due(t - Days::new(1)), t), Urgency::Overdue);
        assert_eq!(classify_urgency(&task_due(t + Days::new(1)), t), Urgency::DueSoon);
        assert_eq!(classify_urgency(&task_due(t + Days::new(10)), t), Urgency::Normal);
    }

    #[test]
    fn test_due_soon_window_is_inclusive() {
        let t = today();
        assert_eq!(classify_urgency(&task_due(t), t), Urgency::DueSoon);
        assert_eq!(classify_urgency(&task_due(t + Days::new(2)), t), Urgency::DueSoon);
        assert_eq!(classify_urgency(&task_due(t + Days::new(3)), t), Urgency::Normal);
    }

    #[test]
    fn test_completed_is_never_urgent() {
        let t = today();
        let mut task = task_due(t - Days::new(5));
        task.completed = true;
        task.completed_date = Some(Utc::now());
        assert_eq!(classify_urgency(&task, t), Urgency::Normal);
    }

    #[test]
    fn test_year_month_parse() {
        let ym: YearMonth = "2024-03".parse().unwrap();
        assert_eq!(ym, YearMonth { year: 2024, month: 3 });
        assert_eq!(ym.to_string(), "2024-03");
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert!("2024-3".parse::<YearMonth>().is_err());
        assert!("March".parse::<YearMonth>().is_err());
    }

    #[test]
    fn test_year_month_boundaries() {
        let ym: YearMonth = "2024-03".parse().unwrap();
        let ts = |s: &str| DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc);
        assert!(ym.contains(&ts("2024-03-01T00:00:00Z")));
        assert!(ym.contains(&ts("2024-03-31T23:59:59Z")));
        assert!(!ym.contains(&ts("2024-02-29T23:59:59Z")));
        assert!(!ym.contains(&ts("2024-04-01T00:00:00Z")));
    }

    #[test]
    fn test_stats_from_tasks() {
        let mut done = task_due(today());
        done.completed = true;
        let tasks = vec![task_due(today()), done, task_due(today())];
        assert_eq!(
            Stats::from_tasks(&tasks),
            Stats {
                total: 3,
                active: 2,
                completed: 1
            }
        );
        assert_eq!(Stats::from_tasks(&[]), Stats::default());
    }
}
