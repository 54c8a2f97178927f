// Deep link into a third-party calendar for a single task

use crate::task::Task;
use chrono::Days;
use urlencoding::encode;

const GOOGLE_CALENDAR_BASE: &str = "https://calendar.google.com/calendar/render?action=TEMPLATE";

/// Google Calendar "create event" link for the task as an all-day event on its due date
pub fn calendar_link(task: &Task) -> String {
    let start = task.due_date;
    // All-day events use an exclusive end date
    let end = start.checked_add_days(Days::new(1)).unwrap_or(start);

    let mut details = task.branch.display_name().to_string();
    if !task.notes.is_empty() {
        details.push('\n');
        details.push_str(&task.notes);
    }

    format!(
        "{}&text={}&details={}&dates={}/{}",
        GOOGLE_CALENDAR_BASE,
        encode(&task.title),
        encode(&details),
        start.format("%Y%m%d"),
        end.format("%Y%m%d"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Branch, Recurrence};
    use chrono::{NaiveDate, Utc};

    fn task(title: &str, notes: &str, due: NaiveDate) -> Task {
        Task {
            id: "t1".to_string(),
            title: title.to_string(),
            branch: Branch::Solar,
            assignee: None,
            due_date: due,
            notes: notes.to_string(),
            recurring: Recurrence::None,
            completed: false,
            completed_date: None,
            created_at: Utc::now(),
            updated_at: 0,
        }
    }

    #[test]
    fn test_link_encodes_title_and_dates() {
        let link = calendar_link(&task("Clean panels & inverter", "", NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()));
        assert!(link.starts_with(GOOGLE_CALENDAR_BASE));
        assert!(link.contains("&text=Clean%20panels%20%26%20inverter"));
        assert!(link.ends_with("&dates=20240331/20240401"));
    }

    #[test]
    fn test_details_include_notes_when_present() {
        let due = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let without = calendar_link(&task("Wash", "", due));
        let with = calendar_link(&task("Wash", "soft brush", due));

        let branch = encode(Branch::Solar.display_name()).into_owned();
        assert!(without.contains(&format!("&details={}&", branch)));
        assert!(with.contains(&format!("&details={}%0Asoft%20brush&", branch)));
    }
}
