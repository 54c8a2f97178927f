// Plain-text export of the completion log

use crate::task::Task;
use chrono::{DateTime, NaiveDate, Utc};

pub const DEFAULT_EXPORT_PREFIX: &str = "meshek_log_";

const RULE_WIDTH: usize = 50;

/// Render completed tasks as a numbered text report.
///
/// Tasks are written in the order given; the caller filters and sorts.
pub fn render_report(tasks: &[&Task], generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();

    out.push_str("📋 Completed task log\n");
    out.push_str(&format!("{}\n", "=".repeat(RULE_WIDTH)));
    out.push('\n');
    out.push_str(&format!("Exported: {}\n", generated_at.format("%Y-%m-%d %H:%M UTC")));
    out.push_str(&format!("Total completed tasks: {}\n", tasks.len()));
    out.push('\n');
    out.push_str(&format!("{}\n", "-".repeat(RULE_WIDTH)));
    out.push('\n');

    for (index, task) in tasks.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", index + 1, task.title));
        out.push_str(&format!("   Branch: {}\n", task.branch.display_name()));
        out.push_str(&format!("   Due date: {}\n", format_date(task.due_date)));
        let completed = task
            .completed_date
            .map(|d| format_date(d.date_naive()))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!("   Completed on: {}\n", completed));
        if !task.notes.is_empty() {
            out.push_str(&format!("   Notes: {}\n", task.notes));
        }
        out.push('\n');
    }

    out
}

/// Suggested file name for an export made on `date`
pub fn export_filename(prefix: &str, date: NaiveDate) -> String {
    format!("{}{}.txt", prefix, date.format("%Y-%m-%d"))
}

/// Human date used in reports and listings, e.g. `5 Mar 2024`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%-d %b %Y").to_string()
}
