// Due-date arithmetic for recurring tasks

use crate::task::Recurrence;
use chrono::{Days, Months, NaiveDate};

/// Advance a due date by one recurrence unit.
///
/// Monthly advances keep the day of month, clamped to the last day of a
/// shorter target month (Jan 31 -> Feb 28/29, Mar 31 -> Apr 30). Dates at the
/// edge of chrono's range are returned unchanged.
pub fn advance(date: NaiveDate, unit: Recurrence) -> NaiveDate {
    let next = match unit {
        Recurrence::None => return date,
        Recurrence::Daily => date.checked_add_days(Days::new(1)),
        Recurrence::Weekly => date.checked_add_days(Days::new(7)),
        Recurrence::Monthly => date.checked_add_months(Months::new(1)),
    };
    next.unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_daily_and_weekly() {
        assert_eq!(advance(ymd(2024, 2, 28), Recurrence::Daily), ymd(2024, 2, 29));
        assert_eq!(advance(ymd(2024, 12, 31), Recurrence::Daily), ymd(2025, 1, 1));
        assert_eq!(advance(ymd(2024, 3, 28), Recurrence::Weekly), ymd(2024, 4, 4));
    }

    #[test]
    fn test_monthly_keeps_day_of_month() {
        assert_eq!(advance(ymd(2024, 3, 15), Recurrence::Monthly), ymd(2024, 4, 15));
        assert_eq!(advance(ymd(2024, 12, 5), Recurrence::Monthly), ymd(2025, 1, 5));
    }

    #[test]
    fn test_monthly_clamps_month_end() {
        assert_eq!(advance(ymd(2024, 1, 31), Recurrence::Monthly), ymd(2024, 2, 29));
        assert_eq!(advance(ymd(2023, 1, 31), Recurrence::Monthly), ymd(2023, 2, 28));
        assert_eq!(advance(ymd(2024, 3, 31), Recurrence::Monthly), ymd(2024, 4, 30));
    }

    #[test]
    fn test_none_is_identity() {
        assert_eq!(advance(ymd(2024, 3, 15), Recurrence::None), ymd(2024, 3, 15));
    }

    #[test]
    fn test_range_edge_is_unchanged() {
        assert_eq!(advance(NaiveDate::MAX, Recurrence::Daily), NaiveDate::MAX);
    }
}
