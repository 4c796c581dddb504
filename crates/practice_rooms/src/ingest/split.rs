//! Splitting of reservations that run past midnight into day-bounded slots.

use super::types::{ParsedTitle, TargetWindow, TimeSlot};
use chrono::{Days, NaiveDate};

/// Turns one booking on `date` into the slots that fall inside `window`.
///
/// A booking like `23-02` becomes `23-24` on `date` and `00-02` on the day
/// after; each half is kept only if its own date is in the window.
pub fn split_reservation(
    parsed: &ParsedTitle,
    date: NaiveDate,
    window: &TargetWindow,
) -> Vec<(NaiveDate, TimeSlot)> {
    let mut slots = Vec::with_capacity(2);

    if parsed.start_hour <= parsed.end_hour {
        if window.contains(date) {
            slots.push((
                date,
                TimeSlot {
                    start: parsed.start_hour,
                    end: parsed.end_hour,
                },
            ));
        }
        return slots;
    }

    if window.contains(date) {
        slots.push((
            date,
            TimeSlot {
                start: parsed.start_hour,
                end: 24,
            },
        ));
    }

    if let Some(next_day) = date.checked_add_days(Days::new(1)) {
        if window.contains(next_day) {
            slots.push((
                next_day,
                TimeSlot {
                    start: 0,
                    end: parsed.end_hour,
                },
            ));
        }
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn booking(start_hour: u8, end_hour: u8) -> ParsedTitle {
        ParsedTitle {
            student_id: "123".to_string(),
            student_name: "Jane Doe".to_string(),
            month: 6,
            day: 15,
            start_hour,
            end_hour,
        }
    }

    fn rendered(slots: Vec<(NaiveDate, TimeSlot)>) -> Vec<(NaiveDate, String)> {
        slots.into_iter().map(|(d, s)| (d, s.to_string())).collect()
    }

    #[test]
    fn same_day_booking_is_one_slot() {
        let window = TargetWindow::ending_on(ymd(2024, 3, 2)).unwrap();
        let slots = split_reservation(&booking(10, 12), ymd(2024, 3, 2), &window);
        assert_eq!(rendered(slots), vec![(ymd(2024, 3, 2), "10-12".to_string())]);
    }

    #[test]
    fn midnight_booking_splits_when_both_days_in_window() {
        let window = TargetWindow::ending_on(ymd(2024, 6, 16)).unwrap();
        let slots = split_reservation(&booking(23, 2), ymd(2024, 6, 15), &window);
        assert_eq!(
            rendered(slots),
            vec![
                (ymd(2024, 6, 15), "23-24".to_string()),
                (ymd(2024, 6, 16), "00-02".to_string()),
            ]
        );
    }

    #[test]
    fn midnight_booking_keeps_only_the_half_inside_the_window() {
        // Window is 6/14-6/15, so the 6/16 tail is dropped.
        let window = TargetWindow::ending_on(ymd(2024, 6, 15)).unwrap();
        let slots = split_reservation(&booking(23, 2), ymd(2024, 6, 15), &window);
        assert_eq!(rendered(slots), vec![(ymd(2024, 6, 15), "23-24".to_string())]);

        // Window is 6/16-6/17: only the tail survives.
        let window = TargetWindow::ending_on(ymd(2024, 6, 17)).unwrap();
        let slots = split_reservation(&booking(23, 2), ymd(2024, 6, 15), &window);
        assert_eq!(rendered(slots), vec![(ymd(2024, 6, 16), "00-02".to_string())]);
    }

    #[test]
    fn booking_outside_window_yields_nothing() {
        let window = TargetWindow::ending_on(ymd(2024, 6, 20)).unwrap();
        assert!(split_reservation(&booking(10, 12), ymd(2024, 6, 15), &window).is_empty());
        assert!(split_reservation(&booking(23, 2), ymd(2024, 6, 15), &window).is_empty());
    }

    #[test]
    fn split_crosses_year_end() {
        let window = TargetWindow::ending_on(ymd(2025, 1, 1)).unwrap();
        let slots = split_reservation(&booking(22, 1), ymd(2024, 12, 31), &window);
        assert_eq!(
            rendered(slots),
            vec![
                (ymd(2024, 12, 31), "22-24".to_string()),
                (ymd(2025, 1, 1), "00-01".to_string()),
            ]
        );
    }
}
