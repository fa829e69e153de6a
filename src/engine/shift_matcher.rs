use crate::database::models::Shift;
use crate::utils::time::combine_date_time_local;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};

/// Concrete start and end instants of a shift on a given date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ShiftWindow {
    pub fn for_date(shift: &Shift, date: NaiveDate, offset: FixedOffset) -> Self {
        let start = combine_date_time_local(date, shift.start_time, offset);
        let end_date = if shift.is_overnight() {
            date + Duration::days(1)
        } else {
            date
        };
        let end = combine_date_time_local(end_date, shift.end_time, offset);
        Self { start, end }
    }

    fn distance_to_start(&self, at: DateTime<Utc>) -> Duration {
        (at - self.start).abs()
    }

    fn distance_to_end(&self, at: DateTime<Utc>) -> Duration {
        (at - self.end).abs()
    }

    /// Distance from `at` to the nearer boundary.
    pub fn distance_to_nearest_boundary(&self, at: DateTime<Utc>) -> Duration {
        self.distance_to_start(at).min(self.distance_to_end(at))
    }

    /// Whether `at` is at least as close to the start as to the end. Ties count as start.
    pub fn is_close_to_start(&self, at: DateTime<Utc>) -> bool {
        self.distance_to_start(at) <= self.distance_to_end(at)
    }
}

/// Weekday index (0 = Monday) used to look up shifts for a date.
pub fn day_of_week(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_monday()
}

/// Picks the shift whose start or end is closest to the check-in.
///
/// On an exact tie with a back-to-back shift (the current best ends where the
/// candidate starts), the later shift wins when the check-out is after that
/// boundary. Returns `None` without a check-in or without candidates.
pub fn match_shift<'a>(
    candidates: &'a [Shift],
    date: NaiveDate,
    check_in: Option<DateTime<Utc>>,
    check_out: Option<DateTime<Utc>>,
    offset: FixedOffset,
) -> Option<&'a Shift> {
    let check_in = check_in?;
    let weekday = day_of_week(date);
    let mut best: Option<(&Shift, ShiftWindow, Duration)> = None;

    for shift in candidates.iter().filter(|s| s.day_of_week == weekday) {
        let window = ShiftWindow::for_date(shift, date, offset);
        let distance = window.distance_to_nearest_boundary(check_in);

        best = match best {
            None => Some((shift, window, distance)),
            Some((current, current_window, lowest)) => {
                if distance < lowest {
                    Some((shift, window, distance))
                } else if distance == lowest
                    && current.end_time == shift.start_time
                    && check_out.is_some_and(|out| out > current_window.end)
                {
                    Some((shift, window, distance))
                } else {
                    Some((current, current_window, lowest))
                }
            }
        };
    }

    best.map(|(shift, _, _)| shift)
}
