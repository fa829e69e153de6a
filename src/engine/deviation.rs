use crate::config::DeviationSettings;
use crate::database::models::DeviationState;
use crate::engine::shift_matcher::ShiftWindow;
use crate::utils::time::duration_hours;
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deviation {
    /// Hours beyond the shift boundary; zero when within tolerance.
    pub hours: f64,
    pub state: Option<DeviationState>,
}

impl Deviation {
    pub const NONE: Deviation = Deviation {
        hours: 0.0,
        state: None,
    };

    pub fn is_flagged(&self) -> bool {
        self.state == Some(DeviationState::Flagged)
    }
}

/// Applies the tolerance to a raw deviation. An approved state is kept as is.
pub fn evaluate(raw: Duration, allowed_minutes: i64, previous: Option<DeviationState>) -> Deviation {
    let raw = raw.max(Duration::zero());
    let exceeded = raw > Duration::minutes(allowed_minutes);
    let hours = if exceeded { duration_hours(raw) } else { 0.0 };

    let state = match previous {
        Some(DeviationState::Approved) => Some(DeviationState::Approved),
        _ if exceeded => Some(DeviationState::Flagged),
        _ => None,
    };

    Deviation { hours, state }
}

pub fn late_arrival(
    window: &ShiftWindow,
    check_in: Option<DateTime<Utc>>,
    settings: &DeviationSettings,
    previous: Option<DeviationState>,
) -> Deviation {
    let raw = check_in.map(|ci| ci - window.start).unwrap_or_else(Duration::zero);
    evaluate(raw, settings.allowed_late_minutes, previous)
}

pub fn early_departure(
    window: &ShiftWindow,
    check_out: Option<DateTime<Utc>>,
    settings: &DeviationSettings,
    previous: Option<DeviationState>,
) -> Deviation {
    let raw = check_out.map(|co| window.end - co).unwrap_or_else(Duration::zero);
    evaluate(raw, settings.allowed_early_minutes, previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::combine_date_time_local;
    use chrono::{FixedOffset, NaiveDate, NaiveTime};

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        combine_date_time_local(
            NaiveDate::from_ymd_opt(2025, 7, 28).unwrap(),
            NaiveTime::from_hms_opt(h, m, 0).unwrap(),
            offset(),
        )
    }

    fn nine_to_five() -> ShiftWindow {
        ShiftWindow {
            start: at(9, 0),
            end: at(17, 0),
        }
    }

    #[test]
    fn late_beyond_tolerance_is_flagged() {
        let late = late_arrival(&nine_to_five(), Some(at(9, 45)), &DeviationSettings::default(), None);
        assert_eq!(late.hours, 0.75);
        assert_eq!(late.state, Some(DeviationState::Flagged));
    }

    #[test]
    fn late_within_tolerance_is_zero() {
        let late = late_arrival(&nine_to_five(), Some(at(9, 20)), &DeviationSettings::default(), None);
        assert_eq!(late, Deviation::NONE);

        let on_limit = late_arrival(&nine_to_five(), Some(at(9, 30)), &DeviationSettings::default(), None);
        assert_eq!(on_limit, Deviation::NONE);
    }

    #[test]
    fn early_arrival_never_goes_negative() {
        let late = late_arrival(&nine_to_five(), Some(at(7, 0)), &DeviationSettings::default(), None);
        assert_eq!(late.hours, 0.0);
        let early = early_departure(&nine_to_five(), Some(at(19, 0)), &DeviationSettings::default(), None);
        assert_eq!(early.hours, 0.0);
    }

    #[test]
    fn early_departure_uses_its_own_tolerance() {
        let settings = DeviationSettings::default();
        let early = early_departure(&nine_to_five(), Some(at(16, 44)), &settings, None);
        assert!(early.is_flagged());
        assert!((early.hours - 16.0 / 60.0).abs() < 1e-9);

        let within = early_departure(&nine_to_five(), Some(at(16, 45)), &settings, None);
        assert_eq!(within, Deviation::NONE);
    }

    #[test]
    fn approval_is_sticky() {
        let settings = DeviationSettings::default();
        let late = late_arrival(&nine_to_five(), Some(at(10, 0)), &settings, Some(DeviationState::Approved));
        assert_eq!(late.state, Some(DeviationState::Approved));
        assert_eq!(late.hours, 1.0);

        let now_on_time = late_arrival(&nine_to_five(), Some(at(9, 0)), &settings, Some(DeviationState::Approved));
        assert_eq!(now_on_time.state, Some(DeviationState::Approved));
        assert_eq!(now_on_time.hours, 0.0);
    }

    #[test]
    fn flag_clears_when_deviation_disappears() {
        let settings = DeviationSettings::default();
        let late = late_arrival(&nine_to_five(), Some(at(9, 10)), &settings, Some(DeviationState::Flagged));
        assert_eq!(late, Deviation::NONE);
    }

    #[test]
    fn missing_punch_has_no_deviation() {
        let settings = DeviationSettings::default();
        assert_eq!(late_arrival(&nine_to_five(), None, &settings, None), Deviation::NONE);
        assert_eq!(early_departure(&nine_to_five(), None, &settings, None), Deviation::NONE);
    }
}
