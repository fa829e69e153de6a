use crate::config::DeviationSettings;
use crate::database::models::{Punch, PunchMode};
use crate::engine::shift_matcher::ShiftWindow;
use chrono::{DateTime, Duration, Utc};

/// A check-in or check-out boundary together with where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub at: DateTime<Utc>,
    pub mode: PunchMode,
}

impl Boundary {
    pub fn technical(at: DateTime<Utc>) -> Self {
        Self {
            at,
            mode: PunchMode::Technical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DayBounds {
    pub check_in: Option<Boundary>,
    pub check_out: Option<Boundary>,
}

impl DayBounds {
    pub fn check_in_at(&self) -> Option<DateTime<Utc>> {
        self.check_in.map(|b| b.at)
    }

    pub fn check_out_at(&self) -> Option<DateTime<Utc>> {
        self.check_out.map(|b| b.at)
    }
}

/// Earliest punch becomes the check-in, latest the check-out.
///
/// A lone punch is both. Technical punches are ignored since they were
/// produced by an earlier reconciliation.
pub fn raw_bounds(punches: &[Punch]) -> DayBounds {
    let mut relevant = punches.iter().filter(|p| p.mode != PunchMode::Technical);
    let Some(first) = relevant.next() else {
        return DayBounds::default();
    };

    let mut earliest = first;
    let mut latest = first;
    for punch in relevant {
        if punch.punched_at < earliest.punched_at {
            earliest = punch;
        }
        if punch.punched_at >= latest.punched_at {
            latest = punch;
        }
    }

    DayBounds {
        check_in: Some(Boundary {
            at: earliest.punched_at,
            mode: earliest.mode,
        }),
        check_out: Some(Boundary {
            at: latest.punched_at,
            mode: latest.mode,
        }),
    }
}

/// Replaces one side of a day whose punches are too close together to be a session.
///
/// When the check-in is at least as close to the shift start as to its end it
/// is kept and the check-out becomes `end - (early tolerance + 1 min)`;
/// otherwise the check-out is kept and the check-in becomes
/// `start + (late tolerance + 1 min)`. Either way the synthesized side lands
/// one minute past tolerance so the day is penalised instead of left open.
pub fn resolve(bounds: DayBounds, window: Option<&ShiftWindow>, settings: &DeviationSettings) -> DayBounds {
    let (Some(window), Some(check_in), Some(check_out)) = (window, bounds.check_in, bounds.check_out)
    else {
        return bounds;
    };

    if (check_out.at - check_in.at).abs() >= Duration::minutes(settings.min_session_minutes) {
        return bounds;
    }

    if window.is_close_to_start(check_in.at) {
        let synthesized = window.end - Duration::minutes(settings.allowed_early_minutes + 1);
        DayBounds {
            check_in: Some(check_in),
            check_out: Some(Boundary::technical(synthesized.max(check_in.at))),
        }
    } else {
        let synthesized = window.start + Duration::minutes(settings.allowed_late_minutes + 1);
        DayBounds {
            check_in: Some(Boundary::technical(synthesized.min(check_out.at))),
            check_out: Some(check_out),
        }
    }
}
