use crate::database::models::{AttendanceRecord, DeviationKind, DeviationState, PERMISSION_LEAVE_CODE};
use crate::database::queries;
use crate::engine::shift_matcher::day_of_week;
use crate::utils::validation::validate_date_range;
use anyhow::Result;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use sqlx::SqliteConnection;
use std::collections::HashSet;

/// Attendance figures handed to payroll for one employee and period.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PayrollSummary {
    pub employee_id: i64,
    pub employee_name: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub scheduled_days: u32,
    pub days_attended: u32,
    pub absent_days: u32,
    pub late_days: u32,
    pub late_hours: f64,
    pub early_days: u32,
    pub early_hours: f64,
    pub waived_late_days: u32,
    pub waived_early_days: u32,
    pub permissions: u32,
    /// Records still in an error state; their deviations are not counted.
    pub error_days: u32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct DeviationTotals {
    penalised_days: u32,
    penalised_hours: f64,
    waived_days: u32,
}

fn deviation_totals(records: &[AttendanceRecord], kind: DeviationKind) -> DeviationTotals {
    let mut totals = DeviationTotals::default();
    for record in records.iter().filter(|r| !r.state.is_error()) {
        match record.deviation_state(kind) {
            Some(DeviationState::Flagged) if record.deviation_hours(kind) > 0.0 => {
                totals.penalised_days += 1;
                totals.penalised_hours += record.deviation_hours(kind);
            }
            Some(DeviationState::Approved) => totals.waived_days += 1,
            _ => {}
        }
    }
    totals
}

/// Folds the period's records into payroll figures.
///
/// Flagged deviations are penalised; approved ones are waived and only counted.
pub fn summarize(records: &[AttendanceRecord], scheduled_dates: &[NaiveDate]) -> PayrollSummary {
    let attended: HashSet<NaiveDate> = records
        .iter()
        .filter(|r| r.check_in.is_some())
        .map(|r| r.date)
        .collect();
    let absent_days = scheduled_dates.iter().filter(|d| !attended.contains(d)).count();

    let late = deviation_totals(records, DeviationKind::Late);
    let early = deviation_totals(records, DeviationKind::Early);

    PayrollSummary {
        scheduled_days: scheduled_dates.len() as u32,
        days_attended: attended.len() as u32,
        absent_days: absent_days as u32,
        late_days: late.penalised_days,
        late_hours: late.penalised_hours,
        early_days: early.penalised_days,
        early_hours: early.penalised_hours,
        waived_late_days: late.waived_days,
        waived_early_days: early.waived_days,
        error_days: records.iter().filter(|r| r.state.is_error()).count() as u32,
        ..PayrollSummary::default()
    }
}

pub async fn payroll_summary(
    conn: &mut SqliteConnection,
    employee_id: i64,
    date_from: NaiveDate,
    date_to: NaiveDate,
) -> Result<PayrollSummary> {
    validate_date_range(date_from, date_to)?;

    let employee = queries::get_employee_by_id(conn, employee_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Employee {} not found", employee_id))?;

    let records =
        queries::get_attendance_records_by_date_range(conn, Some(employee_id), date_from, date_to).await?;

    // Weekdays with at least one shift in any of the employee's calendars
    let calendar_ids = queries::get_employee_calendar_ids(conn, &employee).await?;
    let mut working_weekdays = HashSet::new();
    for weekday in 0..7 {
        if !queries::get_shifts_for_calendars(conn, &calendar_ids, weekday).await?.is_empty() {
            working_weekdays.insert(weekday);
        }
    }

    let scheduled_dates: Vec<NaiveDate> = date_from
        .iter_days()
        .take_while(|d| *d <= date_to)
        .filter(|d| working_weekdays.contains(&day_of_week(*d)))
        .collect();

    let permissions = queries::get_validated_leaves_in_period(conn, employee_id, date_from, date_to)
        .await?
        .into_iter()
        .filter(|leave| leave.code == PERMISSION_LEAVE_CODE)
        .count();

    Ok(PayrollSummary {
        employee_id,
        employee_name: employee.name,
        date_from,
        date_to,
        permissions: permissions as u32,
        ..summarize(&records, &scheduled_dates)
    })
}

/// Number of days in an inclusive range.
pub fn period_days(date_from: NaiveDate, date_to: NaiveDate) -> i64 {
    (date_to - date_from + Duration::days(1)).num_days()
}
