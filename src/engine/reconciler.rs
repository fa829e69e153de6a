use crate::config::DeviationSettings;
use crate::database::models::{
    AttendanceRecord, DayComputation, DeviationState, Employee, RecordState, Shift,
};
use crate::database::queries;
use crate::engine::deviation::{Deviation, early_departure, late_arrival};
use crate::engine::resolver::{Boundary, DayBounds, raw_bounds, resolve};
use crate::engine::shift_matcher::{ShiftWindow, day_of_week, match_shift};
use crate::utils::time::{combine_date_time_local, format_hours, to_local};
use crate::utils::validation::validate_date_range;
use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    pub record_id: i64,
    pub employee_id: i64,
    pub date: NaiveDate,
    pub state: RecordState,
    pub late_hours: f64,
    pub early_hours: f64,
    /// False when the stored record already held these values.
    pub changed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Missing working times or other reference data. Not retried automatically.
    Configuration,
    Processing,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Configuration => f.write_str("configuration"),
            FailureKind::Processing => f.write_str("processing"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind} error for employee {employee_id} on {date}: {message}")]
pub struct ItemFailure {
    pub employee_id: i64,
    pub date: NaiveDate,
    pub record_id: Option<i64>,
    pub kind: FailureKind,
    pub message: String,
}

/// Per-item results of one batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<Result<ItemOutcome, ItemFailure>>,
}

impl BatchReport {
    pub fn push(&mut self, item: Result<ItemOutcome, ItemFailure>) {
        self.items.push(item);
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|item| item.is_ok()).count()
    }

    pub fn changed(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item, Ok(outcome) if outcome.changed))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemFailure> {
        self.items.iter().filter_map(|item| item.as_ref().err())
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }
}

/// Turns a day's punches into a matched, measured attendance record.
pub struct Reconciler {
    pool: SqlitePool,
    settings: DeviationSettings,
    offset: FixedOffset,
}

impl Reconciler {
    pub fn new(pool: SqlitePool, settings: DeviationSettings, offset: FixedOffset) -> Self {
        Self {
            pool,
            settings,
            offset,
        }
    }

    /// Reconciles every day that still has unsettled punches, oldest first.
    pub async fn link(&self, since: Option<NaiveDate>, limit: usize) -> Result<BatchReport> {
        let days = {
            let mut conn = self.pool.acquire().await?;
            let unmatched = queries::count_unmatched_punches(&mut conn).await?;
            if unmatched > 0 {
                warn!("{} unsettled punches match no employee pin", unmatched);
            }
            queries::get_unsettled_days(&mut conn, since, limit).await?
        };

        info!("Linking punches for {} employee days", days.len());

        let mut report = BatchReport::default();
        for (employee_id, date) in days {
            report.push(self.process_day(employee_id, date).await);
        }

        info!(
            "Link finished: {} ok ({} changed), {} failed",
            report.succeeded(),
            report.changed(),
            report.failed()
        );
        Ok(report)
    }

    /// Recomputes existing records in the range, including ones in an error state.
    pub async fn reconcile_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        employee_id: Option<i64>,
    ) -> Result<BatchReport> {
        validate_date_range(from, to)?;

        let records = {
            let mut conn = self.pool.acquire().await?;
            queries::get_attendance_records_by_date_range(&mut conn, employee_id, from, to).await?
        };

        let mut report = BatchReport::default();
        for record in records {
            report.push(self.process_day(record.employee_id, record.date).await);
        }

        info!(
            "Reconcile {}..{} finished: {} ok ({} changed), {} failed",
            from,
            to,
            report.succeeded(),
            report.changed(),
            report.failed()
        );
        Ok(report)
    }

    /// Processes one employee day inside its own transaction.
    pub async fn process_day(&self, employee_id: i64, date: NaiveDate) -> Result<ItemOutcome, ItemFailure> {
        let failure = |kind: FailureKind, record_id: Option<i64>, message: String| ItemFailure {
            employee_id,
            date,
            record_id,
            kind,
            message,
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| failure(FailureKind::Processing, None, e.to_string()))?;

        match self.reconcile_in(&mut tx, employee_id, date).await {
            Ok(outcome) => {
                tx.commit()
                    .await
                    .map_err(|e| failure(FailureKind::Processing, Some(outcome.record_id), e.to_string()))?;

                if outcome.state == RecordState::InitError {
                    warn!("No working times for employee {} on {}", employee_id, date);
                    return Err(failure(
                        FailureKind::Configuration,
                        Some(outcome.record_id),
                        "no working times".to_string(),
                    ));
                }

                debug!("Reconciled employee {} on {}: {:?}", employee_id, date, outcome);
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    error!("Rollback failed for employee {} on {}: {}", employee_id, date, rollback_error);
                }
                error!("Failed to reconcile employee {} on {}: {:#}", employee_id, date, e);

                let record_id = self.mark_failed(employee_id, date, &e).await;
                Err(failure(FailureKind::Processing, record_id, format!("{:#}", e)))
            }
        }
    }

    async fn reconcile_in(
        &self,
        conn: &mut SqliteConnection,
        employee_id: i64,
        date: NaiveDate,
    ) -> Result<ItemOutcome> {
        let employee = queries::get_employee_by_id(conn, employee_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Employee {} not found", employee_id))?;

        let record = match queries::get_attendance_record_for_day(conn, employee_id, date).await? {
            Some(record) => record,
            None => queries::create_attendance_record(conn, employee_id, date).await?,
        };

        let (computation, shift) =
            compute_day(conn, &employee, &record, &self.settings, self.offset).await?;

        let changed = !computation.matches(&record);
        if changed {
            queries::save_day_computation(conn, record.id, &computation).await?;
            queries::add_audit_note(conn, record.id, &describe_computation(&computation, shift.as_ref()))
                .await?;
        }
        queries::set_day_punches_settled(conn, &employee.pin, date, true).await?;

        Ok(ItemOutcome {
            record_id: record.id,
            employee_id,
            date,
            state: computation.state,
            late_hours: computation.late_hours,
            early_hours: computation.early_hours,
            changed,
        })
    }

    /// Leaves the record in `reconcile_error` so the day is not retried on every link.
    async fn mark_failed(&self, employee_id: i64, date: NaiveDate, cause: &anyhow::Error) -> Option<i64> {
        let result = async {
            let mut tx = self.pool.begin().await?;
            let record = match queries::get_attendance_record_for_day(&mut tx, employee_id, date).await? {
                Some(record) => record,
                None => queries::create_attendance_record(&mut tx, employee_id, date).await?,
            };
            let employee = queries::get_employee_by_id(&mut tx, employee_id).await?;

            queries::update_record_state(&mut tx, record.id, RecordState::ReconcileError).await?;
            queries::add_audit_note(&mut tx, record.id, &format!("Reconciliation failed: {:#}", cause))
                .await?;
            if let Some(employee) = employee {
                queries::set_day_punches_settled(&mut tx, &employee.pin, date, true).await?;
            }
            tx.commit().await?;
            Ok::<i64, anyhow::Error>(record.id)
        }
        .await;

        match result {
            Ok(record_id) => Some(record_id),
            Err(e) => {
                error!("Could not record failure for employee {} on {}: {:#}", employee_id, date, e);
                None
            }
        }
    }
}

/// Computes the values a record should hold given its punches, shifts and overrides.
pub async fn compute_day(
    conn: &mut SqliteConnection,
    employee: &Employee,
    record: &AttendanceRecord,
    settings: &DeviationSettings,
    offset: FixedOffset,
) -> Result<(DayComputation, Option<Shift>)> {
    let date = record.date;
    let overrides = &record.overrides;

    // 1. Raw boundaries from the day's punches
    let punches = queries::get_day_punches(conn, &employee.pin, date).await?;
    let mut bounds = raw_bounds(&punches);

    // 2. Candidate shifts from the employee's calendars
    let calendar_ids = queries::get_employee_calendar_ids(conn, employee).await?;
    let candidates = queries::get_shifts_for_calendars(conn, &calendar_ids, day_of_week(date)).await?;
    if candidates.is_empty() {
        let computation = DayComputation {
            state: RecordState::InitError,
            shift_id: None,
            check_in: bounds.check_in_at(),
            check_out: bounds.check_out_at(),
            in_mode: bounds.check_in.map(|b| b.mode),
            out_mode: bounds.check_out.map(|b| b.mode),
            late_hours: 0.0,
            early_hours: 0.0,
            late_state: None,
            early_state: None,
            has_permission: false,
        };
        return Ok((computation, None));
    }

    // 3. Shift: a forced choice wins over the match
    let shift = match overrides.shift_id {
        Some(forced_id) => Some(
            candidates
                .iter()
                .find(|s| s.id == forced_id)
                .cloned()
                .ok_or_else(|| {
                    anyhow::anyhow!("Forced shift {} is not a working time of {} on {}", forced_id, employee.name, date)
                })?,
        ),
        None => {
            let check_in = overrides
                .check_in
                .map(|t| combine_date_time_local(date, t, offset))
                .or(bounds.check_in_at());
            let check_out = overrides
                .check_out
                .map(|t| forced_check_out_for_matching(date, t, check_in, offset))
                .or(bounds.check_out_at());
            match_shift(&candidates, date, check_in, check_out, offset).cloned()
        }
    };

    let Some(shift) = shift else {
        // Nothing punched: the record stays empty.
        let computation = DayComputation {
            state: RecordState::Reconciled,
            shift_id: None,
            check_in: None,
            check_out: None,
            in_mode: None,
            out_mode: None,
            late_hours: 0.0,
            early_hours: 0.0,
            late_state: None,
            early_state: None,
            has_permission: false,
        };
        return Ok((computation, None));
    };

    let window = ShiftWindow::for_date(&shift, date, offset);

    // 4. Forced boundaries replace the punches; otherwise resolve single events
    if overrides.check_in.is_some() || overrides.check_out.is_some() {
        bounds = apply_forced_times(bounds, &shift, date, overrides.check_in, overrides.check_out, offset);
    } else {
        bounds = resolve(bounds, Some(&window), settings);
    }

    if let (Some(check_in), Some(check_out)) = (bounds.check_in_at(), bounds.check_out_at()) {
        if check_in > check_out {
            return Err(anyhow::anyhow!(
                "Check-in {} is after check-out {}",
                to_local(check_in, offset).format("%Y-%m-%d %H:%M"),
                to_local(check_out, offset).format("%Y-%m-%d %H:%M")
            ));
        }
    }

    // 5. Deviations against the matched window
    let mut late = late_arrival(&window, bounds.check_in_at(), settings, record.late_state);
    let mut early = early_departure(&window, bounds.check_out_at(), settings, record.early_state);
    keep_forced_hours(&mut late, overrides.late_hours);
    keep_forced_hours(&mut early, overrides.early_hours);
    if late.is_flagged() || early.is_flagged() {
        debug!("{} on {}: late {:.2}h, early {:.2}h", employee.name, date, late.hours, early.hours);
    }

    // 6. Informational link to an approved permission
    let has_permission = if late.state.is_some() || early.state.is_some() {
        queries::has_validated_permission(conn, employee.id, date).await?
    } else {
        false
    };

    let computation = DayComputation {
        state: RecordState::Reconciled,
        shift_id: Some(shift.id),
        check_in: bounds.check_in_at(),
        check_out: bounds.check_out_at(),
        in_mode: bounds.check_in.map(|b| b.mode),
        out_mode: bounds.check_out.map(|b| b.mode),
        late_hours: late.hours,
        early_hours: early.hours,
        late_state: late.state,
        early_state: early.state,
        has_permission,
    };
    Ok((computation, Some(shift)))
}

/// An approved deviation carries the forced hours written at approval time.
fn keep_forced_hours(deviation: &mut Deviation, forced: Option<f64>) {
    if let (Some(DeviationState::Approved), Some(hours)) = (deviation.state, forced) {
        deviation.hours = hours;
    }
}

fn apply_forced_times(
    bounds: DayBounds,
    shift: &Shift,
    date: NaiveDate,
    check_in: Option<NaiveTime>,
    check_out: Option<NaiveTime>,
    offset: FixedOffset,
) -> DayBounds {
    // On an overnight shift, times before the start belong to the next day.
    let forced = |time: NaiveTime| {
        let day = if shift.is_overnight() && time < shift.start_time {
            date + Duration::days(1)
        } else {
            date
        };
        Boundary::technical(combine_date_time_local(day, time, offset))
    };

    DayBounds {
        check_in: check_in.map(forced).or(bounds.check_in),
        check_out: check_out.map(forced).or(bounds.check_out),
    }
}

/// Before a shift is chosen, a forced check-out earlier than the check-in
/// belongs to the next day, as it would on an overnight shift.
fn forced_check_out_for_matching(
    date: NaiveDate,
    time: NaiveTime,
    check_in: Option<DateTime<Utc>>,
    offset: FixedOffset,
) -> DateTime<Utc> {
    let same_day = combine_date_time_local(date, time, offset);
    match check_in {
        Some(check_in) if same_day < check_in => combine_date_time_local(date + Duration::days(1), time, offset),
        _ => same_day,
    }
}

fn describe_computation(computation: &DayComputation, shift: Option<&Shift>) -> String {
    match (computation.state, shift) {
        (RecordState::InitError, _) => "No working times found for this day".to_string(),
        (_, Some(shift)) => {
            let mut note = format!(
                "Reconciled against {}: late {}, early {}",
                shift.display_name(),
                format_hours(computation.late_hours),
                format_hours(computation.early_hours)
            );
            if computation.has_permission {
                note.push_str(" (approved permission on file)");
            }
            note
        }
        (_, None) => "Reconciled without punches".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{
        DeviationKind, ForceOverrides, LeaveState, NewPunch, PERMISSION_LEAVE_CODE, PunchMode,
    };
    use crate::database::test_pool;

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    // 2025-07-28 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 28).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    async fn seed_employee(pool: &SqlitePool, with_shift: bool) -> Employee {
        let mut conn = pool.acquire().await.unwrap();
        let calendar = queries::create_calendar(&mut conn, "Standard", 8.0).await.unwrap();
        if with_shift {
            queries::create_shift(&mut conn, calendar.id, "", 0, time(9, 0), time(17, 0))
                .await
                .unwrap();
        }
        queries::create_employee(&mut conn, "Mona", "100", Some(calendar.id), false)
            .await
            .unwrap()
    }

    async fn punch(pool: &SqlitePool, remote_id: &str, h: u32, m: u32) {
        let mut conn = pool.acquire().await.unwrap();
        let punch = NewPunch {
            remote_id: Some(remote_id.to_string()),
            emp_code: "100".to_string(),
            dept_code: None,
            att_date: monday(),
            punched_at: combine_date_time_local(monday(), time(h, m), offset()),
            punch_state: None,
            mode: PunchMode::Automatic,
        };
        queries::insert_punch_if_new(&mut conn, &punch).await.unwrap();
    }

    async fn record(pool: &SqlitePool, employee_id: i64) -> AttendanceRecord {
        let mut conn = pool.acquire().await.unwrap();
        queries::get_attendance_record_for_day(&mut conn, employee_id, monday())
            .await
            .unwrap()
            .unwrap()
    }

    fn reconciler(pool: &SqlitePool) -> Reconciler {
        Reconciler::new(pool.clone(), DeviationSettings::default(), offset())
    }

    #[tokio::test]
    async fn link_flags_late_arrival() {
        let pool = test_pool().await;
        let employee = seed_employee(&pool, true).await;
        punch(&pool, "1", 9, 45).await;
        punch(&pool, "2", 17, 0).await;

        let report = reconciler(&pool).link(None, 30).await.unwrap();
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.changed(), 1);

        let stored = record(&pool, employee.id).await;
        assert_eq!(stored.state, RecordState::Reconciled);
        assert_eq!(stored.late_hours, 0.75);
        assert_eq!(stored.late_state, Some(DeviationState::Flagged));
        assert_eq!(stored.early_hours, 0.0);
        assert_eq!(stored.early_state, None);
        assert_eq!(stored.in_mode, Some(PunchMode::Automatic));

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(queries::get_audit_notes(&mut conn, stored.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn relinking_is_a_no_op_and_reconcile_is_idempotent() {
        let pool = test_pool().await;
        let employee = seed_employee(&pool, true).await;
        punch(&pool, "1", 9, 20).await;
        punch(&pool, "2", 17, 0).await;

        let reconciler = reconciler(&pool);
        reconciler.link(None, 30).await.unwrap();
        let again = reconciler.link(None, 30).await.unwrap();
        assert!(again.items.is_empty());

        let report = reconciler.reconcile_range(monday(), monday(), None).await.unwrap();
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.changed(), 0);

        let stored = record(&pool, employee.id).await;
        assert_eq!(stored.late_hours, 0.0);
        assert_eq!(stored.late_state, None);
    }

    #[tokio::test]
    async fn lone_punch_gets_synthesized_check_out() {
        let pool = test_pool().await;
        let employee = seed_employee(&pool, true).await;
        punch(&pool, "1", 9, 5).await;

        reconciler(&pool).link(None, 30).await.unwrap();

        let stored = record(&pool, employee.id).await;
        assert_eq!(stored.check_out, Some(combine_date_time_local(monday(), time(16, 44), offset())));
        assert_eq!(stored.out_mode, Some(PunchMode::Technical));
        assert_eq!(stored.early_state, Some(DeviationState::Flagged));
        assert!((stored.early_hours - 16.0 / 60.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_working_times_is_a_configuration_failure() {
        let pool = test_pool().await;
        let employee = seed_employee(&pool, false).await;
        punch(&pool, "1", 9, 0).await;

        let report = reconciler(&pool).link(None, 30).await.unwrap();
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.kind, FailureKind::Configuration);

        let stored = record(&pool, employee.id).await;
        assert_eq!(stored.state, RecordState::InitError);
        assert_eq!(Some(stored.id), failure.record_id);

        // Settled, so the next link does not pick it up again.
        assert!(reconciler(&pool).link(None, 30).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn failing_day_does_not_stop_the_batch() {
        let pool = test_pool().await;
        let employee = seed_employee(&pool, true).await;
        {
            let mut conn = pool.acquire().await.unwrap();
            let calendar = queries::get_calendar_by_name(&mut conn, "Standard").await.unwrap().unwrap();
            queries::create_employee(&mut conn, "Karim", "200", Some(calendar.id), false)
                .await
                .unwrap();
            let bad = NewPunch {
                remote_id: Some("9".to_string()),
                emp_code: "200".to_string(),
                dept_code: None,
                att_date: monday(),
                punched_at: combine_date_time_local(monday(), time(9, 0), offset()),
                punch_state: None,
                mode: PunchMode::Automatic,
            };
            queries::insert_punch_if_new(&mut conn, &bad).await.unwrap();
        }
        punch(&pool, "1", 9, 0).await;
        punch(&pool, "2", 17, 0).await;

        let reconciler = reconciler(&pool);
        reconciler.link(None, 30).await.unwrap();

        // Force an impossible check-in on Karim's day.
        let karim_id = employee.id + 1;
        let karim_record = record(&pool, karim_id).await;
        {
            let mut conn = pool.acquire().await.unwrap();
            let overrides = ForceOverrides {
                check_in: Some(time(18, 0)),
                check_out: Some(time(17, 0)),
                ..ForceOverrides::default()
            };
            queries::update_force_overrides(&mut conn, karim_record.id, &overrides).await.unwrap();
        }

        let report = reconciler.reconcile_range(monday(), monday(), None).await.unwrap();
        assert_eq!(report.items.len(), 2);
        assert_eq!(report.succeeded(), 1);
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.kind, FailureKind::Processing);
        assert_eq!(failure.employee_id, karim_id);

        assert_eq!(record(&pool, karim_id).await.state, RecordState::ReconcileError);
        assert_eq!(record(&pool, employee.id).await.state, RecordState::Reconciled);
    }

    #[tokio::test]
    async fn approval_survives_recomputation_and_permission_is_linked() {
        let pool = test_pool().await;
        let employee = seed_employee(&pool, true).await;
        punch(&pool, "1", 10, 0).await;
        punch(&pool, "2", 17, 0).await;
        {
            let mut conn = pool.acquire().await.unwrap();
            queries::create_leave_request(
                &mut conn,
                employee.id,
                PERMISSION_LEAVE_CODE,
                monday(),
                monday(),
                1.0,
                LeaveState::Validated,
            )
            .await
            .unwrap();
        }

        let reconciler = reconciler(&pool);
        reconciler.link(None, 30).await.unwrap();
        let stored = record(&pool, employee.id).await;
        assert!(stored.has_permission);
        assert_eq!(stored.late_state, Some(DeviationState::Flagged));

        {
            let mut conn = pool.acquire().await.unwrap();
            queries::update_deviation(
                &mut conn,
                stored.id,
                DeviationKind::Late,
                Some(DeviationState::Approved),
                1.0,
            )
            .await
            .unwrap();
        }
        reconciler.reconcile_range(monday(), monday(), None).await.unwrap();
        assert_eq!(record(&pool, employee.id).await.late_state, Some(DeviationState::Approved));
    }

    #[tokio::test]
    async fn forced_shift_must_be_a_candidate() {
        let pool = test_pool().await;
        let employee = seed_employee(&pool, true).await;
        punch(&pool, "1", 9, 0).await;
        punch(&pool, "2", 17, 0).await;

        let reconciler = reconciler(&pool);
        reconciler.link(None, 30).await.unwrap();
        let stored = record(&pool, employee.id).await;
        {
            let mut conn = pool.acquire().await.unwrap();
            let overrides = ForceOverrides {
                shift_id: Some(999),
                ..ForceOverrides::default()
            };
            queries::update_force_overrides(&mut conn, stored.id, &overrides).await.unwrap();
        }

        let result = reconciler.process_day(employee.id, monday()).await;
        assert!(result.is_err());
        assert_eq!(record(&pool, employee.id).await.state, RecordState::ReconcileError);
    }

    #[test]
    fn forced_check_out_before_check_in_is_matched_on_the_next_day() {
        let check_in = Some(combine_date_time_local(monday(), time(22, 0), offset()));
        let tuesday = monday() + Duration::days(1);
        assert_eq!(
            forced_check_out_for_matching(monday(), time(6, 0), check_in, offset()),
            combine_date_time_local(tuesday, time(6, 0), offset())
        );
        assert_eq!(
            forced_check_out_for_matching(monday(), time(23, 0), check_in, offset()),
            combine_date_time_local(monday(), time(23, 0), offset())
        );
        assert_eq!(
            forced_check_out_for_matching(monday(), time(6, 0), None, offset()),
            combine_date_time_local(monday(), time(6, 0), offset())
        );
    }
}
