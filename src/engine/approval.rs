use crate::config::DeviationSettings;
use crate::database::models::{
    AttendanceRecord, DeviationKind, DeviationState, ForceOverrides,
};
use crate::database::queries;
use crate::engine::authorization::{Authorizer, Capability};
use crate::engine::reconciler::compute_day;
use crate::error::ActionError;
use crate::utils::time::format_hours;
use crate::utils::validation::validate_forced_hours;
use chrono::FixedOffset;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::info;

fn state_label(kind: DeviationKind, state: Option<DeviationState>) -> String {
    match state {
        Some(DeviationState::Flagged) => kind.flagged_label().to_string(),
        Some(DeviationState::Approved) => "approved".to_string(),
        None => "clear".to_string(),
    }
}

/// `late|early -> approved`. Anything else is rejected.
pub fn approve_transition(
    kind: DeviationKind,
    current: Option<DeviationState>,
) -> Result<DeviationState, ActionError> {
    match current {
        Some(DeviationState::Flagged) => Ok(DeviationState::Approved),
        other => Err(ActionError::InvalidTransition {
            action: "approve",
            deviation: kind.describe(),
            from: state_label(kind, other),
        }),
    }
}

/// `approved -> late|early`. Anything else is rejected.
pub fn cancel_transition(
    kind: DeviationKind,
    current: Option<DeviationState>,
) -> Result<DeviationState, ActionError> {
    match current {
        Some(DeviationState::Approved) => Ok(DeviationState::Flagged),
        other => Err(ActionError::InvalidTransition {
            action: "cancel",
            deviation: kind.describe(),
            from: state_label(kind, other),
        }),
    }
}

/// Interactive actions on a single attendance day.
pub struct DayActions {
    pool: SqlitePool,
    authorizer: Arc<dyn Authorizer>,
    settings: DeviationSettings,
    offset: FixedOffset,
}

impl DayActions {
    pub fn new(
        pool: SqlitePool,
        authorizer: Arc<dyn Authorizer>,
        settings: DeviationSettings,
        offset: FixedOffset,
    ) -> Self {
        Self {
            pool,
            authorizer,
            settings,
            offset,
        }
    }

    fn authorize(&self, actor: &str, capability: Capability) -> Result<(), ActionError> {
        if self.authorizer.allows(actor, capability) {
            Ok(())
        } else {
            Err(ActionError::Forbidden {
                actor: actor.to_string(),
                capability,
            })
        }
    }

    pub async fn approve(
        &self,
        actor: &str,
        record_id: i64,
        kind: DeviationKind,
    ) -> Result<AttendanceRecord, ActionError> {
        self.authorize(actor, Capability::ApproveDeviation)?;

        let mut tx = self.pool.begin().await?;
        let record = load_record(&mut tx, record_id).await?;
        let next = approve_transition(kind, record.deviation_state(kind))?;

        let hours = record
            .forced_hours(kind)
            .unwrap_or_else(|| record.deviation_hours(kind));
        queries::update_deviation(&mut tx, record_id, kind, Some(next), hours).await?;

        let has_permission = queries::has_validated_permission(&mut tx, record.employee_id, record.date).await?;
        queries::update_has_permission(&mut tx, record_id, has_permission).await?;
        queries::add_audit_note(
            &mut tx,
            record_id,
            &format!("{} approved by {} ({})", capitalize(kind.describe()), actor, format_hours(hours)),
        )
        .await?;

        let updated = load_record(&mut tx, record_id).await?;
        tx.commit().await?;

        info!("{} approved {} on {}", actor, kind.describe(), record.display_name());
        Ok(updated)
    }

    pub async fn cancel(
        &self,
        actor: &str,
        record_id: i64,
        kind: DeviationKind,
    ) -> Result<AttendanceRecord, ActionError> {
        self.authorize(actor, Capability::CancelApproval)?;

        let mut tx = self.pool.begin().await?;
        let record = load_record(&mut tx, record_id).await?;
        let next = cancel_transition(kind, record.deviation_state(kind))?;

        queries::update_deviation(&mut tx, record_id, kind, Some(next), record.deviation_hours(kind)).await?;
        queries::add_audit_note(
            &mut tx,
            record_id,
            &format!("Approval of {} cancelled by {}", kind.describe(), actor),
        )
        .await?;

        let updated = load_record(&mut tx, record_id).await?;
        tx.commit().await?;

        info!("{} cancelled approval of {} on {}", actor, kind.describe(), record.display_name());
        Ok(updated)
    }

    /// Replaces the manager overrides and recomputes the day with them.
    ///
    /// An override that cannot be applied (unknown shift, check-in after
    /// check-out) is rejected and nothing is written.
    pub async fn force(
        &self,
        actor: &str,
        record_id: i64,
        overrides: ForceOverrides,
    ) -> Result<AttendanceRecord, ActionError> {
        self.authorize(actor, Capability::ForceAdjust)?;

        validate_forced_hours(overrides.late_hours)
            .and_then(|_| validate_forced_hours(overrides.early_hours))
            .map_err(|e| ActionError::Validation(e.to_string()))?;

        let mut tx = self.pool.begin().await?;
        let record = load_record(&mut tx, record_id).await?;
        let employee = queries::get_employee_by_id(&mut tx, record.employee_id)
            .await?
            .ok_or_else(|| ActionError::Validation(format!("Employee {} not found", record.employee_id)))?;

        queries::update_force_overrides(&mut tx, record_id, &overrides).await?;
        let forced = load_record(&mut tx, record_id).await?;

        let (computation, _) = compute_day(&mut tx, &employee, &forced, &self.settings, self.offset)
            .await
            .map_err(|e| ActionError::Validation(format!("{:#}", e)))?;
        if !computation.matches(&forced) {
            queries::save_day_computation(&mut tx, record_id, &computation).await?;
        }
        queries::add_audit_note(&mut tx, record_id, &describe_overrides(actor, &overrides)).await?;

        let updated = load_record(&mut tx, record_id).await?;
        tx.commit().await?;

        info!("{} set overrides on {}", actor, record.display_name());
        Ok(updated)
    }

    /// Refreshes the link to an approved late/early permission.
    pub async fn recheck(&self, actor: &str, record_id: i64) -> Result<AttendanceRecord, ActionError> {
        self.authorize(actor, Capability::Reconcile)?;

        let mut tx = self.pool.begin().await?;
        let record = load_record(&mut tx, record_id).await?;
        let has_permission = queries::has_validated_permission(&mut tx, record.employee_id, record.date).await?;

        if has_permission != record.has_permission {
            queries::update_has_permission(&mut tx, record_id, has_permission).await?;
            let body = if has_permission {
                format!("Approved permission linked by {}", actor)
            } else {
                format!("Permission link removed by {}", actor)
            };
            queries::add_audit_note(&mut tx, record_id, &body).await?;
        }

        let updated = load_record(&mut tx, record_id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Deletes the record and releases its punches for the next link.
    pub async fn delete(&self, actor: &str, record_id: i64) -> Result<u64, ActionError> {
        self.authorize(actor, Capability::DeleteRecord)?;

        let mut tx = self.pool.begin().await?;
        let record = load_record(&mut tx, record_id).await?;
        let employee = queries::get_employee_by_id(&mut tx, record.employee_id).await?;

        let released = match employee {
            Some(employee) => queries::set_day_punches_settled(&mut tx, &employee.pin, record.date, false).await?,
            None => 0,
        };
        queries::delete_attendance_record(&mut tx, record_id).await?;
        tx.commit().await?;

        info!("{} deleted {}, {} punches released", actor, record.display_name(), released);
        Ok(released)
    }
}

async fn load_record(conn: &mut SqliteConnection, record_id: i64) -> Result<AttendanceRecord, ActionError> {
    queries::get_attendance_record(conn, record_id)
        .await?
        .ok_or(ActionError::RecordNotFound(record_id))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn describe_overrides(actor: &str, overrides: &ForceOverrides) -> String {
    if overrides.is_empty() {
        return format!("Overrides cleared by {}", actor);
    }

    let mut parts = Vec::new();
    if let Some(shift_id) = overrides.shift_id {
        parts.push(format!("shift #{}", shift_id));
    }
    if let Some(check_in) = overrides.check_in {
        parts.push(format!("check-in {}", check_in.format("%H:%M")));
    }
    if let Some(check_out) = overrides.check_out {
        parts.push(format!("check-out {}", check_out.format("%H:%M")));
    }
    if let Some(hours) = overrides.late_hours {
        parts.push(format!("late {}", format_hours(hours)));
    }
    if let Some(hours) = overrides.early_hours {
        parts.push(format!("early {}", format_hours(hours)));
    }
    format!("Overrides set by {}: {}", actor, parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{LeaveState, NewPunch, PERMISSION_LEAVE_CODE, PunchMode, RecordState};
    use crate::database::test_pool;
    use crate::engine::authorization::GroupAuthorizer;
    use crate::engine::payroll::payroll_summary;
    use crate::engine::reconciler::Reconciler;
    use crate::utils::time::combine_date_time_local;
    use chrono::{NaiveDate, NaiveTime};

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 28).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    /// Mona on a 09:00-17:00 shift, in at 10:00 and out at 16:00.
    async fn flagged_day(pool: &SqlitePool) -> AttendanceRecord {
        {
            let mut conn = pool.acquire().await.unwrap();
            let calendar = queries::create_calendar(&mut conn, "Standard", 8.0).await.unwrap();
            queries::create_shift(&mut conn, calendar.id, "", 0, time(9, 0), time(17, 0))
                .await
                .unwrap();
            queries::create_employee(&mut conn, "Mona", "100", Some(calendar.id), false)
                .await
                .unwrap();
            for (remote_id, at) in [("1", time(10, 0)), ("2", time(16, 0))] {
                let punch = NewPunch {
                    remote_id: Some(remote_id.to_string()),
                    emp_code: "100".to_string(),
                    dept_code: None,
                    att_date: monday(),
                    punched_at: combine_date_time_local(monday(), at, offset()),
                    punch_state: None,
                    mode: PunchMode::Automatic,
                };
                queries::insert_punch_if_new(&mut conn, &punch).await.unwrap();
            }
        }

        let report = Reconciler::new(pool.clone(), DeviationSettings::default(), offset())
            .link(None, 30)
            .await
            .unwrap();
        assert_eq!(report.succeeded(), 1);

        let mut conn = pool.acquire().await.unwrap();
        queries::get_attendance_records_by_date_range(&mut conn, None, monday(), monday())
            .await
            .unwrap()
            .remove(0)
    }

    fn actions(pool: &SqlitePool, authorizer: GroupAuthorizer) -> DayActions {
        DayActions::new(pool.clone(), Arc::new(authorizer), DeviationSettings::default(), offset())
    }

    fn managed_by_amira() -> GroupAuthorizer {
        GroupAuthorizer::new(&["amira".to_string()], &["omar".to_string()])
    }

    #[test]
    fn transitions() {
        assert_eq!(
            approve_transition(DeviationKind::Late, Some(DeviationState::Flagged)).unwrap(),
            DeviationState::Approved
        );
        assert_eq!(
            cancel_transition(DeviationKind::Early, Some(DeviationState::Approved)).unwrap(),
            DeviationState::Flagged
        );
        assert!(approve_transition(DeviationKind::Late, Some(DeviationState::Approved)).is_err());
        assert!(approve_transition(DeviationKind::Late, None).is_err());
        assert!(cancel_transition(DeviationKind::Early, Some(DeviationState::Flagged)).is_err());
    }

    #[test]
    fn invalid_transition_names_current_state() {
        let err = approve_transition(DeviationKind::Early, None).unwrap_err();
        assert_eq!(err.to_string(), "Cannot approve early check-out: current state is clear");
        let err = cancel_transition(DeviationKind::Late, Some(DeviationState::Flagged)).unwrap_err();
        assert_eq!(err.to_string(), "Cannot cancel late check-in: current state is late");
    }

    #[tokio::test]
    async fn approve_then_cancel() {
        let pool = test_pool().await;
        let record = flagged_day(&pool).await;
        assert_eq!(record.late_state, Some(DeviationState::Flagged));
        let actions = actions(&pool, managed_by_amira());

        let approved = actions.approve("amira", record.id, DeviationKind::Late).await.unwrap();
        assert_eq!(approved.late_state, Some(DeviationState::Approved));
        assert_eq!(approved.late_hours, 1.0);

        let again = actions.approve("amira", record.id, DeviationKind::Late).await;
        assert!(matches!(again, Err(ActionError::InvalidTransition { .. })));

        let cancelled = actions.cancel("amira", record.id, DeviationKind::Late).await.unwrap();
        assert_eq!(cancelled.late_state, Some(DeviationState::Flagged));

        let mut conn = pool.acquire().await.unwrap();
        let notes = queries::get_audit_notes(&mut conn, record.id).await.unwrap();
        assert_eq!(notes.len(), 3);
        assert!(notes[1].body.starts_with("Late check-in approved by amira"));
    }

    #[tokio::test]
    async fn officer_cannot_approve() {
        let pool = test_pool().await;
        let record = flagged_day(&pool).await;
        let actions = actions(&pool, managed_by_amira());

        let result = actions.approve("omar", record.id, DeviationKind::Early).await;
        assert!(matches!(result, Err(ActionError::Forbidden { .. })));

        let mut conn = pool.acquire().await.unwrap();
        let unchanged = queries::get_attendance_record(&mut conn, record.id).await.unwrap().unwrap();
        assert_eq!(unchanged.early_state, Some(DeviationState::Flagged));
    }

    #[tokio::test]
    async fn approval_writes_forced_hours() {
        let pool = test_pool().await;
        let record = flagged_day(&pool).await;
        let actions = actions(&pool, managed_by_amira());

        let overrides = ForceOverrides {
            late_hours: Some(0.5),
            ..ForceOverrides::default()
        };
        actions.force("omar", record.id, overrides).await.unwrap();

        let approved = actions.approve("amira", record.id, DeviationKind::Late).await.unwrap();
        assert_eq!(approved.late_hours, 0.5);
    }

    #[tokio::test]
    async fn forced_times_replace_punches() {
        let pool = test_pool().await;
        let record = flagged_day(&pool).await;
        let actions = actions(&pool, managed_by_amira());

        let overrides = ForceOverrides {
            check_in: Some(time(9, 0)),
            check_out: Some(time(17, 0)),
            ..ForceOverrides::default()
        };
        let forced = actions.force("omar", record.id, overrides).await.unwrap();
        assert_eq!(forced.state, RecordState::Reconciled);
        assert_eq!(forced.in_mode, Some(PunchMode::Technical));
        assert_eq!(forced.late_hours, 0.0);
        assert_eq!(forced.late_state, None);
        assert_eq!(forced.early_state, None);
    }

    #[tokio::test]
    async fn unusable_override_is_rejected_without_writing() {
        let pool = test_pool().await;
        let record = flagged_day(&pool).await;
        let actions = actions(&pool, managed_by_amira());

        let unknown_shift = ForceOverrides {
            shift_id: Some(999),
            ..ForceOverrides::default()
        };
        let result = actions.force("omar", record.id, unknown_shift).await;
        assert!(matches!(result, Err(ActionError::Validation(_))));

        let inverted = ForceOverrides {
            check_in: Some(time(17, 0)),
            check_out: Some(time(9, 0)),
            ..ForceOverrides::default()
        };
        let result = actions.force("omar", record.id, inverted).await;
        assert!(matches!(result, Err(ActionError::Validation(_))));

        let mut conn = pool.acquire().await.unwrap();
        let unchanged = queries::get_attendance_record(&mut conn, record.id).await.unwrap().unwrap();
        assert!(unchanged.overrides.is_empty());
    }

    #[tokio::test]
    async fn recheck_links_validated_permission() {
        let pool = test_pool().await;
        let record = flagged_day(&pool).await;
        assert!(!record.has_permission);
        {
            let mut conn = pool.acquire().await.unwrap();
            queries::create_leave_request(
                &mut conn,
                record.employee_id,
                PERMISSION_LEAVE_CODE,
                monday(),
                monday(),
                1.0,
                LeaveState::Validated,
            )
            .await
            .unwrap();
        }

        let actions = actions(&pool, managed_by_amira());
        let rechecked = actions.recheck("omar", record.id).await.unwrap();
        assert!(rechecked.has_permission);
        assert_eq!(rechecked.late_state, Some(DeviationState::Flagged));
    }

    #[tokio::test]
    async fn delete_releases_punches() {
        let pool = test_pool().await;
        let record = flagged_day(&pool).await;
        let actions = actions(&pool, managed_by_amira());

        assert!(matches!(
            actions.delete("omar", record.id).await,
            Err(ActionError::Forbidden { .. })
        ));
        assert_eq!(actions.delete("amira", record.id).await.unwrap(), 2);
        assert!(matches!(
            actions.delete("amira", record.id).await,
            Err(ActionError::RecordNotFound(_))
        ));

        let report = Reconciler::new(pool.clone(), DeviationSettings::default(), offset())
            .link(None, 30)
            .await
            .unwrap();
        assert_eq!(report.succeeded(), 1);
    }

    #[tokio::test]
    async fn forced_overnight_times_roll_check_out_to_next_day() {
        let pool = test_pool().await;
        let record_id = {
            let mut conn = pool.acquire().await.unwrap();
            let calendar = queries::create_calendar(&mut conn, "Nights", 8.0).await.unwrap();
            queries::create_shift(&mut conn, calendar.id, "", 0, time(22, 0), time(6, 0))
                .await
                .unwrap();
            queries::create_employee(&mut conn, "Karim", "200", Some(calendar.id), false)
                .await
                .unwrap();
            let punch = NewPunch {
                remote_id: Some("1".to_string()),
                emp_code: "200".to_string(),
                dept_code: None,
                att_date: monday(),
                punched_at: combine_date_time_local(monday(), time(22, 10), offset()),
                punch_state: None,
                mode: PunchMode::Automatic,
            };
            queries::insert_punch_if_new(&mut conn, &punch).await.unwrap();
            drop(conn);

            Reconciler::new(pool.clone(), DeviationSettings::default(), offset())
                .link(None, 30)
                .await
                .unwrap();

            let mut conn = pool.acquire().await.unwrap();
            queries::get_attendance_records_by_date_range(&mut conn, None, monday(), monday())
                .await
                .unwrap()
                .remove(0)
                .id
        };

        let overrides = ForceOverrides {
            check_in: Some(time(22, 0)),
            check_out: Some(time(6, 0)),
            ..ForceOverrides::default()
        };
        let forced = actions(&pool, managed_by_amira())
            .force("amira", record_id, overrides)
            .await
            .unwrap();

        let tuesday = monday().succ_opt().unwrap();
        assert_eq!(forced.check_in, Some(combine_date_time_local(monday(), time(22, 0), offset())));
        assert_eq!(forced.check_out, Some(combine_date_time_local(tuesday, time(6, 0), offset())));
        assert_eq!(forced.late_state, None);
        assert_eq!(forced.early_state, None);
        assert_eq!(forced.early_hours, 0.0);
    }

    #[tokio::test]
    async fn payroll_follows_approve_and_cancel() {
        let pool = test_pool().await;
        let record = flagged_day(&pool).await;
        let actions = actions(&pool, managed_by_amira());

        actions.approve("amira", record.id, DeviationKind::Late).await.unwrap();
        let summary = {
            let mut conn = pool.acquire().await.unwrap();
            payroll_summary(&mut conn, record.employee_id, monday(), monday()).await.unwrap()
        };
        assert_eq!(summary.late_days, 0);
        assert_eq!(summary.late_hours, 0.0);
        assert_eq!(summary.waived_late_days, 1);

        actions.cancel("amira", record.id, DeviationKind::Late).await.unwrap();
        let summary = {
            let mut conn = pool.acquire().await.unwrap();
            payroll_summary(&mut conn, record.employee_id, monday(), monday()).await.unwrap()
        };
        assert_eq!(summary.late_days, 1);
        assert_eq!(summary.late_hours, 1.0);
        assert_eq!(summary.waived_late_days, 0);
    }
}
