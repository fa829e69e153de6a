use crate::database::models::{
    AttendanceRecord, AuditNote, Calendar, DayComputation, DeviationKind, DeviationState,
    Employee, ForceOverrides, LeaveRequest, LeaveState, NewPunch, PERMISSION_LEAVE_CODE, Punch,
    PunchMode, RecordState, Shift, SourceEmployee,
};
use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

// Calendar and shift queries
pub async fn create_calendar(
    conn: &mut SqliteConnection,
    name: &str,
    hours_per_day: f64,
) -> Result<Calendar> {
    let result = sqlx::query("INSERT INTO calendars (name, hours_per_day) VALUES (?, ?)")
        .bind(name)
        .bind(hours_per_day)
        .execute(&mut *conn)
        .await?;

    Ok(Calendar {
        id: result.last_insert_rowid(),
        name: name.to_string(),
        hours_per_day,
    })
}

pub async fn get_calendar_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<Calendar>> {
    let row_opt = sqlx::query("SELECT id, name, hours_per_day FROM calendars WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row_opt.map(|row| Calendar {
        id: row.get("id"),
        name: row.get("name"),
        hours_per_day: row.get("hours_per_day"),
    }))
}

const SHIFT_COLUMNS: &str = "s.id, s.calendar_id, c.name AS calendar_name, s.name, s.day_of_week, s.start_time, s.end_time";

fn map_shift(row: &SqliteRow) -> Shift {
    let day_of_week: i64 = row.get("day_of_week");
    Shift {
        id: row.get("id"),
        calendar_id: row.get("calendar_id"),
        calendar_name: row.get("calendar_name"),
        name: row.get("name"),
        day_of_week: day_of_week as u32,
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
    }
}

pub async fn create_shift(
    conn: &mut SqliteConnection,
    calendar_id: i64,
    name: &str,
    day_of_week: u32,
    start_time: NaiveTime,
    end_time: NaiveTime,
) -> Result<Shift> {
    let result = sqlx::query(
        "INSERT INTO shifts (calendar_id, name, day_of_week, start_time, end_time) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(calendar_id)
    .bind(name)
    .bind(day_of_week as i64)
    .bind(start_time)
    .bind(end_time)
    .execute(&mut *conn)
    .await?;

    let shift_id = result.last_insert_rowid();
    get_shift_by_id(conn, shift_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Shift {} vanished after insert", shift_id))
}

pub async fn get_shift_by_id(conn: &mut SqliteConnection, shift_id: i64) -> Result<Option<Shift>> {
    let sql = format!(
        "SELECT {} FROM shifts s JOIN calendars c ON c.id = s.calendar_id WHERE s.id = ?",
        SHIFT_COLUMNS
    );
    let row_opt = sqlx::query(&sql)
        .bind(shift_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row_opt.as_ref().map(map_shift))
}

pub async fn get_shifts_for_calendars(
    conn: &mut SqliteConnection,
    calendar_ids: &[i64],
    day_of_week: u32,
) -> Result<Vec<Shift>> {
    if calendar_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; calendar_ids.len()].join(", ");
    let sql = format!(
        "SELECT {} FROM shifts s JOIN calendars c ON c.id = s.calendar_id
         WHERE s.day_of_week = ? AND s.calendar_id IN ({})
         ORDER BY s.start_time ASC, s.id ASC",
        SHIFT_COLUMNS, placeholders
    );

    let mut query = sqlx::query(&sql).bind(day_of_week as i64);
    for calendar_id in calendar_ids {
        query = query.bind(*calendar_id);
    }

    let rows = query.fetch_all(&mut *conn).await?;
    Ok(rows.iter().map(map_shift).collect())
}

pub async fn list_shifts(conn: &mut SqliteConnection, calendar_id: i64) -> Result<Vec<Shift>> {
    let sql = format!(
        "SELECT {} FROM shifts s JOIN calendars c ON c.id = s.calendar_id
         WHERE s.calendar_id = ?
         ORDER BY s.day_of_week ASC, s.start_time ASC",
        SHIFT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(calendar_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.iter().map(map_shift).collect())
}

// Employee queries
fn map_employee(row: &SqliteRow) -> Employee {
    Employee {
        id: row.get("id"),
        name: row.get("name"),
        pin: row.get("pin"),
        calendar_id: row.get("calendar_id"),
        multi_shifts: row.get("multi_shifts"),
        created_at: row.get("created_at"),
    }
}

pub async fn create_employee(
    conn: &mut SqliteConnection,
    name: &str,
    pin: &str,
    calendar_id: Option<i64>,
    multi_shifts: bool,
) -> Result<Employee> {
    let result = sqlx::query(
        "INSERT INTO employees (name, pin, calendar_id, multi_shifts) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(pin)
    .bind(calendar_id)
    .bind(multi_shifts)
    .execute(&mut *conn)
    .await?;

    let employee_id = result.last_insert_rowid();
    get_employee_by_id(conn, employee_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Employee {} vanished after insert", employee_id))
}

pub async fn add_employee_calendar(
    conn: &mut SqliteConnection,
    employee_id: i64,
    calendar_id: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO employee_calendars (employee_id, calendar_id) VALUES (?, ?)",
    )
    .bind(employee_id)
    .bind(calendar_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get_employee_by_id(
    conn: &mut SqliteConnection,
    employee_id: i64,
) -> Result<Option<Employee>> {
    let row_opt = sqlx::query(
        "SELECT id, name, pin, calendar_id, multi_shifts, created_at FROM employees WHERE id = ?",
    )
    .bind(employee_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row_opt.as_ref().map(map_employee))
}

pub async fn get_employee_by_pin(conn: &mut SqliteConnection, pin: &str) -> Result<Option<Employee>> {
    let row_opt = sqlx::query(
        "SELECT id, name, pin, calendar_id, multi_shifts, created_at FROM employees WHERE pin = ?",
    )
    .bind(pin)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row_opt.as_ref().map(map_employee))
}

pub async fn list_employees(conn: &mut SqliteConnection) -> Result<Vec<Employee>> {
    let rows = sqlx::query(
        "SELECT id, name, pin, calendar_id, multi_shifts, created_at FROM employees ORDER BY name ASC",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.iter().map(map_employee).collect())
}

/// Primary calendar plus, for multi-shift employees, every additional one.
pub async fn get_employee_calendar_ids(
    conn: &mut SqliteConnection,
    employee: &Employee,
) -> Result<Vec<i64>> {
    let mut calendar_ids: Vec<i64> = employee.calendar_id.into_iter().collect();

    if employee.multi_shifts {
        let rows = sqlx::query(
            "SELECT calendar_id FROM employee_calendars WHERE employee_id = ? ORDER BY calendar_id ASC",
        )
        .bind(employee.id)
        .fetch_all(&mut *conn)
        .await?;

        for row in rows {
            let calendar_id: i64 = row.get("calendar_id");
            if !calendar_ids.contains(&calendar_id) {
                calendar_ids.push(calendar_id);
            }
        }
    }

    Ok(calendar_ids)
}

// Time-clock directory queries
pub async fn insert_department_if_new(
    conn: &mut SqliteConnection,
    remote_id: &str,
    name: &str,
    code: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO departments (remote_id, name, code) VALUES (?, ?, ?)",
    )
    .bind(remote_id)
    .bind(name)
    .bind(code)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn list_department_remote_ids(conn: &mut SqliteConnection) -> Result<Vec<String>> {
    let rows = sqlx::query("SELECT remote_id FROM departments ORDER BY id ASC")
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.iter().map(|row| row.get("remote_id")).collect())
}

pub async fn insert_source_employee_if_new(
    conn: &mut SqliteConnection,
    remote_id: &str,
    emp_code: &str,
    full_name: &str,
    dept_code: Option<&str>,
    hire_date: Option<NaiveDate>,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO source_employees (remote_id, emp_code, full_name, dept_code, hire_date)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(remote_id)
    .bind(emp_code)
    .bind(full_name)
    .bind(dept_code)
    .bind(hire_date)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Clock-side employees whose code matches no local employee pin.
pub async fn list_unlinked_source_employees(
    conn: &mut SqliteConnection,
) -> Result<Vec<SourceEmployee>> {
    let rows = sqlx::query(
        "SELECT se.id, se.remote_id, se.emp_code, se.full_name, se.dept_code, se.hire_date
         FROM source_employees se
         LEFT JOIN employees e ON e.pin = se.emp_code
         WHERE e.id IS NULL
         ORDER BY se.emp_code ASC",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| SourceEmployee {
            id: row.get("id"),
            remote_id: row.get("remote_id"),
            emp_code: row.get("emp_code"),
            full_name: row.get("full_name"),
            dept_code: row.get("dept_code"),
            hire_date: row.get("hire_date"),
        })
        .collect())
}

// Punch queries
fn map_punch(row: &SqliteRow) -> Result<Punch> {
    let mode: String = row.get("mode");
    Ok(Punch {
        id: row.get("id"),
        remote_id: row.get("remote_id"),
        emp_code: row.get("emp_code"),
        dept_code: row.get("dept_code"),
        att_date: row.get("att_date"),
        punched_at: row.get("punched_at"),
        punch_state: row.get("punch_state"),
        mode: mode.parse()?,
        is_settled: row.get("is_settled"),
        created_at: row.get("created_at"),
    })
}

/// Stores a punch unless one with the same remote id exists. Returns whether it was inserted.
pub async fn insert_punch_if_new(conn: &mut SqliteConnection, punch: &NewPunch) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO punches (remote_id, emp_code, dept_code, att_date, punched_at, punch_state, mode)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&punch.remote_id)
    .bind(&punch.emp_code)
    .bind(&punch.dept_code)
    .bind(punch.att_date)
    .bind(punch.punched_at)
    .bind(&punch.punch_state)
    .bind(punch.mode.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_day_punches(
    conn: &mut SqliteConnection,
    emp_code: &str,
    date: NaiveDate,
) -> Result<Vec<Punch>> {
    let rows = sqlx::query(
        "SELECT id, remote_id, emp_code, dept_code, att_date, punched_at, punch_state, mode, is_settled, created_at
         FROM punches
         WHERE emp_code = ? AND att_date = ?
         ORDER BY punched_at ASC, id ASC",
    )
    .bind(emp_code)
    .bind(date)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(map_punch).collect()
}

/// (employee, date) pairs that still have unsettled punches, oldest first.
pub async fn get_unsettled_days(
    conn: &mut SqliteConnection,
    since: Option<NaiveDate>,
    limit: usize,
) -> Result<Vec<(i64, NaiveDate)>> {
    let rows = sqlx::query(
        "SELECT e.id AS employee_id, p.att_date AS att_date
         FROM punches p
         JOIN employees e ON e.pin = p.emp_code
         WHERE p.is_settled = FALSE AND (? IS NULL OR p.att_date >= ?)
         GROUP BY e.id, p.att_date
         ORDER BY p.att_date ASC, e.id ASC
         LIMIT ?",
    )
    .bind(since)
    .bind(since)
    .bind(limit as i64)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.get("employee_id"), row.get("att_date")))
        .collect())
}

/// Unsettled punches whose employee code matches no employee.
pub async fn count_unmatched_punches(conn: &mut SqliteConnection) -> Result<i64> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total FROM punches p
         LEFT JOIN employees e ON e.pin = p.emp_code
         WHERE p.is_settled = FALSE AND e.id IS NULL",
    )
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.get("total"))
}

pub async fn set_day_punches_settled(
    conn: &mut SqliteConnection,
    emp_code: &str,
    date: NaiveDate,
    settled: bool,
) -> Result<u64> {
    let result = sqlx::query("UPDATE punches SET is_settled = ? WHERE emp_code = ? AND att_date = ?")
        .bind(settled)
        .bind(emp_code)
        .bind(date)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

// Leave queries
pub async fn create_leave_request(
    conn: &mut SqliteConnection,
    employee_id: i64,
    code: &str,
    date_from: NaiveDate,
    date_to: NaiveDate,
    hours: f64,
    state: LeaveState,
) -> Result<LeaveRequest> {
    let result = sqlx::query(
        "INSERT INTO leave_requests (employee_id, code, date_from, date_to, hours, state)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(employee_id)
    .bind(code)
    .bind(date_from)
    .bind(date_to)
    .bind(hours)
    .bind(state.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(LeaveRequest {
        id: result.last_insert_rowid(),
        employee_id,
        code: code.to_string(),
        date_from,
        date_to,
        hours,
        state,
    })
}

/// Whether a validated late/early permission covers the date.
pub async fn has_validated_permission(
    conn: &mut SqliteConnection,
    employee_id: i64,
    date: NaiveDate,
) -> Result<bool> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total FROM leave_requests
         WHERE employee_id = ? AND code = ? AND state = ? AND date_from <= ? AND date_to >= ?",
    )
    .bind(employee_id)
    .bind(PERMISSION_LEAVE_CODE)
    .bind(LeaveState::Validated.as_str())
    .bind(date)
    .bind(date)
    .fetch_one(&mut *conn)
    .await?;

    let total: i64 = row.get("total");
    Ok(total > 0)
}

pub async fn get_validated_leaves_in_period(
    conn: &mut SqliteConnection,
    employee_id: i64,
    date_from: NaiveDate,
    date_to: NaiveDate,
) -> Result<Vec<LeaveRequest>> {
    let rows = sqlx::query(
        "SELECT id, employee_id, code, date_from, date_to, hours, state FROM leave_requests
         WHERE employee_id = ? AND state = ? AND date_from <= ? AND date_to >= ?
         ORDER BY date_from ASC",
    )
    .bind(employee_id)
    .bind(LeaveState::Validated.as_str())
    .bind(date_to)
    .bind(date_from)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|row| {
            let state: String = row.get("state");
            Ok(LeaveRequest {
                id: row.get("id"),
                employee_id: row.get("employee_id"),
                code: row.get("code"),
                date_from: row.get("date_from"),
                date_to: row.get("date_to"),
                hours: row.get("hours"),
                state: state.parse()?,
            })
        })
        .collect()
}

// Attendance record queries
const RECORD_COLUMNS: &str = "r.id, r.employee_id, e.name AS employee_name, r.date, r.state, r.shift_id,
    r.check_in, r.check_out, r.in_mode, r.out_mode, r.late_hours, r.early_hours, r.late_state,
    r.early_state, r.has_permission, r.force_shift_id, r.force_check_in, r.force_check_out,
    r.force_late_hours, r.force_early_hours, r.created_at, r.updated_at";

fn map_record(row: &SqliteRow) -> Result<AttendanceRecord> {
    let state: String = row.get("state");
    let in_mode: Option<String> = row.get("in_mode");
    let out_mode: Option<String> = row.get("out_mode");

    Ok(AttendanceRecord {
        id: row.get("id"),
        employee_id: row.get("employee_id"),
        employee_name: row.get("employee_name"),
        date: row.get("date"),
        state: state.parse()?,
        shift_id: row.get("shift_id"),
        check_in: row.get("check_in"),
        check_out: row.get("check_out"),
        in_mode: in_mode.map(|m| m.parse::<PunchMode>()).transpose()?,
        out_mode: out_mode.map(|m| m.parse::<PunchMode>()).transpose()?,
        late_hours: row.get("late_hours"),
        early_hours: row.get("early_hours"),
        late_state: DeviationState::parse_opt(row.get("late_state"))?,
        early_state: DeviationState::parse_opt(row.get("early_state"))?,
        has_permission: row.get("has_permission"),
        overrides: ForceOverrides {
            shift_id: row.get("force_shift_id"),
            check_in: row.get("force_check_in"),
            check_out: row.get("force_check_out"),
            late_hours: row.get("force_late_hours"),
            early_hours: row.get("force_early_hours"),
        },
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub async fn create_attendance_record(
    conn: &mut SqliteConnection,
    employee_id: i64,
    date: NaiveDate,
) -> Result<AttendanceRecord> {
    let result = sqlx::query("INSERT INTO attendance_records (employee_id, date) VALUES (?, ?)")
        .bind(employee_id)
        .bind(date)
        .execute(&mut *conn)
        .await?;

    let record_id = result.last_insert_rowid();
    get_attendance_record(conn, record_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Attendance record {} vanished after insert", record_id))
}

pub async fn get_attendance_record(
    conn: &mut SqliteConnection,
    record_id: i64,
) -> Result<Option<AttendanceRecord>> {
    let sql = format!(
        "SELECT {} FROM attendance_records r JOIN employees e ON e.id = r.employee_id WHERE r.id = ?",
        RECORD_COLUMNS
    );
    let row_opt = sqlx::query(&sql)
        .bind(record_id)
        .fetch_optional(&mut *conn)
        .await?;

    row_opt.as_ref().map(map_record).transpose()
}

pub async fn get_attendance_record_for_day(
    conn: &mut SqliteConnection,
    employee_id: i64,
    date: NaiveDate,
) -> Result<Option<AttendanceRecord>> {
    let sql = format!(
        "SELECT {} FROM attendance_records r JOIN employees e ON e.id = r.employee_id
         WHERE r.employee_id = ? AND r.date = ?",
        RECORD_COLUMNS
    );
    let row_opt = sqlx::query(&sql)
        .bind(employee_id)
        .bind(date)
        .fetch_optional(&mut *conn)
        .await?;

    row_opt.as_ref().map(map_record).transpose()
}

pub async fn get_attendance_records_by_date_range(
    conn: &mut SqliteConnection,
    employee_id: Option<i64>,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Vec<AttendanceRecord>> {
    let sql = format!(
        "SELECT {} FROM attendance_records r JOIN employees e ON e.id = r.employee_id
         WHERE (? IS NULL OR r.employee_id = ?) AND r.date >= ? AND r.date <= ?
         ORDER BY r.date ASC, e.name ASC",
        RECORD_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(employee_id)
        .bind(employee_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(map_record).collect()
}

pub async fn save_day_computation(
    conn: &mut SqliteConnection,
    record_id: i64,
    computation: &DayComputation,
) -> Result<()> {
    sqlx::query(
        "UPDATE attendance_records
         SET state = ?, shift_id = ?, check_in = ?, check_out = ?, in_mode = ?, out_mode = ?,
             late_hours = ?, early_hours = ?, late_state = ?, early_state = ?, has_permission = ?,
             updated_at = CURRENT_TIMESTAMP
         WHERE id = ?",
    )
    .bind(computation.state.as_str())
    .bind(computation.shift_id)
    .bind(computation.check_in)
    .bind(computation.check_out)
    .bind(computation.in_mode.map(|m| m.as_str()))
    .bind(computation.out_mode.map(|m| m.as_str()))
    .bind(computation.late_hours)
    .bind(computation.early_hours)
    .bind(computation.late_state.map(|s| s.as_str()))
    .bind(computation.early_state.map(|s| s.as_str()))
    .bind(computation.has_permission)
    .bind(record_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn update_record_state(
    conn: &mut SqliteConnection,
    record_id: i64,
    state: RecordState,
) -> Result<()> {
    sqlx::query(
        "UPDATE attendance_records SET state = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(state.as_str())
    .bind(record_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn update_deviation(
    conn: &mut SqliteConnection,
    record_id: i64,
    kind: DeviationKind,
    state: Option<DeviationState>,
    hours: f64,
) -> Result<()> {
    let sql = match kind {
        DeviationKind::Late => {
            "UPDATE attendance_records SET late_state = ?, late_hours = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?"
        }
        DeviationKind::Early => {
            "UPDATE attendance_records SET early_state = ?, early_hours = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?"
        }
    };

    sqlx::query(sql)
        .bind(state.map(|s| s.as_str()))
        .bind(hours)
        .bind(record_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn update_has_permission(
    conn: &mut SqliteConnection,
    record_id: i64,
    has_permission: bool,
) -> Result<()> {
    sqlx::query("UPDATE attendance_records SET has_permission = ? WHERE id = ?")
        .bind(has_permission)
        .bind(record_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn update_force_overrides(
    conn: &mut SqliteConnection,
    record_id: i64,
    overrides: &ForceOverrides,
) -> Result<()> {
    sqlx::query(
        "UPDATE attendance_records
         SET force_shift_id = ?, force_check_in = ?, force_check_out = ?, force_late_hours = ?,
             force_early_hours = ?, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?",
    )
    .bind(overrides.shift_id)
    .bind(overrides.check_in)
    .bind(overrides.check_out)
    .bind(overrides.late_hours)
    .bind(overrides.early_hours)
    .bind(record_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn delete_attendance_record(conn: &mut SqliteConnection, record_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM audit_notes WHERE record_id = ?")
        .bind(record_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM attendance_records WHERE id = ?")
        .bind(record_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

// Audit trail
pub async fn add_audit_note(conn: &mut SqliteConnection, record_id: i64, body: &str) -> Result<()> {
    sqlx::query("INSERT INTO audit_notes (record_id, body) VALUES (?, ?)")
        .bind(record_id)
        .bind(body)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn get_audit_notes(conn: &mut SqliteConnection, record_id: i64) -> Result<Vec<AuditNote>> {
    let rows = sqlx::query(
        "SELECT id, record_id, body, created_at FROM audit_notes WHERE record_id = ? ORDER BY id ASC",
    )
    .bind(record_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| AuditNote {
            id: row.get("id"),
            record_id: row.get("record_id"),
            body: row.get("body"),
            created_at: row.get("created_at"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;
    use chrono::Utc;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn attendance_record_is_unique_per_employee_and_day() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let employee = create_employee(&mut conn, "Mona", "100", None, false).await.unwrap();

        create_attendance_record(&mut conn, employee.id, date(2025, 7, 28)).await.unwrap();
        let duplicate = create_attendance_record(&mut conn, employee.id, date(2025, 7, 28)).await;

        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn punches_are_deduplicated_by_remote_id() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let punch = NewPunch {
            remote_id: Some("77".to_string()),
            emp_code: "100".to_string(),
            dept_code: None,
            att_date: date(2025, 7, 28),
            punched_at: Utc::now(),
            punch_state: Some("0".to_string()),
            mode: PunchMode::Automatic,
        };

        assert!(insert_punch_if_new(&mut conn, &punch).await.unwrap());
        assert!(!insert_punch_if_new(&mut conn, &punch).await.unwrap());

        let manual = NewPunch {
            remote_id: None,
            mode: PunchMode::Manual,
            ..punch
        };
        assert!(insert_punch_if_new(&mut conn, &manual).await.unwrap());
        assert!(insert_punch_if_new(&mut conn, &manual).await.unwrap());
        assert_eq!(get_day_punches(&mut conn, "100", date(2025, 7, 28)).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn multi_shift_employee_collects_additional_calendars() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let day = create_calendar(&mut conn, "Day", 8.0).await.unwrap();
        let night = create_calendar(&mut conn, "Night", 8.0).await.unwrap();
        create_shift(&mut conn, day.id, "", 0, time(9, 0), time(17, 0)).await.unwrap();
        create_shift(&mut conn, night.id, "", 0, time(17, 0), time(1, 0)).await.unwrap();

        let single = create_employee(&mut conn, "Ali", "1", Some(day.id), false).await.unwrap();
        add_employee_calendar(&mut conn, single.id, night.id).await.unwrap();
        let multi = create_employee(&mut conn, "Sara", "2", Some(day.id), true).await.unwrap();
        add_employee_calendar(&mut conn, multi.id, night.id).await.unwrap();

        assert_eq!(get_employee_calendar_ids(&mut conn, &single).await.unwrap(), vec![day.id]);
        let ids = get_employee_calendar_ids(&mut conn, &multi).await.unwrap();
        assert_eq!(ids, vec![day.id, night.id]);

        let shifts = get_shifts_for_calendars(&mut conn, &ids, 0).await.unwrap();
        assert_eq!(shifts.len(), 2);
        assert_eq!(shifts[0].start_time, time(9, 0));
        assert!(shifts[1].is_overnight());
        assert!(get_shifts_for_calendars(&mut conn, &ids, 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn permission_must_be_validated_and_cover_the_date() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let employee = create_employee(&mut conn, "Mona", "100", None, false).await.unwrap();

        create_leave_request(
            &mut conn,
            employee.id,
            PERMISSION_LEAVE_CODE,
            date(2025, 7, 28),
            date(2025, 7, 29),
            2.0,
            LeaveState::Draft,
        )
        .await
        .unwrap();
        assert!(!has_validated_permission(&mut conn, employee.id, date(2025, 7, 28)).await.unwrap());

        create_leave_request(
            &mut conn,
            employee.id,
            PERMISSION_LEAVE_CODE,
            date(2025, 7, 28),
            date(2025, 7, 29),
            2.0,
            LeaveState::Validated,
        )
        .await
        .unwrap();
        assert!(has_validated_permission(&mut conn, employee.id, date(2025, 7, 29)).await.unwrap());
        assert!(!has_validated_permission(&mut conn, employee.id, date(2025, 7, 30)).await.unwrap());
    }
}
