use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    create_calendars_table(pool).await?;
    create_shifts_table(pool).await?;
    create_employees_table(pool).await?;
    create_employee_calendars_table(pool).await?;
    create_departments_table(pool).await?;
    create_source_employees_table(pool).await?;
    create_punches_table(pool).await?;
    create_leave_requests_table(pool).await?;
    create_attendance_records_table(pool).await?;
    create_audit_notes_table(pool).await?;

    info!("Database migrations completed successfully");
    Ok(())
}

async fn create_calendars_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS calendars (
            id INTEGER PRIMARY KEY,
            name TEXT UNIQUE NOT NULL,
            hours_per_day REAL NOT NULL DEFAULT 8.0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_shifts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS shifts (
            id INTEGER PRIMARY KEY,
            calendar_id INTEGER NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            day_of_week INTEGER NOT NULL CHECK (day_of_week BETWEEN 0 AND 6),
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            FOREIGN KEY (calendar_id) REFERENCES calendars (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_employees_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS employees (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            pin TEXT UNIQUE NOT NULL,
            calendar_id INTEGER,
            multi_shifts BOOLEAN NOT NULL DEFAULT FALSE,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (calendar_id) REFERENCES calendars (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_employee_calendars_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS employee_calendars (
            employee_id INTEGER NOT NULL,
            calendar_id INTEGER NOT NULL,
            PRIMARY KEY (employee_id, calendar_id),
            FOREIGN KEY (employee_id) REFERENCES employees (id),
            FOREIGN KEY (calendar_id) REFERENCES calendars (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_departments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS departments (
            id INTEGER PRIMARY KEY,
            remote_id TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            code TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_source_employees_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS source_employees (
            id INTEGER PRIMARY KEY,
            remote_id TEXT UNIQUE NOT NULL,
            emp_code TEXT NOT NULL,
            full_name TEXT NOT NULL,
            dept_code TEXT,
            hire_date DATE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_punches_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS punches (
            id INTEGER PRIMARY KEY,
            remote_id TEXT UNIQUE,
            emp_code TEXT NOT NULL,
            dept_code TEXT,
            att_date DATE NOT NULL,
            punched_at DATETIME NOT NULL,
            punch_state TEXT,
            mode TEXT NOT NULL CHECK (mode IN ('manual', 'automatic', 'technical')),
            is_settled BOOLEAN NOT NULL DEFAULT FALSE,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_punches_code_date ON punches (emp_code, att_date)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_leave_requests_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS leave_requests (
            id INTEGER PRIMARY KEY,
            employee_id INTEGER NOT NULL,
            code TEXT NOT NULL,
            date_from DATE NOT NULL,
            date_to DATE NOT NULL,
            hours REAL NOT NULL DEFAULT 0,
            state TEXT NOT NULL CHECK (state IN ('draft', 'validate', 'refuse')),
            FOREIGN KEY (employee_id) REFERENCES employees (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_attendance_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance_records (
            id INTEGER PRIMARY KEY,
            employee_id INTEGER NOT NULL,
            date DATE NOT NULL,
            state TEXT NOT NULL DEFAULT 'draft',
            shift_id INTEGER,
            check_in DATETIME,
            check_out DATETIME,
            in_mode TEXT,
            out_mode TEXT,
            late_hours REAL NOT NULL DEFAULT 0,
            early_hours REAL NOT NULL DEFAULT 0,
            late_state TEXT CHECK (late_state IN ('flagged', 'approved')),
            early_state TEXT CHECK (early_state IN ('flagged', 'approved')),
            has_permission BOOLEAN NOT NULL DEFAULT FALSE,
            force_shift_id INTEGER,
            force_check_in TEXT,
            force_check_out TEXT,
            force_late_hours REAL,
            force_early_hours REAL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (employee_id, date),
            FOREIGN KEY (employee_id) REFERENCES employees (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_audit_notes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_notes (
            id INTEGER PRIMARY KEY,
            record_id INTEGER NOT NULL,
            body TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (record_id) REFERENCES attendance_records (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
