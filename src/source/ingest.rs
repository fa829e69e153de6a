use crate::database::models::{NewPunch, PunchMode};
use crate::database::queries;
use crate::source::payloads::RemoteTransaction;
use crate::source::{PunchSource, TransactionQuery};
use crate::utils::time::{combine_date_time_local, parse_date_string, parse_time_string};
use anyhow::Result;
use chrono::{FixedOffset, NaiveDate};
use sqlx::SqlitePool;
use tracing::{info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EmployeeSyncReport {
    pub fetched: usize,
    pub new_source_employees: usize,
    pub created_employees: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PunchSyncReport {
    pub fetched: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

/// Stores departments not seen before. Returns how many were new.
pub async fn sync_departments(source: &dyn PunchSource, pool: &SqlitePool) -> Result<usize> {
    let departments = source.departments().await?;
    if departments.is_empty() {
        warn!("Punch source returned no departments");
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut inserted = 0;
    for department in &departments {
        if queries::insert_department_if_new(&mut tx, &department.id, &department.dept_name, &department.dept_code)
            .await?
        {
            inserted += 1;
        }
    }
    tx.commit().await?;

    info!("Departments synced: {} fetched, {} new", departments.len(), inserted);
    Ok(inserted)
}

/// Stores the clock's employee directory and optionally creates local
/// employees for codes that match no employee pin.
pub async fn sync_source_employees(
    source: &dyn PunchSource,
    pool: &SqlitePool,
    create_missing: bool,
) -> Result<EmployeeSyncReport> {
    let employees = source.employees().await?;
    let mut report = EmployeeSyncReport {
        fetched: employees.len(),
        ..EmployeeSyncReport::default()
    };

    let mut tx = pool.begin().await?;
    for employee in &employees {
        let hire_date = employee
            .hire_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
        let dept_code = employee.department.as_ref().map(|d| d.dept_code.as_str());

        if queries::insert_source_employee_if_new(
            &mut tx,
            &employee.id,
            &employee.emp_code,
            &employee.full_name,
            dept_code,
            hire_date,
        )
        .await?
        {
            report.new_source_employees += 1;
        }
    }

    if create_missing {
        for unlinked in queries::list_unlinked_source_employees(&mut tx).await? {
            let name = if unlinked.full_name.trim().is_empty() {
                unlinked.emp_code.clone()
            } else {
                unlinked.full_name.clone()
            };
            queries::create_employee(&mut tx, &name, &unlinked.emp_code, None, false).await?;
            report.created_employees += 1;
        }
    }
    tx.commit().await?;

    info!(
        "Employees synced: {} fetched, {} new, {} local employees created",
        report.fetched, report.new_source_employees, report.created_employees
    );
    Ok(report)
}

fn to_new_punch(transaction: &RemoteTransaction, offset: FixedOffset) -> Result<NewPunch> {
    let att_date = parse_date_string(transaction.att_date.trim())?;
    let punch_time = parse_time_string(transaction.punch_time.trim())?;

    Ok(NewPunch {
        remote_id: Some(transaction.id.clone()),
        emp_code: transaction.emp_code.trim().to_string(),
        dept_code: transaction.dept_code.clone(),
        att_date,
        punched_at: combine_date_time_local(att_date, punch_time, offset),
        punch_state: transaction.punch_state.clone(),
        mode: PunchMode::Automatic,
    })
}

/// Fetches punches in the window and stores the ones not seen before.
///
/// Without an explicit department filter every known department is requested.
/// A source failure aborts the whole sync so the next run retries it.
pub async fn sync_punches(
    source: &dyn PunchSource,
    pool: &SqlitePool,
    start_date: NaiveDate,
    end_date: NaiveDate,
    departments: Option<Vec<String>>,
    employees: Vec<String>,
    offset: FixedOffset,
) -> Result<PunchSyncReport> {
    let departments = match departments {
        Some(departments) => departments,
        None => {
            let mut conn = pool.acquire().await?;
            queries::list_department_remote_ids(&mut conn).await?
        }
    };

    let query = TransactionQuery {
        start_date,
        end_date,
        departments,
        employees,
    };
    let transactions = source.transactions(&query).await?;

    let mut report = PunchSyncReport {
        fetched: transactions.len(),
        ..PunchSyncReport::default()
    };

    let mut tx = pool.begin().await?;
    for transaction in &transactions {
        let punch = match to_new_punch(transaction, offset) {
            Ok(punch) => punch,
            Err(e) => {
                warn!("Skipping punch {} for {}: {}", transaction.id, transaction.emp_code, e);
                report.skipped += 1;
                continue;
            }
        };

        if queries::insert_punch_if_new(&mut tx, &punch).await? {
            report.inserted += 1;
        } else {
            report.duplicates += 1;
        }
    }
    tx.commit().await?;

    info!(
        "Punches synced for {}..{}: {} fetched, {} new, {} already stored, {} skipped",
        start_date, end_date, report.fetched, report.inserted, report.duplicates, report.skipped
    );
    Ok(report)
}
