use crate::commands::{AppContext, date_arg, period_arg};
use crate::database::queries;
use crate::engine::authorization::Capability;
use crate::source::ingest::{sync_departments, sync_punches, sync_source_employees};
use crate::utils::format::{format_batch_report, format_info_message, format_success_message};
use crate::utils::period::{DatePeriod, resolve_window};
use crate::utils::time::get_current_date;
use anyhow::Result;
use chrono::NaiveDate;
use clap::Subcommand;
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum SyncCommand {
    /// Pull the department list
    Departments,

    /// Pull the clock's employee directory
    Employees {
        /// Create local employees for clock codes that match no pin
        #[arg(long)]
        create_missing: bool,
    },

    /// Pull punches for a window (default yesterday..today)
    Punches {
        /// today, yesterday, this-week, last-week, this-month, last-month
        #[arg(long, value_parser = period_arg)]
        period: Option<DatePeriod>,

        #[arg(long, value_parser = date_arg)]
        from: Option<NaiveDate>,

        #[arg(long, value_parser = date_arg)]
        to: Option<NaiveDate>,

        /// Department remote ids (defaults to every synced department)
        #[arg(long, value_delimiter = ',')]
        departments: Vec<String>,

        /// Employee remote ids (defaults to all)
        #[arg(long, value_delimiter = ',')]
        employees: Vec<String>,
    },
}

pub async fn setup(ctx: &AppContext, create_missing: bool) -> Result<()> {
    ctx.authorize(Capability::Sync)?;
    let source = ctx.punch_source()?;

    let departments = sync_departments(&source, &ctx.pool).await?;
    let employees = sync_source_employees(&source, &ctx.pool, create_missing).await?;

    println!(
        "{}",
        format_success_message(&format!(
            "Setup done: {} new departments, {} of {} clock employees new, {} local employees created",
            departments, employees.new_source_employees, employees.fetched, employees.created_employees
        ))
    );
    Ok(())
}

pub async fn sync(ctx: &AppContext, command: SyncCommand) -> Result<()> {
    ctx.authorize(Capability::Sync)?;
    let source = ctx.punch_source()?;

    match command {
        SyncCommand::Departments => {
            let inserted = sync_departments(&source, &ctx.pool).await?;
            println!("{}", format_success_message(&format!("{} new departments", inserted)));
        }
        SyncCommand::Employees { create_missing } => {
            let report = sync_source_employees(&source, &ctx.pool, create_missing).await?;
            println!(
                "{}",
                format_success_message(&format!(
                    "{} clock employees fetched, {} new, {} local employees created",
                    report.fetched, report.new_source_employees, report.created_employees
                ))
            );
        }
        SyncCommand::Punches {
            period,
            from,
            to,
            departments,
            employees,
        } => {
            let today = get_current_date(ctx.config.local_offset);
            let (start, end) = resolve_window(period, from, to, today)?;
            let departments = if departments.is_empty() { None } else { Some(departments) };

            let report = sync_punches(
                &source,
                &ctx.pool,
                start,
                end,
                departments,
                employees,
                ctx.config.local_offset,
            )
            .await?;
            println!(
                "{}",
                format_success_message(&format!(
                    "Punches {}..{}: {} fetched, {} new, {} already stored, {} skipped",
                    start, end, report.fetched, report.inserted, report.duplicates, report.skipped
                ))
            );
        }
    }
    Ok(())
}

pub async fn link(ctx: &AppContext, since: Option<NaiveDate>, limit: Option<usize>) -> Result<()> {
    ctx.authorize(Capability::Reconcile)?;

    let since = since.or(ctx.config.sync_start_date);
    let limit = limit.unwrap_or(ctx.config.link_batch_limit);
    let report = ctx.reconciler().link(since, limit).await?;

    if report.items.is_empty() {
        println!("{}", format_info_message("No unsettled punches to link"));
    } else {
        println!("{}", format_batch_report("Link", &report));
    }
    Ok(())
}

pub async fn reconcile(ctx: &AppContext, from: NaiveDate, to: NaiveDate, pin: Option<String>) -> Result<()> {
    ctx.authorize(Capability::Reconcile)?;

    let employee_id = match pin {
        Some(pin) => {
            let mut conn = ctx.pool.acquire().await?;
            let employee = queries::get_employee_by_pin(&mut conn, &pin)
                .await?
                .ok_or_else(|| anyhow::anyhow!("No employee with pin {}", pin))?;
            Some(employee.id)
        }
        None => None,
    };

    info!("{} requested reconcile of {}..{}", ctx.actor, from, to);
    let report = ctx.reconciler().reconcile_range(from, to, employee_id).await?;
    println!("{}", format_batch_report("Reconcile", &report));
    Ok(())
}
