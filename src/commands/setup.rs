use crate::commands::{AppContext, date_arg, time_arg};
use crate::database::models::{LeaveState, NewPunch, PERMISSION_LEAVE_CODE, PunchMode};
use crate::database::queries;
use crate::utils::format::{format_employee_line, format_success_message};
use crate::utils::time::{local_to_utc, parse_local_datetime};
use crate::utils::validation::{validate_date_range, validate_day_of_week};
use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use clap::Subcommand;
use sqlx::SqliteConnection;
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum CalendarCommand {
    /// Create a calendar
    Add {
        name: String,
        #[arg(long, default_value = "8")]
        hours_per_day: f64,
    },
}

#[derive(Subcommand, Debug)]
pub enum ShiftCommand {
    /// Add a shift; an end not after the start means it ends the next day
    Add {
        #[arg(long)]
        calendar: String,
        /// mon..sun or 0..6
        #[arg(long)]
        day: String,
        #[arg(long, value_parser = time_arg)]
        start: NaiveTime,
        #[arg(long, value_parser = time_arg)]
        end: NaiveTime,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// List the shifts of a calendar
    List {
        #[arg(long)]
        calendar: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum EmployeeCommand {
    /// Create an employee
    Add {
        name: String,
        /// Badge code used by the time clock
        #[arg(long)]
        pin: String,
        /// Primary calendar
        #[arg(long)]
        calendar: Option<String>,
        /// Also match shifts of the additional calendars
        #[arg(long)]
        multi_shifts: bool,
        /// Additional calendar (repeatable)
        #[arg(long = "extra-calendar")]
        extra_calendars: Vec<String>,
    },
    /// List employees
    List,
}

#[derive(Subcommand, Debug)]
pub enum LeaveCommand {
    /// Record a leave request
    Add {
        #[arg(long)]
        pin: String,
        #[arg(long, value_parser = date_arg)]
        from: NaiveDate,
        #[arg(long, value_parser = date_arg)]
        to: NaiveDate,
        #[arg(long, default_value = "0")]
        hours: f64,
        /// Leave type code; LATE is a late/early permission
        #[arg(long, default_value = PERMISSION_LEAVE_CODE)]
        code: String,
        /// draft, validate or refuse
        #[arg(long, default_value = "validate")]
        state: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum PunchCommand {
    /// Add a manual punch ("YYYY-MM-DD HH:MM", local time)
    Add {
        #[arg(long)]
        pin: String,
        #[arg(long)]
        at: String,
    },
}

async fn calendar_id_by_name(conn: &mut SqliteConnection, name: &str) -> Result<i64> {
    queries::get_calendar_by_name(conn, name)
        .await?
        .map(|c| c.id)
        .ok_or_else(|| anyhow::anyhow!("Calendar '{}' not found", name))
}

pub async fn calendar(ctx: &AppContext, command: CalendarCommand) -> Result<()> {
    let mut conn = ctx.pool.acquire().await?;
    match command {
        CalendarCommand::Add { name, hours_per_day } => {
            let calendar = queries::create_calendar(&mut conn, &name, hours_per_day).await?;
            info!("Calendar '{}' created with id {}", calendar.name, calendar.id);
            println!("{}", format_success_message(&format!("Calendar #{} {}", calendar.id, calendar.name)));
        }
    }
    Ok(())
}

pub async fn shift(ctx: &AppContext, command: ShiftCommand) -> Result<()> {
    let mut conn = ctx.pool.acquire().await?;
    match command {
        ShiftCommand::Add {
            calendar,
            day,
            start,
            end,
            name,
        } => {
            let calendar_id = calendar_id_by_name(&mut conn, &calendar).await?;
            let day_of_week = validate_day_of_week(&day)?;
            let shift = queries::create_shift(&mut conn, calendar_id, &name, day_of_week, start, end).await?;
            println!("{}", format_success_message(&format!("Shift #{} {}", shift.id, shift.display_name())));
        }
        ShiftCommand::List { calendar } => {
            let calendar_id = calendar_id_by_name(&mut conn, &calendar).await?;
            for shift in queries::list_shifts(&mut conn, calendar_id).await? {
                let weekday = shift
                    .weekday()
                    .map(|w| w.to_string())
                    .unwrap_or_else(|| shift.day_of_week.to_string());
                println!("#{} {} {}", shift.id, weekday, shift.display_name());
            }
        }
    }
    Ok(())
}

pub async fn employee(ctx: &AppContext, command: EmployeeCommand) -> Result<()> {
    match command {
        EmployeeCommand::Add {
            name,
            pin,
            calendar,
            multi_shifts,
            extra_calendars,
        } => {
            let mut tx = ctx.pool.begin().await?;
            let calendar_id = match calendar {
                Some(calendar) => Some(calendar_id_by_name(&mut tx, &calendar).await?),
                None => None,
            };
            let employee = queries::create_employee(&mut tx, &name, &pin, calendar_id, multi_shifts).await?;
            for extra in &extra_calendars {
                let extra_id = calendar_id_by_name(&mut tx, extra).await?;
                queries::add_employee_calendar(&mut tx, employee.id, extra_id).await?;
            }
            tx.commit().await?;
            println!("{}", format_success_message(&format_employee_line(&employee)));
        }
        EmployeeCommand::List => {
            let mut conn = ctx.pool.acquire().await?;
            for employee in queries::list_employees(&mut conn).await? {
                println!("{}", format_employee_line(&employee));
            }
        }
    }
    Ok(())
}

pub async fn leave(ctx: &AppContext, command: LeaveCommand) -> Result<()> {
    let mut conn = ctx.pool.acquire().await?;
    match command {
        LeaveCommand::Add {
            pin,
            from,
            to,
            hours,
            code,
            state,
        } => {
            validate_date_range(from, to)?;
            let state: LeaveState = state.parse()?;
            let employee = queries::get_employee_by_pin(&mut conn, &pin)
                .await?
                .ok_or_else(|| anyhow::anyhow!("No employee with pin {}", pin))?;
            let leave =
                queries::create_leave_request(&mut conn, employee.id, &code, from, to, hours, state).await?;
            println!(
                "{}",
                format_success_message(&format!(
                    "Leave #{} {} {}..{} ({}) for {}",
                    leave.id,
                    leave.code,
                    leave.date_from,
                    leave.date_to,
                    leave.state.as_str(),
                    employee.name
                ))
            );
        }
    }
    Ok(())
}

/// Manual punches join the device punches of the day and are linked the same way.
pub async fn punch(ctx: &AppContext, command: PunchCommand) -> Result<()> {
    let mut conn = ctx.pool.acquire().await?;
    match command {
        PunchCommand::Add { pin, at } => {
            let employee = queries::get_employee_by_pin(&mut conn, &pin)
                .await?
                .ok_or_else(|| anyhow::anyhow!("No employee with pin {}", pin))?;
            let local = parse_local_datetime(&at)?;
            let punch = NewPunch {
                remote_id: None,
                emp_code: employee.pin.clone(),
                dept_code: None,
                att_date: local.date(),
                punched_at: local_to_utc(local, ctx.config.local_offset),
                punch_state: None,
                mode: PunchMode::Manual,
            };
            queries::insert_punch_if_new(&mut conn, &punch).await?;
            info!("{} added a manual punch for {} at {}", ctx.actor, employee.name, local);
            println!(
                "{}",
                format_success_message(&format!("Manual punch for {} at {}", employee.name, local.format("%Y-%m-%d %H:%M")))
            );
        }
    }
    Ok(())
}
