use crate::commands::{AppContext, date_arg, time_arg};
use crate::database::models::{DeviationKind, ForceOverrides};
use crate::database::queries;
use crate::error::ActionError;
use crate::utils::format::{
    format_record_detail, format_record_line, format_records_list, format_success_message,
};
use crate::utils::time::get_current_date;
use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use clap::{Subcommand, ValueEnum};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviationArg {
    Late,
    Early,
}

impl From<DeviationArg> for DeviationKind {
    fn from(arg: DeviationArg) -> Self {
        match arg {
            DeviationArg::Late => DeviationKind::Late,
            DeviationArg::Early => DeviationKind::Early,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum DayCommand {
    /// Show one attendance day with its history
    Show { record_id: i64 },

    /// List attendance days (defaults to today)
    List {
        #[arg(long, value_parser = date_arg)]
        from: Option<NaiveDate>,

        #[arg(long, value_parser = date_arg)]
        to: Option<NaiveDate>,

        #[arg(long)]
        pin: Option<String>,
    },

    /// Approve a flagged late check-in or early check-out
    Approve {
        record_id: i64,
        #[arg(value_enum)]
        kind: DeviationArg,
    },

    /// Withdraw an approval
    Cancel {
        record_id: i64,
        #[arg(value_enum)]
        kind: DeviationArg,
    },

    /// Replace the manual overrides of a day and recompute it
    Force {
        record_id: i64,

        /// Shift to use instead of the matched one
        #[arg(long)]
        shift: Option<i64>,

        #[arg(long, value_parser = time_arg)]
        check_in: Option<NaiveTime>,

        #[arg(long, value_parser = time_arg)]
        check_out: Option<NaiveTime>,

        #[arg(long)]
        late_hours: Option<f64>,

        #[arg(long)]
        early_hours: Option<f64>,

        /// Remove every override
        #[arg(
            long,
            conflicts_with_all = ["shift", "check_in", "check_out", "late_hours", "early_hours"]
        )]
        clear: bool,
    },

    /// Refresh the link to an approved late/early permission
    Recheck { record_id: i64 },

    /// Delete a day and release its punches
    Delete { record_id: i64 },
}

pub async fn day(ctx: &AppContext, command: DayCommand) -> Result<()> {
    let offset = ctx.config.local_offset;
    let actions = ctx.day_actions();

    match command {
        DayCommand::Show { record_id } => {
            let mut conn = ctx.pool.acquire().await?;
            let record = queries::get_attendance_record(&mut conn, record_id)
                .await?
                .ok_or(ActionError::RecordNotFound(record_id))?;
            let shift = match record.shift_id {
                Some(shift_id) => queries::get_shift_by_id(&mut conn, shift_id).await?,
                None => None,
            };
            let notes = queries::get_audit_notes(&mut conn, record_id).await?;
            println!("{}", format_record_detail(&record, shift.as_ref(), &notes, offset));
        }
        DayCommand::List { from, to, pin } => {
            let today = get_current_date(offset);
            let from = from.unwrap_or(today);
            let to = to.unwrap_or(from.max(today));

            let mut conn = ctx.pool.acquire().await?;
            let employee_id = match pin {
                Some(pin) => Some(
                    queries::get_employee_by_pin(&mut conn, &pin)
                        .await?
                        .ok_or_else(|| anyhow::anyhow!("No employee with pin {}", pin))?
                        .id,
                ),
                None => None,
            };
            let records =
                queries::get_attendance_records_by_date_range(&mut conn, employee_id, from, to).await?;
            println!("{}", format_records_list(&records, offset));
        }
        DayCommand::Approve { record_id, kind } => {
            let record = actions.approve(&ctx.actor, record_id, kind.into()).await?;
            println!("{}", format_success_message(&format_record_line(&record, offset)));
        }
        DayCommand::Cancel { record_id, kind } => {
            let record = actions.cancel(&ctx.actor, record_id, kind.into()).await?;
            println!("{}", format_success_message(&format_record_line(&record, offset)));
        }
        DayCommand::Force {
            record_id,
            shift,
            check_in,
            check_out,
            late_hours,
            early_hours,
            clear,
        } => {
            let overrides = if clear {
                ForceOverrides::default()
            } else {
                ForceOverrides {
                    shift_id: shift,
                    check_in,
                    check_out,
                    late_hours,
                    early_hours,
                }
            };
            if overrides.is_empty() && !clear {
                return Err(anyhow::anyhow!("Nothing to force; pass an override or --clear"));
            }
            let record = actions.force(&ctx.actor, record_id, overrides).await?;
            println!("{}", format_success_message(&format_record_line(&record, offset)));
        }
        DayCommand::Recheck { record_id } => {
            let record = actions.recheck(&ctx.actor, record_id).await?;
            println!("{}", format_success_message(&format_record_line(&record, offset)));
        }
        DayCommand::Delete { record_id } => {
            let released = actions.delete(&ctx.actor, record_id).await?;
            println!(
                "{}",
                format_success_message(&format!(
                    "Attendance record {} deleted, {} punches released for the next link",
                    record_id, released
                ))
            );
        }
    }
    Ok(())
}
