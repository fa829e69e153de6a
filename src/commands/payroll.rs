use crate::commands::{AppContext, date_arg};
use crate::database::queries;
use crate::engine::payroll::{PayrollSummary, payroll_summary};
use crate::utils::format::format_payroll_summary;
use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;

#[derive(Args, Debug)]
pub struct PayrollArgs {
    /// Only this employee (defaults to everyone)
    #[arg(long)]
    pub pin: Option<String>,

    #[arg(long, value_parser = date_arg)]
    pub from: NaiveDate,

    #[arg(long, value_parser = date_arg)]
    pub to: NaiveDate,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

pub async fn payroll(ctx: &AppContext, args: PayrollArgs) -> Result<()> {
    let mut conn = ctx.pool.acquire().await?;

    let employees = match &args.pin {
        Some(pin) => vec![
            queries::get_employee_by_pin(&mut conn, pin)
                .await?
                .ok_or_else(|| anyhow::anyhow!("No employee with pin {}", pin))?,
        ],
        None => queries::list_employees(&mut conn).await?,
    };

    let mut summaries: Vec<PayrollSummary> = Vec::with_capacity(employees.len());
    for employee in &employees {
        summaries.push(payroll_summary(&mut conn, employee.id, args.from, args.to).await?);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        let blocks: Vec<String> = summaries.iter().map(format_payroll_summary).collect();
        println!("{}", blocks.join("\n\n"));
    }
    Ok(())
}
