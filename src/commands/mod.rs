pub mod days;
pub mod payroll;
pub mod schedule;
pub mod setup;
pub mod sync;

use crate::config::Config;
use crate::database;
use crate::engine::approval::DayActions;
use crate::engine::authorization::{Authorizer, Capability, GroupAuthorizer};
use crate::engine::reconciler::Reconciler;
use crate::error::ActionError;
use crate::source::client::ZkClient;
use crate::utils::period::DatePeriod;
use crate::utils::time::{parse_date_string, parse_time_string};
use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Reconciles time-clock punches into attendance days and tracks deviations.
#[derive(Parser, Debug)]
#[command(name = "attendance-deviation")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// User performing the action (defaults to $USER). This is an identity
    /// claim checked against the manager/officer lists, not authentication.
    #[arg(long = "as", global = true)]
    pub actor: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// First setup: pull departments and employees from the punch source
    Setup {
        /// Create local employees for clock codes that match no pin
        #[arg(long)]
        create_missing: bool,
    },

    /// Working-time calendars
    #[command(subcommand)]
    Calendar(setup::CalendarCommand),

    /// Shifts of a calendar
    #[command(subcommand)]
    Shift(setup::ShiftCommand),

    /// Local employees
    #[command(subcommand)]
    Employee(setup::EmployeeCommand),

    /// Leave requests, including late/early permissions
    #[command(subcommand)]
    Leave(setup::LeaveCommand),

    /// Manually entered punches
    #[command(subcommand)]
    Punch(setup::PunchCommand),

    /// Pull data from the punch source
    #[command(subcommand)]
    Sync(sync::SyncCommand),

    /// Reconcile days that still have unsettled punches
    Link {
        /// Ignore punches before this date (defaults to SYNC_START_DATE)
        #[arg(long, value_parser = date_arg)]
        since: Option<NaiveDate>,

        /// Maximum number of employee days (defaults to LINK_BATCH_LIMIT)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Recompute existing attendance days
    Reconcile {
        #[arg(long, value_parser = date_arg)]
        from: NaiveDate,

        #[arg(long, value_parser = date_arg)]
        to: NaiveDate,

        /// Only this employee pin
        #[arg(long)]
        pin: Option<String>,
    },

    /// Inspect and act on single attendance days
    #[command(subcommand)]
    Day(days::DayCommand),

    /// Attendance figures for payroll
    Payroll(payroll::PayrollArgs),

    /// Run sync and link periodically
    Schedule(schedule::ScheduleArgs),
}

/// Shared state handed to every command.
#[derive(Clone)]
pub struct AppContext {
    pub pool: SqlitePool,
    pub config: Config,
    pub authorizer: Arc<dyn Authorizer>,
    pub actor: String,
}

impl AppContext {
    pub async fn new(config: Config, actor: Option<String>) -> Result<Self> {
        let pool = database::create_connection(&config.database_url).await?;
        let authorizer = Arc::new(GroupAuthorizer::new(&config.managers, &config.officers));
        let actor = actor
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "system".to_string());

        Ok(Self {
            pool,
            config,
            authorizer,
            actor,
        })
    }

    pub fn authorize(&self, capability: Capability) -> Result<(), ActionError> {
        if self.authorizer.allows(&self.actor, capability) {
            Ok(())
        } else {
            Err(ActionError::Forbidden {
                actor: self.actor.clone(),
                capability,
            })
        }
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.pool.clone(), self.config.deviation, self.config.local_offset)
    }

    pub fn day_actions(&self) -> DayActions {
        DayActions::new(
            self.pool.clone(),
            self.authorizer.clone(),
            self.config.deviation,
            self.config.local_offset,
        )
    }

    pub fn punch_source(&self) -> Result<ZkClient> {
        let source_config = self
            .config
            .punch_source
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("PUNCH_SOURCE_URL is not configured"))?;
        Ok(ZkClient::new(source_config)?)
    }
}

pub async fn run(cli: Cli, config: Config) -> Result<()> {
    let ctx = AppContext::new(config, cli.actor).await?;

    match cli.command {
        Commands::Setup { create_missing } => sync::setup(&ctx, create_missing).await,
        Commands::Calendar(command) => setup::calendar(&ctx, command).await,
        Commands::Shift(command) => setup::shift(&ctx, command).await,
        Commands::Employee(command) => setup::employee(&ctx, command).await,
        Commands::Leave(command) => setup::leave(&ctx, command).await,
        Commands::Punch(command) => setup::punch(&ctx, command).await,
        Commands::Sync(command) => sync::sync(&ctx, command).await,
        Commands::Link { since, limit } => sync::link(&ctx, since, limit).await,
        Commands::Reconcile { from, to, pin } => sync::reconcile(&ctx, from, to, pin).await,
        Commands::Day(command) => days::day(&ctx, command).await,
        Commands::Payroll(args) => payroll::payroll(&ctx, args).await,
        Commands::Schedule(args) => schedule::schedule(&ctx, args).await,
    }
}

pub fn date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_date_string(value).map_err(|e| e.to_string())
}

pub fn time_arg(value: &str) -> Result<NaiveTime, String> {
    parse_time_string(value).map_err(|e| e.to_string())
}

pub fn period_arg(value: &str) -> Result<DatePeriod, String> {
    value.parse().map_err(|e: anyhow::Error| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_day_approval() {
        let cli = Cli::try_parse_from(["attendance-deviation", "--as", "amira", "day", "approve", "12", "late"]).unwrap();
        assert_eq!(cli.actor.as_deref(), Some("amira"));
        assert!(matches!(cli.command, Commands::Day(days::DayCommand::Approve { record_id: 12, .. })));
    }

    #[test]
    fn rejects_malformed_dates() {
        let result = Cli::try_parse_from(["attendance-deviation", "reconcile", "--from", "28/07/2025", "--to", "2025-07-29"]);
        assert!(result.is_err());
    }
}
