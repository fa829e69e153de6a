use crate::commands::AppContext;
use crate::engine::authorization::Capability;
use crate::source::ingest::sync_punches;
use crate::utils::period::resolve_window;
use crate::utils::time::get_current_date;
use anyhow::Result;
use clap::Args;
use std::time::Duration;
use tracing::{error, info, warn};

const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Minutes between two cycles (at most one week)
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u64).range(1..=MAX_INTERVAL_MINUTES))]
    pub interval_minutes: u64,

    /// Stop after this many cycles (runs until Ctrl-C by default)
    #[arg(long)]
    pub cycles: Option<u32>,
}

/// One sync + link pass. Punch sync is skipped when no source is configured.
async fn run_cycle(ctx: &AppContext) -> Result<()> {
    if ctx.config.punch_source.is_some() {
        let source = ctx.punch_source()?;
        let today = get_current_date(ctx.config.local_offset);
        let (start, end) = resolve_window(None, None, None, today)?;
        sync_punches(&source, &ctx.pool, start, end, None, Vec::new(), ctx.config.local_offset).await?;
    }

    let report = ctx
        .reconciler()
        .link(ctx.config.sync_start_date, ctx.config.link_batch_limit)
        .await?;
    for failure in report.failures() {
        warn!("{}", failure);
    }
    Ok(())
}

pub async fn schedule(ctx: &AppContext, args: ScheduleArgs) -> Result<()> {
    ctx.authorize(Capability::Sync)?;
    ctx.authorize(Capability::Reconcile)?;

    if ctx.config.punch_source.is_none() {
        warn!("PUNCH_SOURCE_URL is not set, only linking stored punches");
    }

    let mut interval = tokio::time::interval(Duration::from_secs(args.interval_minutes.saturating_mul(60)));
    let mut completed = 0u32;
    info!("Scheduler started, every {} minutes", args.interval_minutes);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Scheduler stopped by signal");
                break;
            }
        }

        if let Err(e) = run_cycle(ctx).await {
            error!("Scheduled cycle failed: {:#}", e);
        }

        completed += 1;
        if args.cycles.is_some_and(|cycles| completed >= cycles) {
            info!("Scheduler finished after {} cycles", completed);
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DeviationSettings};
    use crate::database::models::{NewPunch, PunchMode};
    use crate::database::{queries, test_pool};
    use crate::engine::authorization::GroupAuthorizer;
    use crate::utils::time::combine_date_time_local;
    use chrono::{FixedOffset, NaiveDate, NaiveTime};
    use std::sync::Arc;

    fn context(pool: sqlx::SqlitePool) -> AppContext {
        AppContext {
            pool,
            config: Config {
                database_url: "sqlite::memory:".to_string(),
                punch_source: None,
                local_offset: FixedOffset::east_opt(2 * 3600).unwrap(),
                deviation: DeviationSettings::default(),
                link_batch_limit: 30,
                sync_start_date: None,
                managers: Vec::new(),
                officers: Vec::new(),
            },
            authorizer: Arc::new(GroupAuthorizer::permissive()),
            actor: "scheduler".to_string(),
        }
    }

    #[tokio::test]
    async fn single_cycle_links_stored_punches() {
        let pool = test_pool().await;
        let ctx = context(pool.clone());
        let date = NaiveDate::from_ymd_opt(2025, 7, 28).unwrap();
        {
            let mut conn = pool.acquire().await.unwrap();
            let calendar = queries::create_calendar(&mut conn, "Standard", 8.0).await.unwrap();
            queries::create_shift(
                &mut conn,
                calendar.id,
                "",
                0,
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            )
            .await
            .unwrap();
            queries::create_employee(&mut conn, "Mona", "100", Some(calendar.id), false).await.unwrap();
            let punch = NewPunch {
                remote_id: None,
                emp_code: "100".to_string(),
                dept_code: None,
                att_date: date,
                punched_at: combine_date_time_local(date, NaiveTime::from_hms_opt(9, 0, 0).unwrap(), ctx.config.local_offset),
                punch_state: None,
                mode: PunchMode::Manual,
            };
            queries::insert_punch_if_new(&mut conn, &punch).await.unwrap();
        }

        schedule(
            &ctx,
            ScheduleArgs {
                interval_minutes: 1,
                cycles: Some(1),
            },
        )
        .await
        .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let records = queries::get_attendance_records_by_date_range(&mut conn, None, date, date).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn interval_is_bounded() {
        use crate::commands::Cli;
        use clap::Parser;

        let parse = |minutes: &str| {
            Cli::try_parse_from(["attendance-deviation", "schedule", "--interval-minutes", minutes])
        };
        assert!(parse("10080").is_ok());
        assert!(parse("10081").is_err());
        assert!(parse("0").is_err());
        assert!(parse("18446744073709551615").is_err());
    }
}
