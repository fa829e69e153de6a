use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

pub fn get_current_date(offset: FixedOffset) -> NaiveDate {
    Utc::now().with_timezone(&offset).date_naive()
}

pub fn parse_time_string(time_str: &str) -> Result<NaiveTime> {
    let time_str = time_str.trim();

    if let Ok(time) = NaiveTime::parse_from_str(time_str, "%H:%M") {
        return Ok(time);
    }

    if let Ok(time) = NaiveTime::parse_from_str(time_str, "%H:%M:%S") {
        return Ok(time);
    }

    Err(anyhow::anyhow!("Invalid time format '{}'. Use HH:MM or HH:MM:SS", time_str))
}

pub fn parse_date_string(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("Invalid date '{}'. Use YYYY-MM-DD", date_str.trim()))
}

/// Parses "YYYY-MM-DD HH:MM[:SS]" as local wall-clock time.
pub fn parse_local_datetime(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    let (date_part, time_part) = value
        .split_once(' ')
        .ok_or_else(|| anyhow::anyhow!("Invalid timestamp '{}'. Use YYYY-MM-DD HH:MM", value))?;
    Ok(parse_date_string(date_part)?.and_time(parse_time_string(time_part)?))
}

/// Interprets a local date and time in `offset` and returns the UTC instant.
pub fn combine_date_time_local(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    local_to_utc(date.and_time(time), offset)
}

pub fn local_to_utc(local: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    (local - Duration::seconds(offset.local_minus_utc() as i64)).and_utc()
}

pub fn to_local(datetime: DateTime<Utc>, offset: FixedOffset) -> NaiveDateTime {
    datetime.with_timezone(&offset).naive_local()
}

pub fn duration_hours(duration: Duration) -> f64 {
    duration.num_seconds() as f64 / 3600.0
}

pub fn format_hours(hours: f64) -> String {
    let total_minutes = (hours * 60.0).round() as i64;
    let h = total_minutes / 60;
    let m = total_minutes % 60;

    if h > 0 {
        format!("{}h {:02}m", h, m)
    } else {
        format!("{}m", m)
    }
}

pub fn format_time_local(datetime: DateTime<Utc>, offset: FixedOffset) -> String {
    datetime.with_timezone(&offset).format("%H:%M").to_string()
}

pub fn format_datetime_local(datetime: DateTime<Utc>, offset: FixedOffset) -> String {
    datetime
        .with_timezone(&offset)
        .format("%Y-%m-%d %H:%M:%S %:z")
        .to_string()
}
