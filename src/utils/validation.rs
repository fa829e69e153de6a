use anyhow::Result;
use chrono::NaiveDate;

pub fn validate_date_range(start_date: NaiveDate, end_date: NaiveDate) -> Result<()> {
    if start_date > end_date {
        return Err(anyhow::anyhow!(
            "Start date {} must not be after end date {}",
            start_date,
            end_date
        ));
    }
    Ok(())
}

pub fn validate_forced_hours(hours: Option<f64>) -> Result<()> {
    match hours {
        Some(h) if !h.is_finite() || h < 0.0 => {
            Err(anyhow::anyhow!("Forced hours must be zero or positive, got {}", h))
        }
        Some(h) if h > 24.0 => Err(anyhow::anyhow!("Forced hours exceed a day: {}", h)),
        _ => Ok(()),
    }
}

pub fn validate_day_of_week(value: &str) -> Result<u32> {
    let normalized = value.trim().to_ascii_lowercase();
    let index = match normalized.as_str() {
        "0" | "mon" | "monday" => 0,
        "1" | "tue" | "tuesday" => 1,
        "2" | "wed" | "wednesday" => 2,
        "3" | "thu" | "thursday" => 3,
        "4" | "fri" | "friday" => 4,
        "5" | "sat" | "saturday" => 5,
        "6" | "sun" | "sunday" => 6,
        _ => return Err(anyhow::anyhow!("Unknown day of week: {}", value)),
    };
    Ok(index)
}
