use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calendar {
    pub id: i64,
    pub name: String,
    pub hours_per_day: f64,
}

/// A scheduled working window of a calendar on one weekday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: i64,
    pub calendar_id: i64,
    pub calendar_name: String,
    pub name: String,
    /// 0 = Monday .. 6 = Sunday
    pub day_of_week: u32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl Shift {
    pub fn weekday(&self) -> Option<Weekday> {
        weekday_from_index(self.day_of_week)
    }

    /// Ends on the following day when the end is not after the start.
    pub fn is_overnight(&self) -> bool {
        self.end_time <= self.start_time
    }

    pub fn display_name(&self) -> String {
        format!(
            "{} ({} - {}) {}",
            self.calendar_name,
            self.start_time.format("%I:%M %p"),
            self.end_time.format("%I:%M %p"),
            self.name
        )
        .trim_end()
        .to_string()
    }
}

pub fn weekday_from_index(index: u32) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub pin: String,
    pub calendar_id: Option<i64>,
    pub multi_shifts: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: i64,
    pub remote_id: String,
    pub name: String,
    pub code: String,
}

/// Employee as known to the time-clock service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEmployee {
    pub id: i64,
    pub remote_id: String,
    pub emp_code: String,
    pub full_name: String,
    pub dept_code: Option<String>,
    pub hire_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PunchMode {
    /// Entered by a person.
    Manual,
    /// Captured by a time-clock device.
    Automatic,
    /// Synthesized or forced by reconciliation.
    Technical,
}

impl PunchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PunchMode::Manual => "manual",
            PunchMode::Automatic => "automatic",
            PunchMode::Technical => "technical",
        }
    }
}

impl FromStr for PunchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "manual" => Ok(PunchMode::Manual),
            "automatic" => Ok(PunchMode::Automatic),
            "technical" => Ok(PunchMode::Technical),
            _ => Err(anyhow::anyhow!("Invalid punch mode: {}", s)),
        }
    }
}

impl fmt::Display for PunchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Punch {
    pub id: i64,
    pub remote_id: Option<String>,
    pub emp_code: String,
    pub dept_code: Option<String>,
    pub att_date: NaiveDate,
    pub punched_at: DateTime<Utc>,
    pub punch_state: Option<String>,
    pub mode: PunchMode,
    pub is_settled: bool,
    pub created_at: DateTime<Utc>,
}

/// Punch about to be stored; `remote_id` deduplicates device punches.
#[derive(Debug, Clone)]
pub struct NewPunch {
    pub remote_id: Option<String>,
    pub emp_code: String,
    pub dept_code: Option<String>,
    pub att_date: NaiveDate,
    pub punched_at: DateTime<Utc>,
    pub punch_state: Option<String>,
    pub mode: PunchMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordState {
    Draft,
    /// No working time could be found for the day.
    InitError,
    Reconciled,
    ReconcileError,
}

impl RecordState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordState::Draft => "draft",
            RecordState::InitError => "init_error",
            RecordState::Reconciled => "reconciled",
            RecordState::ReconcileError => "reconcile_error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RecordState::InitError | RecordState::ReconcileError)
    }
}

impl FromStr for RecordState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(RecordState::Draft),
            "init_error" => Ok(RecordState::InitError),
            "reconciled" => Ok(RecordState::Reconciled),
            "reconcile_error" => Ok(RecordState::ReconcileError),
            _ => Err(anyhow::anyhow!("Invalid record state: {}", s)),
        }
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Approval state of one deviation (late arrival or early departure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviationState {
    /// Above tolerance, awaiting a decision.
    Flagged,
    /// Waived by a manager; survives recomputation.
    Approved,
}

impl DeviationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviationState::Flagged => "flagged",
            DeviationState::Approved => "approved",
        }
    }

    pub fn parse_opt(value: Option<String>) -> Result<Option<Self>> {
        value.map(|s| s.parse()).transpose()
    }
}

impl FromStr for DeviationState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "flagged" => Ok(DeviationState::Flagged),
            "approved" => Ok(DeviationState::Approved),
            _ => Err(anyhow::anyhow!("Invalid deviation state: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviationKind {
    Late,
    Early,
}

impl DeviationKind {
    /// Label shown for a flagged deviation of this kind.
    pub fn flagged_label(&self) -> &'static str {
        match self {
            DeviationKind::Late => "late",
            DeviationKind::Early => "early",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            DeviationKind::Late => "late check-in",
            DeviationKind::Early => "early check-out",
        }
    }
}

/// Manager overrides applied on top of the computed values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForceOverrides {
    pub shift_id: Option<i64>,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub late_hours: Option<f64>,
    pub early_hours: Option<f64>,
}

impl ForceOverrides {
    pub fn is_empty(&self) -> bool {
        self == &ForceOverrides::default()
    }
}

/// One reconciled attendance day for an employee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: i64,
    pub employee_id: i64,
    pub employee_name: String,
    pub date: NaiveDate,
    pub state: RecordState,
    pub shift_id: Option<i64>,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub in_mode: Option<PunchMode>,
    pub out_mode: Option<PunchMode>,
    pub late_hours: f64,
    pub early_hours: f64,
    pub late_state: Option<DeviationState>,
    pub early_state: Option<DeviationState>,
    pub has_permission: bool,
    pub overrides: ForceOverrides,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.employee_name, self.date.format("%Y-%m-%d"))
    }

    pub fn deviation_state(&self, kind: DeviationKind) -> Option<DeviationState> {
        match kind {
            DeviationKind::Late => self.late_state,
            DeviationKind::Early => self.early_state,
        }
    }

    pub fn deviation_hours(&self, kind: DeviationKind) -> f64 {
        match kind {
            DeviationKind::Late => self.late_hours,
            DeviationKind::Early => self.early_hours,
        }
    }

    pub fn forced_hours(&self, kind: DeviationKind) -> Option<f64> {
        match kind {
            DeviationKind::Late => self.overrides.late_hours,
            DeviationKind::Early => self.overrides.early_hours,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditNote {
    pub id: i64,
    pub record_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Leave code used for late-arrival / early-leaving permissions.
pub const PERMISSION_LEAVE_CODE: &str = "LATE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaveState {
    Draft,
    Validated,
    Refused,
}

impl LeaveState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveState::Draft => "draft",
            LeaveState::Validated => "validate",
            LeaveState::Refused => "refuse",
        }
    }
}

impl FromStr for LeaveState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(LeaveState::Draft),
            "validate" => Ok(LeaveState::Validated),
            "refuse" => Ok(LeaveState::Refused),
            _ => Err(anyhow::anyhow!("Invalid leave state: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: i64,
    pub employee_id: i64,
    pub code: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub hours: f64,
    pub state: LeaveState,
}

/// Values produced by one reconciliation pass over a day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayComputation {
    pub state: RecordState,
    pub shift_id: Option<i64>,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub in_mode: Option<PunchMode>,
    pub out_mode: Option<PunchMode>,
    pub late_hours: f64,
    pub early_hours: f64,
    pub late_state: Option<DeviationState>,
    pub early_state: Option<DeviationState>,
    pub has_permission: bool,
}

impl DayComputation {
    /// True when storing this computation would not change the record.
    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        self.state == record.state
            && self.shift_id == record.shift_id
            && self.check_in == record.check_in
            && self.check_out == record.check_out
            && self.in_mode == record.in_mode
            && self.out_mode == record.out_mode
            && (self.late_hours - record.late_hours).abs() < 1e-9
            && (self.early_hours - record.early_hours).abs() < 1e-9
            && self.late_state == record.late_state
            && self.early_state == record.early_state
            && self.has_permission == record.has_permission
    }
}
