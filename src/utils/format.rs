use crate::database::models::{
    AttendanceRecord, AuditNote, DeviationKind, DeviationState, Employee, PunchMode, Shift,
};
use crate::engine::payroll::{PayrollSummary, period_days};
use crate::engine::reconciler::BatchReport;
use crate::utils::time::{format_datetime_local, format_hours, format_time_local};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

fn deviation_label(record: &AttendanceRecord, kind: DeviationKind) -> String {
    match record.deviation_state(kind) {
        Some(DeviationState::Flagged) => format!(
            "{} {}",
            kind.flagged_label(),
            format_hours(record.deviation_hours(kind))
        ),
        Some(DeviationState::Approved) => format!(
            "{} {} (approved)",
            kind.flagged_label(),
            format_hours(record.deviation_hours(kind))
        ),
        None => "-".to_string(),
    }
}

fn boundary(at: Option<DateTime<Utc>>, offset: FixedOffset) -> String {
    at.map(|t| format_time_local(t, offset))
        .unwrap_or_else(|| "--:--".to_string())
}

pub fn format_record_line(record: &AttendanceRecord, offset: FixedOffset) -> String {
    let mut line = format!(
        "#{} {} {} → {} late: {} early: {}",
        record.id,
        record.employee_name,
        boundary(record.check_in, offset),
        boundary(record.check_out, offset),
        deviation_label(record, DeviationKind::Late),
        deviation_label(record, DeviationKind::Early),
    );

    if record.state.is_error() {
        line.push_str(&format!(" ⚠️ {}", record.state));
    }
    if record.has_permission {
        line.push_str(" [permission]");
    }
    line
}

/// Records grouped under a header per date.
pub fn format_records_list(records: &[AttendanceRecord], offset: FixedOffset) -> String {
    if records.is_empty() {
        return "No attendance records in this period".to_string();
    }

    let mut output = String::new();
    let mut current_date: Option<NaiveDate> = None;
    let mut flagged = 0;

    for record in records {
        if current_date != Some(record.date) {
            if current_date.is_some() {
                output.push('\n');
            }
            current_date = Some(record.date);
            output.push_str(&format!("📅 {}\n", record.date.format("%Y-%m-%d (%a)")));
        }

        output.push_str(&format!("   {}\n", format_record_line(record, offset)));
        if record.late_state == Some(DeviationState::Flagged) || record.early_state == Some(DeviationState::Flagged) {
            flagged += 1;
        }
    }

    output.push_str(&format!("\n{} records, {} awaiting approval", records.len(), flagged));
    output
}

pub fn format_record_detail(
    record: &AttendanceRecord,
    shift: Option<&Shift>,
    notes: &[AuditNote],
    offset: FixedOffset,
) -> String {
    let mut detail = format!("{}\n", record.display_name());
    detail.push_str(&format!("State: {}\n", record.state));
    detail.push_str(&format!(
        "Shift: {}\n",
        shift.map(|s| s.display_name()).unwrap_or_else(|| "none".to_string())
    ));

    let mode = |m: Option<PunchMode>| {
        m.map(|m| format!(" ({})", m)).unwrap_or_default()
    };
    detail.push_str(&format!("Check-in: {}{}\n", boundary(record.check_in, offset), mode(record.in_mode)));
    detail.push_str(&format!("Check-out: {}{}\n", boundary(record.check_out, offset), mode(record.out_mode)));
    detail.push_str(&format!("Late: {}\n", deviation_label(record, DeviationKind::Late)));
    detail.push_str(&format!("Early: {}\n", deviation_label(record, DeviationKind::Early)));
    detail.push_str(&format!(
        "Permission: {}\n",
        if record.has_permission { "approved permission on file" } else { "none" }
    ));

    if !record.overrides.is_empty() {
        let o = &record.overrides;
        detail.push_str("Overrides:");
        if let Some(id) = o.shift_id {
            detail.push_str(&format!(" shift #{}", id));
        }
        if let Some(t) = o.check_in {
            detail.push_str(&format!(" in {}", t.format("%H:%M")));
        }
        if let Some(t) = o.check_out {
            detail.push_str(&format!(" out {}", t.format("%H:%M")));
        }
        if let Some(h) = o.late_hours {
            detail.push_str(&format!(" late {}", format_hours(h)));
        }
        if let Some(h) = o.early_hours {
            detail.push_str(&format!(" early {}", format_hours(h)));
        }
        detail.push('\n');
    }

    if !notes.is_empty() {
        detail.push_str("\nHistory:\n");
        for note in notes {
            detail.push_str(&format!("   {} {}\n", format_datetime_local(note.created_at, offset), note.body));
        }
    }

    detail
}

pub fn format_batch_report(title: &str, report: &BatchReport) -> String {
    let mut output = format!(
        "{}: {} processed, {} ok ({} changed), {} failed",
        title,
        report.items.len(),
        report.succeeded(),
        report.changed(),
        report.failed()
    );

    for failure in report.failures() {
        output.push_str(&format!("\n   ❌ {}", failure));
    }
    output
}

pub fn format_payroll_summary(summary: &PayrollSummary) -> String {
    let mut output = format!(
        "📊 {} {} .. {} ({} days)\n",
        summary.employee_name,
        summary.date_from,
        summary.date_to,
        period_days(summary.date_from, summary.date_to)
    );
    output.push_str(&format!(
        "   Attended: {} of {} scheduled, {} absent\n",
        summary.days_attended, summary.scheduled_days, summary.absent_days
    ));
    output.push_str(&format!(
        "   Late: {} days, {} ({} waived)\n",
        summary.late_days,
        format_hours(summary.late_hours),
        summary.waived_late_days
    ));
    output.push_str(&format!(
        "   Early: {} days, {} ({} waived)\n",
        summary.early_days,
        format_hours(summary.early_hours),
        summary.waived_early_days
    ));
    output.push_str(&format!("   Permissions: {}", summary.permissions));
    if summary.error_days > 0 {
        output.push_str(&format!("\n   ⚠️ {} days still in an error state", summary.error_days));
    }
    output
}

pub fn format_employee_line(employee: &Employee) -> String {
    format!(
        "#{} {} (pin {}){}",
        employee.id,
        employee.name,
        employee.pin,
        if employee.multi_shifts { " multi-shift" } else { "" }
    )
}

pub fn format_error_message(error: &str) -> String {
    format!("❌ Error: {}", error)
}

pub fn format_success_message(message: &str) -> String {
    format!("✅ {}", message)
}

pub fn format_info_message(message: &str) -> String {
    format!("ℹ️ {}", message)
}
