//! Plain-text rendering of a call summary.

use chrono::{Local, TimeZone};
use std::fmt::{Display, Write};
use voxbook_session::format::{format_slot_in, format_timestamp_in};
use voxbook_types::CallSummary;

pub const TITLE: &str = "Call Summary";

pub fn render_summary(summary: &CallSummary) -> String {
    render_summary_in(summary, &Local)
}

pub fn render_summary_in<Tz>(summary: &CallSummary, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::new();
    let _ = writeln!(out, "{}", TITLE);
    let _ = writeln!(out, "{}", format_timestamp_in(&summary.timestamp, tz));
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", summary.text);

    if !summary.appointments.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Booked Appointments");
        for appointment in &summary.appointments {
            let _ = write!(out, "  - {}", format_slot_in(&appointment.slot, tz));
            if let Some(name) = &appointment.name {
                let _ = write!(out, " for {}", name);
            }
            if !appointment.is_confirmed() {
                if let Some(status) = &appointment.status {
                    let _ = write!(out, " ({})", status);
                }
            }
            let _ = writeln!(out);
        }
    }

    if let Some(preferences) = &summary.preferences {
        let _ = writeln!(out);
        let _ = writeln!(out, "Preferences: {}", preferences);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use voxbook_types::Appointment;

    fn summary() -> CallSummary {
        CallSummary {
            text: "Booked a cleaning for Sam.".to_string(),
            appointments: Vec::new(),
            preferences: None,
            timestamp: "2026-01-19T09:05:00Z".to_string(),
        }
    }

    #[test]
    fn renders_text_without_appointments() {
        let out = render_summary_in(&summary(), &Utc);
        assert!(out.starts_with("Call Summary\nJan 19, 2026, 9:05 AM\n"));
        assert!(out.contains("Booked a cleaning for Sam."));
        assert!(!out.contains("Booked Appointments"));
        assert!(!out.contains("Preferences"));
    }

    #[test]
    fn renders_appointments_and_preferences() {
        let mut summary = summary();
        let mut booked = Appointment::new("2026-01-20T14:30:00");
        booked.name = Some("Sam".to_string());
        let mut cancelled = Appointment::new("2026-01-22T09:00:00");
        cancelled.status = Some("cancelled".to_string());
        summary.appointments = vec![booked, cancelled];
        summary.preferences = Some("Prefers mornings".to_string());

        let out = render_summary_in(&summary, &Utc);
        assert!(out.contains("Booked Appointments\n"));
        assert!(out.contains("  - Jan 20, 2026 at 2:30 PM for Sam\n"));
        assert!(out.contains("  - Jan 22, 2026 at 9:00 AM (cancelled)\n"));
        assert!(out.ends_with("Preferences: Prefers mornings\n"));
    }

    #[test]
    fn unparseable_timestamp_is_shown_verbatim() {
        let mut summary = summary();
        summary.timestamp = "yesterday".to_string();
        assert!(render_summary_in(&summary, &Utc).starts_with("Call Summary\nyesterday\n"));
    }
}
