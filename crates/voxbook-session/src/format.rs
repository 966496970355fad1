//! Display formatting for appointment slots and summary timestamps.
//!
//! Slots written by the booking backend are naive local times such as
//! `2026-01-20T10:00:00`. Those are rendered from their literal components so
//! the displayed time is never shifted by a timezone conversion. Anything
//! else is parsed as RFC 3339 and shown in the viewer's local time. Input
//! that cannot be parsed is returned unchanged.

use chrono::{DateTime, Local, TimeZone};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Formats a slot, e.g. `2026-01-20T14:30:00` -> `Jan 20, 2026 at 2:30 PM`.
pub fn format_slot(slot: &str) -> String {
    format_slot_in(slot, &Local)
}

/// [`format_slot`] with an explicit display timezone for zoned input.
pub fn format_slot_in<Tz>(slot: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    if slot.is_empty() {
        return String::new();
    }

    if slot.contains('T') && !slot.ends_with('Z') {
        if let Some(formatted) = format_literal(slot) {
            return formatted;
        }
    }

    format_zoned(slot, tz).unwrap_or_else(|| slot.to_string())
}

/// Formats a summary timestamp in local time, e.g. `Jan 20, 2026, 10:00 AM`.
pub fn format_timestamp(timestamp: &str) -> String {
    format_timestamp_in(timestamp, &Local)
}

pub fn format_timestamp_in<Tz>(timestamp: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format_zoned(timestamp, tz).unwrap_or_else(|| timestamp.to_string())
}

/// Splits `YYYY-MM-DDTHH:MM[...]` into its parts without any timezone math.
fn format_literal(slot: &str) -> Option<String> {
    let (date, time) = slot.split_once('T')?;

    let mut date_parts = date.split('-');
    let year = date_parts.next()?;
    let month: usize = date_parts.next()?.parse().ok()?;
    let day: u32 = date_parts.next()?.parse().ok()?;
    if year.is_empty() || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut time_parts = time.split(':');
    let hours: u32 = time_parts.next()?.parse().ok()?;
    let minutes = time_parts.next()?;
    if minutes.len() != 2 || !minutes.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let month_name = MONTHS.get(month.checked_sub(1)?)?;
    if !(1..=31).contains(&day) || hours > 23 {
        return None;
    }

    let meridiem = if hours >= 12 { "PM" } else { "AM" };
    let hours_12 = match hours % 12 {
        0 => 12,
        h => h,
    };

    Some(format!(
        "{} {}, {} at {}:{} {}",
        month_name, day, year, hours_12, minutes, meridiem
    ))
}

fn format_zoned<Tz>(value: &str, tz: &Tz) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let parsed = DateTime::parse_from_rfc3339(value).ok()?;
    Some(
        parsed
            .with_timezone(tz)
            .format("%b %-d, %Y, %-I:%M %p")
            .to_string(),
    )
}
