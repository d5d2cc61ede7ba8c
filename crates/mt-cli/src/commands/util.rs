//! Shared utilities for CLI commands.

use std::io::Write;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, FixedOffset};
use mt_core::{Alert, MilkingEvent, TimeBucket};
use regex::Regex;
use serde::Serialize;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").unwrap());

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Parses an instant as RFC 3339, `now`, or relative time.
///
/// RFC 3339 input keeps its own offset, which decides the milking's local date
/// and time bucket. `now` and relative input are taken in `now`'s offset.
///
/// Supports:
/// - RFC 3339: "2025-03-04T08:00:00+02:00"
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
pub fn parse_instant(s: &str, now: DateTime<FixedOffset>) -> Result<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }
    if s.eq_ignore_ascii_case("now") {
        return Ok(now);
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid time: {s}. Use RFC 3339 (e.g., 2025-03-04T08:00:00+02:00), 'now', or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::minutes(n * minutes_per_unit))
}

/// Writes `value` as pretty JSON followed by a newline.
pub fn write_json<W: Write, T: Serialize + ?Sized>(writer: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, value).context("failed to serialize output")?;
    writeln!(writer)?;
    Ok(())
}

/// One-line description of a milking.
pub fn describe_event(event: &MilkingEvent) -> String {
    let batch = event
        .batch_id
        .map_or_else(|| "none".to_string(), |id| id.to_string());
    format!(
        "event {}: cow {}, {} L at {} ({}), session {}, batch {}",
        event.id,
        event.cow_id,
        event.volume,
        event.milked_at.format("%Y-%m-%d %H:%M %:z"),
        TimeBucket::of(&event.milked_at),
        event.session_number,
        batch,
    )
}

/// Prints each alert with its recipients.
pub fn write_alerts<W: Write>(writer: &mut W, alerts: &[Alert]) -> Result<()> {
    for alert in alerts {
        let recipients: Vec<String> = alert.recipients.iter().map(ToString::to_string).collect();
        let recipients = if recipients.is_empty() {
            "no managers".to_string()
        } else {
            format!("users {}", recipients.join(", "))
        };
        writeln!(writer, "- [{}] {} -> {}", alert.kind, alert.message, recipients)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeSet;

    use chrono::{TimeZone, Utc};
    use mt_core::{AlertKind, BatchId, CowId, EventId, UserId, Volume};

    fn fixed_now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-03-04T20:00:00+02:00").unwrap()
    }

    #[test]
    fn test_parse_instant_keeps_rfc3339_offset() {
        let parsed = parse_instant("2025-03-04T08:00:00-05:00", fixed_now()).unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), -5 * 3600);
        assert_eq!(parsed.to_rfc3339(), "2025-03-04T08:00:00-05:00");
    }

    #[test]
    fn test_parse_instant_relative() {
        let now = fixed_now();
        assert_eq!(parse_instant("now", now).unwrap(), now);
        assert_eq!(
            parse_instant("2 hours ago", now).unwrap(),
            now - Duration::hours(2)
        );
        assert_eq!(
            parse_instant("1 week ago", now).unwrap(),
            now - Duration::days(7)
        );
        assert_eq!(
            parse_instant("30 minutes ago", now).unwrap().offset(),
            now.offset()
        );
    }

    #[test]
    fn test_parse_instant_rejects_garbage() {
        assert!(parse_instant("yesterday-ish", fixed_now()).is_err());
        assert!(parse_instant("2 fortnights ago", fixed_now()).is_err());
    }

    #[test]
    fn test_parse_instant_rejects_huge_values() {
        let err = parse_instant("99999999 weeks ago", fixed_now()).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_describe_event_uses_local_time_and_bucket() {
        let event = MilkingEvent {
            id: EventId::new(3),
            cow_id: CowId::new(1),
            milker_id: UserId::new(2),
            batch_id: Some(BatchId::new(4)),
            volume: Volume::from_milliliters(10_500),
            milked_at: DateTime::parse_from_rfc3339("2025-03-04T13:30:00+02:00").unwrap(),
            session_number: 2,
            previous_volume: None,
            note: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(
            describe_event(&event),
            "event 3: cow 1, 10.5 L at 2025-03-04 13:30 +02:00 (afternoon), session 2, batch 4"
        );
    }

    #[test]
    fn test_write_alerts_lists_recipients() {
        let alert = Alert {
            kind: AlertKind::LowProduction,
            cow_id: CowId::new(1),
            batch_id: None,
            message: "Low milk production".to_string(),
            recipients: [UserId::new(1), UserId::new(2)].into_iter().collect::<BTreeSet<_>>(),
            raised_at: Utc.with_ymd_and_hms(2025, 3, 4, 20, 0, 0).unwrap(),
        };
        let mut output = Vec::new();
        write_alerts(&mut output, &[alert]).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "- [low_production] Low milk production -> users 1, 2\n"
        );
    }
}
