//! Recurrence backends: turning classified schedule expressions into
//! successive firing instants.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDateTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use thiserror::Error;

use crate::classify::{ScheduleKind, classify};

#[derive(Debug, Error)]
pub enum RecurrenceParseError {
    #[error("invalid cron expression {expression:?}: {source}")]
    Cron {
        expression: String,
        source: cron::error::Error,
    },
    #[error("unrecognized schedule phrase {0:?}")]
    Phrase(String),
    #[error("unknown timezone {0:?}")]
    Timezone(String),
}

/// A recurring firing rule bound to an optional timezone.
///
/// Cron rules fire at calendar-field matches computed in the timezone's
/// wall clock (system-local when absent); interval rules follow the
/// parsed phrase the same way.
#[derive(Debug, Clone)]
pub struct Recurrence {
    rule: Rule,
    timezone: Option<Tz>,
}

#[derive(Debug, Clone)]
enum Rule {
    Cron(cron::Schedule),
    Every(Duration),
    DailyAt { hour: u32, minute: u32 },
    WeeklyAt { weekday: Weekday, hour: u32, minute: u32 },
}

impl Recurrence {
    /// Parse a schedule expression with an optional IANA timezone name.
    pub fn parse(expression: &str, timezone: Option<&str>) -> Result<Self, RecurrenceParseError> {
        let timezone = match timezone {
            Some(name) => Some(
                name.parse::<Tz>()
                    .map_err(|_| RecurrenceParseError::Timezone(name.to_string()))?,
            ),
            None => None,
        };

        let rule = match classify(expression) {
            ScheduleKind::Cron(expr) => {
                let normalized = normalize_cron(&expr);
                let schedule = cron::Schedule::from_str(&normalized).map_err(|source| {
                    RecurrenceParseError::Cron {
                        expression: expr,
                        source,
                    }
                })?;
                Rule::Cron(schedule)
            }
            ScheduleKind::Interval(phrase) => {
                parse_phrase(&phrase).ok_or(RecurrenceParseError::Phrase(phrase))?
            }
        };

        Ok(Self { rule, timezone })
    }

    /// Next firing instant strictly after `after`, or `None` when the
    /// rule has no further occurrences.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.timezone {
            Some(tz) => self.next_in_zone(&after.with_timezone(&tz)),
            None => self.next_in_zone(&after.with_timezone(&Local)),
        }
    }

    fn next_in_zone<Z: TimeZone>(&self, after: &DateTime<Z>) -> Option<DateTime<Utc>> {
        match &self.rule {
            Rule::Cron(schedule) => schedule
                .after(after)
                .next()
                .map(|next| next.with_timezone(&Utc)),
            Rule::Every(step) => Some(after.with_timezone(&Utc) + *step),
            Rule::DailyAt { hour, minute } => next_wall_clock(after, None, *hour, *minute),
            Rule::WeeklyAt {
                weekday,
                hour,
                minute,
            } => next_wall_clock(after, Some(*weekday), *hour, *minute),
        }
    }
}

/// The `cron` crate wants a seconds field; five-field expressions (the
/// common user-facing form) get `0` seconds prepended. Six and seven
/// field expressions pass through untouched.
fn normalize_cron(expr: &str) -> String {
    match expr.split_whitespace().count() {
        5 => format!("0 {expr}"),
        _ => expr.to_string(),
    }
}

/// Earliest occurrence of `hour:minute` (restricted to `weekday` when
/// given) strictly after `after`, in `after`'s zone.
fn next_wall_clock<Z: TimeZone>(
    after: &DateTime<Z>,
    weekday: Option<Weekday>,
    hour: u32,
    minute: u32,
) -> Option<DateTime<Utc>> {
    let zone = after.timezone();
    let mut day = after.date_naive();
    // Nine days covers a full week plus wall-clock times lost to DST gaps.
    for _ in 0..9 {
        if weekday.is_none_or(|w| day.weekday() == w) {
            if let Some(naive) = day.and_hms_opt(hour, minute, 0) {
                if let Some(candidate) = resolve_local(&zone, naive) {
                    if candidate > *after {
                        return Some(candidate.with_timezone(&Utc));
                    }
                }
            }
        }
        day = day.succ_opt()?;
    }
    None
}

fn resolve_local<Z: TimeZone>(zone: &Z, naive: NaiveDateTime) -> Option<DateTime<Z>> {
    match zone.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Some(dt),
        // Clocks rolled back: take the first occurrence.
        chrono::LocalResult::Ambiguous(first, _) => Some(first),
        // Clocks sprang forward past this time: no occurrence today.
        chrono::LocalResult::None => None,
    }
}

/// Parse a human-readable recurring phrase.
///
/// Supported shapes: `every N seconds|minutes|hours|days`, a bare unit
/// (`every minute`), `every day at 9:30`, `every monday at 09:00`, with
/// 12-hour forms like `9am` and `9:30pm` accepted.
fn parse_phrase(phrase: &str) -> Option<Rule> {
    let lower = phrase.to_lowercase();
    let mut words = lower.split_whitespace();
    if words.next()? != "every" {
        return None;
    }
    let subject = words.next()?;
    let rest: Vec<&str> = words.collect();

    // "every 30 minutes"
    if let Ok(count) = subject.parse::<u64>() {
        if count == 0 {
            return None;
        }
        if let &[unit] = rest.as_slice() {
            return unit_seconds(unit).map(|s| Rule::Every(Duration::seconds((count * s) as i64)));
        }
        return None;
    }

    // "every minute", "every hour", "every day"
    if rest.is_empty() {
        return unit_seconds(subject).map(|s| Rule::Every(Duration::seconds(s as i64)));
    }

    // "every day at 9:30", "every monday at 9am"
    if let &["at", time] = rest.as_slice() {
        let (hour, minute) = parse_time(time)?;
        if subject == "day" {
            return Some(Rule::DailyAt { hour, minute });
        }
        if let Ok(weekday) = subject.parse::<Weekday>() {
            return Some(Rule::WeeklyAt {
                weekday,
                hour,
                minute,
            });
        }
    }

    None
}

fn unit_seconds(unit: &str) -> Option<u64> {
    match unit.trim_end_matches('s') {
        "second" | "sec" => Some(1),
        "minute" | "min" => Some(60),
        "hour" => Some(3_600),
        "day" => Some(86_400),
        _ => None,
    }
}

/// Parse "9", "09:00", "9:30", "9am", "12pm", "9:30pm" into (hour, minute).
fn parse_time(text: &str) -> Option<(u32, u32)> {
    let (clock, meridiem) = if let Some(t) = text.strip_suffix("am") {
        (t, Some(false))
    } else if let Some(t) = text.strip_suffix("pm") {
        (t, Some(true))
    } else {
        (text, None)
    };

    let (hour, minute) = match clock.split_once(':') {
        Some((h, m)) => (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?),
        None => (clock.parse::<u32>().ok()?, 0),
    };

    let hour = match meridiem {
        Some(pm) => {
            if hour == 0 || hour > 12 {
                return None;
            }
            let base = if hour == 12 { 0 } else { hour };
            if pm { base + 12 } else { base }
        }
        None => hour,
    };

    (hour < 24 && minute < 60).then_some((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_five_field_cron_normalized() {
        let rec = Recurrence::parse("0 9 * * *", Some("UTC")).unwrap();
        // After 08:00 the next 09:00 is the same day.
        let next = rec.next_after(utc(2024, 1, 10, 8, 0)).unwrap();
        assert_eq!(next, utc(2024, 1, 10, 9, 0));
        // After 09:00 exactly, the firing is strictly later.
        let next = rec.next_after(utc(2024, 1, 10, 9, 0)).unwrap();
        assert_eq!(next, utc(2024, 1, 11, 9, 0));
    }

    #[test]
    fn test_six_field_cron_passes_through() {
        let rec = Recurrence::parse("30 0 9 * * *", Some("UTC")).unwrap();
        let next = rec.next_after(utc(2024, 1, 10, 8, 0)).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 30).unwrap());
    }

    #[test]
    fn test_cron_honors_timezone_wall_clock() {
        // 09:00 in New York during winter (EST, UTC-5) is 14:00 UTC.
        let rec = Recurrence::parse("0 9 * * *", Some("America/New_York")).unwrap();
        let next = rec.next_after(utc(2024, 1, 10, 0, 0)).unwrap();
        assert_eq!(next, utc(2024, 1, 10, 14, 0));
    }

    #[test]
    fn test_bare_number_fails_construction() {
        let err = Recurrence::parse("15", Some("UTC")).unwrap_err();
        assert!(matches!(err, RecurrenceParseError::Cron { .. }));
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let err = Recurrence::parse("0 9 * * *", Some("Mars/Olympus")).unwrap_err();
        assert!(matches!(err, RecurrenceParseError::Timezone(_)));
    }

    #[test]
    fn test_every_n_minutes() {
        let rec = Recurrence::parse("every 30 minutes", Some("UTC")).unwrap();
        let next = rec.next_after(utc(2024, 1, 10, 8, 0)).unwrap();
        assert_eq!(next, utc(2024, 1, 10, 8, 30));
    }

    #[test]
    fn test_bare_unit_phrases() {
        let rec = Recurrence::parse("every hour", Some("UTC")).unwrap();
        let next = rec.next_after(utc(2024, 1, 10, 8, 15)).unwrap();
        assert_eq!(next, utc(2024, 1, 10, 9, 15));

        assert!(Recurrence::parse("every minute", None).is_ok());
        assert!(Recurrence::parse("every day", None).is_ok());
    }

    #[test]
    fn test_daily_at_rolls_to_next_day() {
        let rec = Recurrence::parse("every day at 09:00", Some("UTC")).unwrap();
        let next = rec.next_after(utc(2024, 1, 10, 10, 0)).unwrap();
        assert_eq!(next, utc(2024, 1, 11, 9, 0));
    }

    #[test]
    fn test_daily_at_meridiem_forms() {
        let rec = Recurrence::parse("every day at 9am", Some("UTC")).unwrap();
        assert_eq!(
            rec.next_after(utc(2024, 1, 10, 0, 0)).unwrap(),
            utc(2024, 1, 10, 9, 0)
        );

        let rec = Recurrence::parse("every day at 9:30pm", Some("UTC")).unwrap();
        assert_eq!(
            rec.next_after(utc(2024, 1, 10, 0, 0)).unwrap(),
            utc(2024, 1, 10, 21, 30)
        );

        let rec = Recurrence::parse("every day at 12am", Some("UTC")).unwrap();
        assert_eq!(
            rec.next_after(utc(2024, 1, 10, 0, 1)).unwrap(),
            utc(2024, 1, 11, 0, 0)
        );
    }

    #[test]
    fn test_weekly_at() {
        // 2024-01-10 is a Wednesday; next Monday is the 15th.
        let rec = Recurrence::parse("every monday at 09:00", Some("UTC")).unwrap();
        let next = rec.next_after(utc(2024, 1, 10, 0, 0)).unwrap();
        assert_eq!(next, utc(2024, 1, 15, 9, 0));
    }

    #[test]
    fn test_unrecognized_phrases_rejected() {
        for phrase in [
            "whenever",
            "every",
            "every blue moon",
            "every 0 minutes",
            "every day at 25:00",
            "every day at 13pm",
        ] {
            assert!(
                matches!(
                    Recurrence::parse(phrase, None),
                    Err(RecurrenceParseError::Phrase(_))
                ),
                "{phrase:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_time_forms() {
        assert_eq!(parse_time("9"), Some((9, 0)));
        assert_eq!(parse_time("09:00"), Some((9, 0)));
        assert_eq!(parse_time("9am"), Some((9, 0)));
        assert_eq!(parse_time("12pm"), Some((12, 0)));
        assert_eq!(parse_time("12am"), Some((0, 0)));
        assert_eq!(parse_time("9:30pm"), Some((21, 30)));
        assert_eq!(parse_time("23:59"), Some((23, 59)));
        assert_eq!(parse_time("24:00"), None);
        assert_eq!(parse_time("9:60"), None);
    }
}
