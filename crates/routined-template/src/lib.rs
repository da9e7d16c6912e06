//! routined-template: time-context construction and `{{key}}` substitution
//! for routine message, title, and notification text.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Local, TimeZone, Utc};
use chrono_tz::Tz;
use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("placeholder regex"));

/// Named values available for `{{key}}` substitution.
///
/// Built from a wall-clock instant, then optionally extended with
/// execution-derived pairs such as `session_id` for notification text.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    values: HashMap<String, String>,
}

impl TemplateContext {
    /// Build a context from the current time in the given IANA timezone,
    /// falling back to system-local time when no zone is given.
    pub fn now(timezone: Option<&str>) -> Self {
        Self::at(Utc::now(), timezone)
    }

    /// Build a context from a specific instant. Production callers use
    /// [`TemplateContext::now`]; tests pin the instant.
    pub fn at(instant: DateTime<Utc>, timezone: Option<&str>) -> Self {
        match timezone {
            Some(name) => match name.parse::<Tz>() {
                Ok(tz) => Self::from_datetime(&instant.with_timezone(&tz)),
                Err(_) => {
                    tracing::warn!(timezone = name, "Unknown timezone, using local time");
                    Self::from_datetime(&instant.with_timezone(&Local))
                }
            },
            None => Self::from_datetime(&instant.with_timezone(&Local)),
        }
    }

    fn from_datetime<Z>(dt: &DateTime<Z>) -> Self
    where
        Z: TimeZone,
        Z::Offset: fmt::Display,
    {
        let mut values = HashMap::new();
        values.insert("date".into(), dt.format("%Y-%m-%d").to_string());
        values.insert("time".into(), dt.format("%H:%M").to_string());
        values.insert("datetime".into(), dt.to_rfc3339());
        values.insert("year".into(), dt.format("%Y").to_string());
        values.insert("month".into(), dt.format("%m").to_string());
        values.insert("day".into(), dt.format("%d").to_string());
        values.insert("week".into(), format!("{:02}", dt.iso_week().week()));
        values.insert("weekday".into(), dt.format("%A").to_string());
        Self { values }
    }

    /// Add an execution-derived value (e.g. `session_id`).
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Replace `{{key}}` placeholders in `template` with values from `ctx`.
///
/// Single left-to-right pass: unknown keys stay verbatim, braces included,
/// and substituted values are never re-scanned, so a value that itself
/// contains `{{...}}` text comes through literally.
pub fn substitute(template: &str, ctx: &TemplateContext) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match ctx.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Build a context for the current time and substitute into `text`.
pub fn render(text: &str, timezone: Option<&str>) -> String {
    substitute(text, &TemplateContext::now(timezone))
}
