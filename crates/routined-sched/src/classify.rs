//! Schedule expression classification.

/// How a schedule expression will be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleKind {
    /// Fixed-calendar cron pattern ("0 9 * * *").
    Cron(String),
    /// Human-readable recurring phrase ("every 30 minutes").
    Interval(String),
}

/// Classify a schedule expression, trimmed.
///
/// Expressions made up entirely of digits, `*`, `,`, `-`, `/`, and
/// whitespace are cron patterns; everything else is a recurring phrase.
/// A bare numeric string like "15" passes the character test and
/// classifies as Cron; it then fails recurrence construction, which the
/// scheduler build reports per job rather than rerouting the expression.
pub fn classify(expression: &str) -> ScheduleKind {
    let trimmed = expression.trim();
    let is_cron = !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_whitespace() || matches!(c, '*' | ',' | '-' | '/'));
    if is_cron {
        ScheduleKind::Cron(trimmed.to_string())
    } else {
        ScheduleKind::Interval(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cron_expressions() {
        for expr in ["0 9 * * *", "*/5 * * * *", "0 0 1,15 * *", "30 2-6 * * 1-5", "  0 9 * * *  "] {
            assert!(
                matches!(classify(expr), ScheduleKind::Cron(_)),
                "{expr:?} should classify as cron"
            );
        }
    }

    #[test]
    fn test_interval_phrases() {
        for expr in [
            "every day at 9am",
            "every 30 minutes",
            "every monday at 09:00",
            "at 10:15 am",
        ] {
            assert!(
                matches!(classify(expr), ScheduleKind::Interval(_)),
                "{expr:?} should classify as interval"
            );
        }
    }

    #[test]
    fn test_bare_number_classifies_cron() {
        // Satisfies the character test even though it is not a usable
        // cron expression; recurrence construction rejects it later.
        assert_eq!(classify("15"), ScheduleKind::Cron("15".into()));
    }

    #[test]
    fn test_empty_is_interval() {
        assert_eq!(classify("   "), ScheduleKind::Interval(String::new()));
    }

    #[test]
    fn test_trimming_preserved_in_payload() {
        assert_eq!(
            classify("  every day at 9am  "),
            ScheduleKind::Interval("every day at 9am".into())
        );
    }
}
