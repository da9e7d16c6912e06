//! Structural validation beyond what serde enforces.

use routined_types::{Action, RoutineConfig};

/// Check a parsed routine definition, returning every issue found.
pub(crate) fn check(config: &RoutineConfig) -> Vec<String> {
    let mut issues = Vec::new();

    if config.name.trim().is_empty() {
        issues.push("name: must not be empty".to_string());
    }

    match &config.triggers.schedule {
        None => issues.push("triggers: at least one trigger must be defined".to_string()),
        Some(schedule) => {
            if schedule.when.trim().is_empty() {
                issues.push("triggers.schedule.when: must not be empty".to_string());
            }
        }
    }

    match &config.action {
        Action::NewSession {
            message, notify, ..
        } => {
            if message.trim().is_empty() {
                issues.push("action.message: must not be empty".to_string());
            }
            if let Some(notify) = notify {
                if notify.title.trim().is_empty() {
                    issues.push("action.notify.title: must not be empty".to_string());
                }
                if notify.body.trim().is_empty() {
                    issues.push("action.notify.body: must not be empty".to_string());
                }
            }
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use routined_types::{NotifyConfig, ScheduleTrigger, Triggers};

    fn base() -> RoutineConfig {
        RoutineConfig {
            name: "ok".into(),
            description: None,
            enabled: true,
            triggers: Triggers {
                schedule: Some(ScheduleTrigger {
                    when: "0 9 * * *".into(),
                    timezone: None,
                }),
            },
            action: Action::NewSession {
                title: None,
                model: None,
                agent: None,
                message: "hi".into(),
                notify: None,
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(check(&base()).is_empty());
    }

    #[test]
    fn test_multiple_issues_all_reported() {
        let mut config = base();
        config.name = " ".into();
        config.action = Action::NewSession {
            title: None,
            model: None,
            agent: None,
            message: String::new(),
            notify: Some(NotifyConfig {
                title: String::new(),
                body: "b".into(),
                deeplink: None,
            }),
        };
        let issues = check(&config);
        assert_eq!(issues.len(), 3);
    }

    #[test]
    fn test_empty_when_rejected() {
        let mut config = base();
        config.triggers.schedule.as_mut().unwrap().when = String::new();
        assert_eq!(check(&config).len(), 1);
    }
}
