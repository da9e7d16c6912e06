//! routined-sched: schedule interpretation and job execution.
//!
//! Classifies schedule expressions, derives recurring firing rules, and
//! runs the job scheduler that launches one execution isolate per firing.

pub mod classify;
pub mod isolate;
pub mod recurrence;
pub mod scheduler;

pub use classify::{ScheduleKind, classify};
pub use isolate::{IsolateEvent, WorkerMessage};
pub use recurrence::{Recurrence, RecurrenceParseError};
pub use scheduler::JobScheduler;

use routined_types::{Action, LoadedRoutine};

/// The by-value snapshot handed to one execution isolate. Immutable for
/// the lifetime of one firing.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub routine_id: String,
    pub routine_name: String,
    pub action: Action,
    /// Timezone from the schedule trigger, applied to template context.
    pub timezone: Option<String>,
    pub server_url: String,
}

/// A schedulable unit: one enabled routine with a parsed recurrence.
#[derive(Debug, Clone)]
pub struct Job {
    pub routine_id: String,
    pub routine_name: String,
    pub recurrence: Recurrence,
    /// Prototype request, cloned for each firing.
    pub request: ExecutionRequest,
}

/// Build scheduler jobs from loaded routines.
///
/// Routines without a schedule trigger are loadable but never scheduled.
/// A routine whose expression fails recurrence construction is skipped
/// with an error log; the remaining jobs still build.
pub fn build_jobs(routines: &[LoadedRoutine], server_url: &str) -> Vec<Job> {
    let mut jobs = Vec::new();
    for routine in routines {
        let Some(schedule) = &routine.config.triggers.schedule else {
            continue;
        };

        let recurrence = match Recurrence::parse(&schedule.when, schedule.timezone.as_deref()) {
            Ok(recurrence) => recurrence,
            Err(e) => {
                tracing::error!(routine = %routine.id, "Skipping unschedulable routine: {e}");
                continue;
            }
        };

        jobs.push(Job {
            routine_id: routine.id.clone(),
            routine_name: routine.config.name.clone(),
            recurrence,
            request: ExecutionRequest {
                routine_id: routine.id.clone(),
                routine_name: routine.config.name.clone(),
                action: routine.config.action.clone(),
                timezone: schedule.timezone.clone(),
                server_url: server_url.to_string(),
            },
        });
    }
    jobs
}

#[cfg(test)]
mod tests {
    use super::*;
    use routined_types::{RoutineConfig, ScheduleTrigger, Triggers};

    fn routine(id: &str, when: &str, timezone: Option<&str>) -> LoadedRoutine {
        LoadedRoutine {
            id: id.into(),
            file_path: format!("{id}.yaml").into(),
            config: RoutineConfig {
                name: format!("Routine {id}"),
                description: None,
                enabled: true,
                triggers: Triggers {
                    schedule: Some(ScheduleTrigger {
                        when: when.into(),
                        timezone: timezone.map(Into::into),
                    }),
                },
                action: Action::NewSession {
                    title: None,
                    model: None,
                    agent: None,
                    message: "hi".into(),
                    notify: None,
                },
            },
        }
    }

    #[test]
    fn test_job_count_matches_schedulable_routines() {
        let routines = vec![
            routine("a", "0 9 * * *", Some("UTC")),
            routine("b", "every 30 minutes", None),
            routine("c", "every day at 9am", Some("Europe/Berlin")),
        ];
        let jobs = build_jobs(&routines, "http://localhost:4096");
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].routine_id, "a");
        assert_eq!(jobs[0].request.timezone.as_deref(), Some("UTC"));
    }

    #[test]
    fn test_bad_expression_skipped_not_fatal() {
        // "15" classifies as cron but cannot become a recurrence; the
        // rest of the schedule still builds.
        let routines = vec![
            routine("bad", "15", Some("UTC")),
            routine("good", "0 9 * * *", Some("UTC")),
        ];
        let jobs = build_jobs(&routines, "http://localhost:4096");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].routine_id, "good");
    }

    #[test]
    fn test_routine_without_schedule_not_scheduled() {
        let mut no_schedule = routine("manual", "0 9 * * *", None);
        no_schedule.config.triggers.schedule = None;
        let jobs = build_jobs(&[no_schedule], "http://localhost:4096");
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_request_carries_action_verbatim() {
        let mut with_extras = routine("x", "0 9 * * *", Some("UTC"));
        with_extras.config.action = Action::NewSession {
            title: Some("Digest {{date}}".into()),
            model: Some("anthropic/claude-sonnet-4".into()),
            agent: Some("researcher".into()),
            message: "go".into(),
            notify: None,
        };
        let jobs = build_jobs(&[with_extras], "http://srv");
        match &jobs[0].request.action {
            Action::NewSession { title, model, agent, .. } => {
                assert_eq!(title.as_deref(), Some("Digest {{date}}"));
                assert_eq!(model.as_deref(), Some("anthropic/claude-sonnet-4"));
                assert_eq!(agent.as_deref(), Some("researcher"));
            }
        }
    }
}
