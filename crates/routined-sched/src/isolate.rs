//! One-shot routine execution with message-passing status reporting.

use tokio::sync::mpsc;
use tracing::warn;

use routined_client::{NewSessionMessage, SessionClient};
use routined_template::TemplateContext;
use routined_types::Action;

use crate::ExecutionRequest;

/// Status message from an execution isolate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    Log(String),
    Error(String),
    Done,
}

/// A worker message tagged with its origin, so late arrivals from a
/// replaced scheduler generation stay attributable in the logs.
#[derive(Debug, Clone)]
pub struct IsolateEvent {
    /// Scheduler generation the isolate was spawned under.
    pub generation: u64,
    pub routine_id: String,
    pub message: WorkerMessage,
}

struct Reporter {
    events: mpsc::UnboundedSender<IsolateEvent>,
    generation: u64,
    routine_id: String,
}

impl Reporter {
    fn send(&self, message: WorkerMessage) {
        let _ = self.events.send(IsolateEvent {
            generation: self.generation,
            routine_id: self.routine_id.clone(),
            message,
        });
    }
}

/// Perform one firing of a routine.
///
/// Emits zero or more `Log`/`Error` events and always finishes with
/// exactly one `Done`. "Done" means this isolate's local work ended; the
/// remote session keeps responding on its own. Failures are reported
/// over the channel, never propagated.
pub async fn run(
    request: ExecutionRequest,
    generation: u64,
    events: mpsc::UnboundedSender<IsolateEvent>,
) {
    let reporter = Reporter {
        events,
        generation,
        routine_id: request.routine_id.clone(),
    };

    reporter.send(WorkerMessage::Log(format!(
        "Executing routine: {}",
        request.routine_name
    )));

    match execute(&request).await {
        Ok(()) => reporter.send(WorkerMessage::Log(format!(
            "Routine {} completed",
            request.routine_name
        ))),
        Err(e) => reporter.send(WorkerMessage::Error(format!(
            "Routine {} failed: {e:#}",
            request.routine_name
        ))),
    }

    reporter.send(WorkerMessage::Done);
}

/// Carry out the request's action once. Shared by scheduled firings
/// (via [`run`]) and the manual run-now path, which wants the error.
pub async fn execute(request: &ExecutionRequest) -> anyhow::Result<()> {
    let client = SessionClient::new(&request.server_url);
    let timezone = request.timezone.as_deref();

    match &request.action {
        Action::NewSession {
            title,
            model,
            agent,
            message,
            notify,
        } => {
            let context = TemplateContext::now(timezone);
            let message = routined_template::substitute(message, &context);
            let title = title
                .as_deref()
                .map(|t| routined_template::substitute(t, &context));

            let session_id = client
                .create_session_with_message(&NewSessionMessage {
                    title,
                    model: model.clone(),
                    agent: agent.clone(),
                    message,
                })
                .await?;

            if let Some(notify) = notify {
                let mut context = TemplateContext::now(timezone);
                context.insert("session_id", session_id.as_str());
                context.insert("routine_name", request.routine_name.as_str());

                let title = routined_template::substitute(&notify.title, &context);
                let body = routined_template::substitute(&notify.body, &context);
                let deeplink = notify
                    .deeplink
                    .as_deref()
                    .map(|d| routined_template::substitute(d, &context));

                // The session already exists; a missed notification does
                // not fail the firing.
                if !routined_notify::send(&title, &body, deeplink.as_deref()).await {
                    warn!(routine = %request.routine_id, "Notification delivery failed");
                }
            }
        }
    }

    Ok(())
}
