//! Job scheduling state machine: live triggers, isolate launching, and
//! status relay.

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::Job;
use crate::isolate::{self, IsolateEvent, WorkerMessage};

/// Owns the live set of recurring triggers.
///
/// Strictly two states, stopped (initial) and running. Reload is
/// stop-then-rebuild-then-start, driven by the daemon, which also
/// serializes reloads so the transition is never re-entered.
pub struct JobScheduler {
    state: State,
}

enum State {
    Stopped,
    Running {
        cancel: CancellationToken,
        timers: Vec<JoinHandle<()>>,
        events: mpsc::UnboundedSender<IsolateEvent>,
    },
}

impl JobScheduler {
    pub fn new() -> Self {
        Self {
            state: State::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running { .. })
    }

    /// Number of live job timers (zero when stopped).
    pub fn job_count(&self) -> usize {
        match &self.state {
            State::Stopped => 0,
            State::Running { timers, .. } => timers.len(),
        }
    }

    /// Install `jobs` as live triggers, each bound to an isolate
    /// launcher. Ignored with a warning when already running.
    pub fn start(&mut self, jobs: Vec<Job>, generation: u64) {
        if self.is_running() {
            warn!("Scheduler already running, ignoring start");
            return;
        }

        let cancel = CancellationToken::new();
        let (events, rx) = mpsc::unbounded_channel();

        // Relay task: drains isolate events into the log. It runs until
        // every sender is gone (the scheduler's own plus any in-flight
        // isolates), so late events from a stopped generation still land
        // in the log instead of being dropped.
        tokio::spawn(relay_events(rx));

        let timers: Vec<JoinHandle<()>> = jobs
            .into_iter()
            .map(|job| {
                tokio::spawn(run_job_timer(
                    job,
                    generation,
                    cancel.clone(),
                    events.clone(),
                ))
            })
            .collect();

        info!(generation, jobs = timers.len(), "Scheduler started");
        self.state = State::Running {
            cancel,
            timers,
            events,
        };
    }

    /// Cancel pending trigger timers and return to stopped. In-flight
    /// isolates are not interrupted; they finish on their own and their
    /// events drain through the relay.
    pub async fn stop(&mut self) {
        let State::Running {
            cancel,
            timers,
            events,
        } = std::mem::replace(&mut self.state, State::Stopped)
        else {
            return;
        };

        cancel.cancel();
        drop(events);
        for timer in timers {
            if let Err(e) = timer.await {
                if !e.is_cancelled() {
                    warn!("Job timer task failed: {e}");
                }
            }
        }
        info!("Scheduler stopped");
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_job_timer(
    job: Job,
    generation: u64,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<IsolateEvent>,
) {
    loop {
        let now = Utc::now();
        let Some(next) = job.recurrence.next_after(now) else {
            warn!(routine = %job.routine_id, "No further firings, retiring job");
            return;
        };
        let delay = (next - now).to_std().unwrap_or_default();
        debug!(routine = %job.routine_id, at = %next, "Next firing scheduled");

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        // Launch without awaiting: a slow isolate must not delay this
        // job's next firing or any other job's. Overlapping firings of
        // the same job are allowed.
        tokio::spawn(isolate::run(job.request.clone(), generation, events.clone()));
    }
}

async fn relay_events(mut rx: mpsc::UnboundedReceiver<IsolateEvent>) {
    while let Some(event) = rx.recv().await {
        match event.message {
            WorkerMessage::Log(text) => {
                info!(routine = %event.routine_id, generation = event.generation, "{text}");
            }
            WorkerMessage::Error(text) => {
                error!(routine = %event.routine_id, generation = event.generation, "{text}");
            }
            WorkerMessage::Done => {
                debug!(routine = %event.routine_id, generation = event.generation, "Firing finished");
            }
        }
    }
}
