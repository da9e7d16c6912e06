//! routined-daemon: lifecycle control for the routines engine.
//!
//! Health-gates startup, loads routine definitions, drives the job
//! scheduler through load/reload/stop, and provides the list, validate,
//! and run-now surfaces the CLI exposes.

mod watcher;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use routined_client::SessionClient;
use routined_config::load_routines_from_dir;
use routined_sched::{ExecutionRequest, JobScheduler, build_jobs, isolate};
use routined_template::TemplateContext;
use routined_types::{Action, LoadResult, LoadedRoutine};

pub struct DaemonOptions {
    pub routines_dir: PathBuf,
    pub server_url: String,
    /// Reload the schedule when routine files change.
    pub watch: bool,
}

/// Run the daemon until a termination signal arrives.
///
/// An unreachable or unhealthy session server is fatal before any
/// scheduling begins. After that, individual load or job failures are
/// logged and never bring the daemon down.
pub async fn start_daemon(options: DaemonOptions) -> anyhow::Result<()> {
    info!("Starting routined daemon");
    info!("Routines directory: {}", options.routines_dir.display());
    info!("Session server: {}", options.server_url);

    let client = SessionClient::new(&options.server_url);
    let health = client
        .health()
        .await
        .context("failed to connect to session server")?;
    if !health.healthy {
        bail!("session server reports unhealthy");
    }
    info!("Connected to session server (version {})", health.version);

    let mut scheduler = JobScheduler::new();
    let mut generation: u64 = 0;

    reload(&mut scheduler, &mut generation, &options).await;

    // The sender stays alive for the whole run so recv() below never
    // yields None, watcher or not.
    let (reload_tx, mut reload_rx) = mpsc::unbounded_channel();
    let _watcher = options
        .watch
        .then(|| watcher::start_watcher(options.routines_dir.clone(), reload_tx.clone()));

    info!("Daemon is running, press Ctrl+C to stop");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = reload_rx.recv() => {
                info!("Routine files changed, reloading");
                reload(&mut scheduler, &mut generation, &options).await;
            }
        }
    }

    info!("Shutting down");
    scheduler.stop().await;
    Ok(())
}

/// Stop the scheduler, reload definitions, and start a fresh generation.
/// Load failures leave the scheduler stopped until the next reload.
async fn reload(scheduler: &mut JobScheduler, generation: &mut u64, options: &DaemonOptions) {
    scheduler.stop().await;

    let result = match load_routines_from_dir(&options.routines_dir) {
        Ok(result) => result,
        Err(e) => {
            error!("Failed to load routines: {e}");
            return;
        }
    };
    log_load_summary(&result);

    if result.routines.is_empty() {
        warn!("No routines to schedule");
        return;
    }

    *generation += 1;
    let jobs = build_jobs(&result.routines, &options.server_url);
    scheduler.start(jobs, *generation);
}

fn log_load_summary(result: &LoadResult) {
    if result.errors.is_empty() {
        info!("Loaded {} routine(s)", result.routines.len());
    } else {
        info!(
            "Loaded {} routine(s), {} invalid",
            result.routines.len(),
            result.errors.len()
        );
    }
    for error in &result.errors {
        error!("{}: {}", error.file, error.error);
    }
    for routine in &result.routines {
        let schedule = routine
            .config
            .triggers
            .schedule
            .as_ref()
            .map(|s| s.when.as_str())
            .unwrap_or("no schedule");
        info!("  - {} ({schedule})", routine.id);
    }
}

/// Print every routine and its schedule, then any invalid files.
pub fn list_routines(dir: &Path) -> anyhow::Result<()> {
    let result = load_routines_from_dir(dir)?;

    if result.routines.is_empty() && result.errors.is_empty() {
        println!("No routines found.");
        return Ok(());
    }

    println!("\nLoaded Routines:");
    println!("================\n");
    for routine in &result.routines {
        println!("  {}", routine.config.name);
        println!("    ID: {}", routine.id);
        println!("    File: {}", routine.file_path.display());
        println!("    Enabled: {}", routine.config.enabled);
        if let Some(schedule) = &routine.config.triggers.schedule {
            println!("    Schedule: {}", schedule.when);
            if let Some(timezone) = &schedule.timezone {
                println!("    Timezone: {timezone}");
            }
        }
        println!("    Action: {}", routine.config.action.kind());
        if let Some(description) = &routine.config.description {
            println!("    Description: {description}");
        }
        println!();
    }

    if !result.errors.is_empty() {
        println!("\nInvalid Routines:");
        println!("=================\n");
        for error in &result.errors {
            println!("  {}: {}", error.file, error.error);
        }
        println!();
    }

    Ok(())
}

/// Validate every routine file, logging each error. Returns false when
/// any file is invalid or no files were found at all.
pub fn validate_routines(dir: &Path) -> anyhow::Result<bool> {
    info!("Validating routines in {}", dir.display());

    let result = load_routines_from_dir(dir)?;

    for error in &result.errors {
        error!("{}: {}", error.file, error.error);
    }

    if result.routines.is_empty() && result.errors.is_empty() {
        warn!("No routine files found");
        return Ok(false);
    }

    if !result.errors.is_empty() {
        error!("Validation failed: {} invalid routine(s)", result.errors.len());
        return Ok(false);
    }

    info!(
        "Validation complete: {} valid routine(s)",
        result.routines.len()
    );
    Ok(true)
}

/// Run one routine immediately, outside the schedule.
///
/// Unlike scheduled firings, failures here are returned to the caller:
/// the command exits non-zero on a missing routine or a failed execution.
pub async fn run_routine(
    dir: &Path,
    server_url: &str,
    name: &str,
    dry_run: bool,
) -> anyhow::Result<()> {
    let result = load_routines_from_dir(dir)?;

    for error in &result.errors {
        warn!("Skipped {}: {}", error.file, error.error);
    }

    let Some(routine) = result
        .routines
        .iter()
        .find(|r| r.id == name || r.config.name == name)
    else {
        error!("Routine not found: {name}");
        info!("Available routines:");
        for r in &result.routines {
            info!("  - {} ({})", r.id, r.config.name);
        }
        bail!("routine not found: {name}");
    };

    info!("Running routine: {}", routine.config.name);

    if dry_run {
        print_dry_run(routine);
        return Ok(());
    }

    let request = ExecutionRequest {
        routine_id: routine.id.clone(),
        routine_name: routine.config.name.clone(),
        action: routine.config.action.clone(),
        timezone: routine
            .config
            .triggers
            .schedule
            .as_ref()
            .and_then(|s| s.timezone.clone()),
        server_url: server_url.to_string(),
    };

    isolate::execute(&request)
        .await
        .with_context(|| format!("routine {} failed", routine.id))?;
    info!("Routine completed successfully");
    Ok(())
}

/// Show what a firing would send, with templates resolved, without
/// touching the remote server.
fn print_dry_run(routine: &LoadedRoutine) {
    let timezone = routine
        .config
        .triggers
        .schedule
        .as_ref()
        .and_then(|s| s.timezone.as_deref());
    let context = TemplateContext::now(timezone);

    match &routine.config.action {
        Action::NewSession {
            title,
            model,
            agent,
            message,
            ..
        } => {
            let message = routined_template::substitute(message, &context);
            let title = title
                .as_deref()
                .map(|t| routined_template::substitute(t, &context));

            println!("\n[DRY RUN] Would create session with:\n");
            println!("  Title: {}", title.as_deref().unwrap_or("(none)"));
            println!("  Model: {}", model.as_deref().unwrap_or("(default)"));
            println!("  Agent: {}", agent.as_deref().unwrap_or("(default)"));
            println!("  Message:\n");
            for line in message.lines() {
                println!("    {line}");
            }
            println!();
        }
    }
}
