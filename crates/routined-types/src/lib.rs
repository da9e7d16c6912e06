use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ──────────────────── Routine Definition ────────────────────

/// A declarative routine definition, as parsed from one YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineConfig {
    /// Display name for this routine.
    pub name: String,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether this routine is active. Disabled routines never load.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Trigger conditions.
    pub triggers: Triggers,
    /// Action performed when the routine fires.
    pub action: Action,
}

/// Trigger conditions for a routine.
///
/// Only schedule triggers exist today; future trigger kinds
/// (file watch, webhook) slot in as additional optional fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Triggers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleTrigger>,
}

/// A recurring schedule trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleTrigger {
    /// Schedule expression: a cron pattern ("0 9 * * *") or a
    /// human-readable phrase ("every 30 minutes").
    pub when: String,
    /// IANA timezone name the schedule is evaluated in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// Action performed when a routine fires.
///
/// New action kinds are added as variants here plus matching arms at the
/// execution sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Start a new session on the remote server and send a message.
    NewSession {
        /// Session title template.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        /// Model ID as "provider/model".
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        /// Agent name to run the session with.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent: Option<String>,
        /// Message template sent to the new session.
        message: String,
        /// Push notification sent after the session starts.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notify: Option<NotifyConfig>,
    },
}

impl Action {
    /// Wire name of this action kind (the `type` tag).
    pub fn kind(&self) -> &'static str {
        match self {
            Action::NewSession { .. } => "new_session",
        }
    }
}

/// Push notification delivered through the relay after an action completes.
/// All text fields are templates, resolved at firing time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deeplink: Option<String>,
}

fn default_true() -> bool {
    true
}

// ──────────────────── Loading Results ────────────────────

/// A routine successfully loaded and validated from disk.
#[derive(Debug, Clone)]
pub struct LoadedRoutine {
    /// Unique identifier derived from the file stem.
    pub id: String,
    /// Path the routine was loaded from.
    pub file_path: PathBuf,
    /// Validated routine definition.
    pub config: RoutineConfig,
}

/// A routine file that failed to parse or validate.
#[derive(Debug, Clone)]
pub struct RoutineError {
    /// File name that failed.
    pub file: String,
    /// What went wrong.
    pub error: String,
}

/// Outcome of loading a routines directory: valid routines alongside
/// per-file errors, never one aborting the other.
#[derive(Debug, Clone, Default)]
pub struct LoadResult {
    pub routines: Vec<LoadedRoutine>,
    pub errors: Vec<RoutineError>,
}
