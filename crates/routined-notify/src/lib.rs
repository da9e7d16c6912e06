//! routined-notify: push notification delivery through the external relay.

use std::io::ErrorKind;
use std::process::Stdio;

use tracing::{error, info};

/// Relay executable expected on PATH.
const RELAY_BIN: &str = "routined-relay";

/// Outcome of one relay invocation. Kept distinct from the boolean
/// surface so failure modes stay tellable apart in the logs.
#[derive(Debug)]
enum RelayOutcome {
    Delivered,
    /// The relay executable was not found on PATH.
    MissingBinary,
    /// The relay ran but exited non-zero.
    Failed { code: i32, stderr: String },
    /// The relay could not be spawned for another reason.
    Spawn(std::io::Error),
}

/// Send a push notification through the relay.
///
/// Returns `true` only when the relay exits with status 0. Never returns
/// an error: delivery problems are logged and collapse to `false`.
pub async fn send(title: &str, body: &str, deeplink: Option<&str>) -> bool {
    match invoke(RELAY_BIN, title, body, deeplink).await {
        RelayOutcome::Delivered => {
            info!("Notification sent");
            true
        }
        RelayOutcome::MissingBinary => {
            error!("Notification failed: {RELAY_BIN} command not found");
            false
        }
        RelayOutcome::Failed { code, stderr } => {
            if stderr.is_empty() {
                error!("Notification failed: {RELAY_BIN} exited with code {code}");
            } else {
                error!("Notification failed: {RELAY_BIN} exited with code {code}: {stderr}");
            }
            false
        }
        RelayOutcome::Spawn(e) => {
            error!("Notification failed: {e}");
            false
        }
    }
}

async fn invoke(program: &str, title: &str, body: &str, deeplink: Option<&str>) -> RelayOutcome {
    let mut cmd = tokio::process::Command::new(program);
    cmd.arg("notify").arg(title).arg(body);
    if let Some(url) = deeplink {
        cmd.arg("--deeplink").arg(url);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let output = match cmd.output().await {
        Ok(output) => output,
        Err(e) if e.kind() == ErrorKind::NotFound => return RelayOutcome::MissingBinary,
        Err(e) => return RelayOutcome::Spawn(e),
    };

    if output.status.success() {
        RelayOutcome::Delivered
    } else {
        RelayOutcome::Failed {
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }
}
