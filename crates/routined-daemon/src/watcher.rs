//! Routines directory watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify_debouncer_mini::new_debouncer;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Coalescing window for bursts of file-change events.
const DEBOUNCE: Duration = Duration::from_secs(2);

/// Watch `dir` for routine file changes. One unit event is forwarded to
/// `reloads` per debounced burst. The watcher lives until the receiving
/// side of `reloads` is dropped.
pub(crate) fn start_watcher(
    dir: PathBuf,
    reloads: mpsc::UnboundedSender<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || run_watcher(dir, reloads))
}

fn run_watcher(dir: PathBuf, reloads: mpsc::UnboundedSender<()>) {
    let (tx, rx) = std::sync::mpsc::channel();

    let mut debouncer = match new_debouncer(DEBOUNCE, tx) {
        Ok(d) => d,
        Err(e) => {
            warn!("Failed to create file watcher: {e}");
            return;
        }
    };

    if let Err(e) = debouncer
        .watcher()
        .watch(&dir, notify::RecursiveMode::Recursive)
    {
        warn!("Failed to watch {}: {e}", dir.display());
        return;
    }

    info!("Watching {} for changes", dir.display());

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                if events.iter().any(|event| is_routine_path(&event.path)) {
                    debug!("Routine files changed");
                    if reloads.send(()).is_err() {
                        break;
                    }
                }
            }
            Ok(Err(e)) => {
                warn!("Watcher error: {e:?}");
            }
            Err(_) => {
                info!("Watcher channel closed, stopping");
                break;
            }
        }
    }
}

fn is_routine_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}
