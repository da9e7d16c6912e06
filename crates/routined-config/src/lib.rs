//! routined-config: routine definition discovery, parsing, and validation.

mod validate;

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use routined_types::{LoadResult, LoadedRoutine, RoutineConfig, RoutineError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("routines directory not found: {0}")]
    DirNotFound(String),
}

/// Load all routines beneath `dir` (recursive, `*.yaml` / `*.yml`).
///
/// Per-file failures are collected in the result rather than aborting the
/// load. Disabled routines are skipped without an error.
pub fn load_routines_from_dir(dir: &Path) -> Result<LoadResult, ConfigError> {
    if !dir.is_dir() {
        return Err(ConfigError::DirNotFound(dir.display().to_string()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_routine_file(path))
        .collect();
    files.sort();

    let mut result = LoadResult::default();
    for path in files {
        let file = file_name(&path);
        match load_routine_file(&path) {
            Ok(routine) if routine.config.enabled => result.routines.push(routine),
            Ok(routine) => {
                tracing::debug!(routine = %routine.id, "Skipping disabled routine");
            }
            Err(error) => result.errors.push(RoutineError { file, error }),
        }
    }
    Ok(result)
}

/// Load and validate a single routine file. The routine id is the file
/// stem, unique within one loaded set by construction.
pub fn load_routine_file(path: &Path) -> Result<LoadedRoutine, String> {
    let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let config: RoutineConfig = serde_yaml::from_str(&content).map_err(|e| e.to_string())?;

    let issues = validate::check(&config);
    if !issues.is_empty() {
        return Err(issues.join("; "));
    }

    let id = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_string();

    Ok(LoadedRoutine {
        id,
        file_path: path.to_path_buf(),
        config,
    })
}

fn is_routine_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string()
}
