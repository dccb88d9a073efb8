//! Configuration management.
//!
//! Resolves the database location and the directories resources are
//! extracted to. Every value is taken from, in order: an explicit CLI
//! flag, an environment variable, a built-in default.
//!
//! # Layout
//!
//! - **Database**: one database per user in the platform data directory
//!   (`IMMOSYNC_DB` overrides, `IMMOSYNC_TEST_DB` redirects to a test copy)
//! - **Resources**: `<project_dir>/<upload_dir>/<immo_dir>/<provider>/<object>/`

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Default upload directory, relative to the project directory.
pub const DEFAULT_UPLOAD_DIR: &str = "files";

/// Default OpenImmo directory below the upload directory.
pub const DEFAULT_IMMO_DIR: &str = "openimmo";

const ENV_DB: &str = "IMMOSYNC_DB";
const ENV_TEST_DB: &str = "IMMOSYNC_TEST_DB";
const ENV_PROJECT_DIR: &str = "IMMOSYNC_PROJECT_DIR";
const ENV_UPLOAD_DIR: &str = "IMMOSYNC_UPLOAD_DIR";
const ENV_IMMO_DIR: &str = "IMMOSYNC_IMMO_DIR";
const ENV_ACTOR: &str = "IMMOSYNC_ACTOR";

/// Where extracted resources live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    /// Root every indexed path is relative to.
    pub project_dir: PathBuf,
    /// Upload directory, relative to `project_dir`.
    pub upload_dir: String,
    /// OpenImmo directory, relative to `upload_dir`.
    pub immo_dir: String,
}

impl ImportConfig {
    /// Resolve from CLI flags and the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a directory setting is not a plain
    /// relative path, or the project directory cannot be determined.
    pub fn resolve(
        project_dir: Option<&Path>,
        upload_dir: Option<&str>,
        immo_dir: Option<&str>,
    ) -> Result<Self> {
        Self::resolve_with(project_dir, upload_dir, immo_dir, |key| {
            std::env::var(key).ok()
        })
    }

    /// Resolve with an explicit environment lookup.
    ///
    /// # Errors
    ///
    /// See [`ImportConfig::resolve`].
    pub fn resolve_with(
        project_dir: Option<&Path>,
        upload_dir: Option<&str>,
        immo_dir: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let project_dir = match project_dir {
            Some(dir) => dir.to_path_buf(),
            None => match lookup(ENV_PROJECT_DIR) {
                Some(dir) => PathBuf::from(dir),
                None => std::env::current_dir().map_err(|e| {
                    Error::Config(format!("cannot determine project directory: {e}"))
                })?,
            },
        };

        let upload_dir = upload_dir
            .map(str::to_string)
            .or_else(|| lookup(ENV_UPLOAD_DIR))
            .unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string());
        let immo_dir = immo_dir
            .map(str::to_string)
            .or_else(|| lookup(ENV_IMMO_DIR))
            .unwrap_or_else(|| DEFAULT_IMMO_DIR.to_string());

        Ok(Self {
            project_dir,
            upload_dir: relative_dir("upload_dir", &upload_dir)?,
            immo_dir: relative_dir("immo_dir", &immo_dir)?,
        })
    }

    /// Resource root relative to the project directory, `/`-separated.
    #[must_use]
    pub fn resource_root(&self) -> String {
        format!("{}/{}", self.upload_dir, self.immo_dir)
    }
}

/// Normalize a configured directory to a `/`-separated relative path.
fn relative_dir(setting: &str, value: &str) -> Result<String> {
    let path = Path::new(value.trim());
    let mut parts = Vec::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => {
                return Err(Error::Config(format!(
                    "{setting} must be a relative path inside the project, got \"{value}\""
                )));
            }
        }
    }

    if parts.is_empty() {
        return Err(Error::Config(format!("{setting} must not be empty")));
    }

    Ok(parts.join("/"))
}

/// Get the global immosync data directory.
#[must_use]
pub fn global_data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "immosync")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .or_else(|| directories::BaseDirs::new().map(|b| b.home_dir().join(".immosync")))
}

/// Check if test mode is enabled.
///
/// Test mode is enabled by setting `IMMOSYNC_TEST_DB=1` (or any non-empty
/// value other than `0`/`false`). It redirects all database operations to
/// an isolated test database.
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var(ENV_TEST_DB).is_ok_and(|v| is_truthy(&v))
}

fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Get the test database path.
#[must_use]
pub fn test_db_path() -> Option<PathBuf> {
    global_data_dir().map(|dir| dir.join("test").join("immosync.db"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `IMMOSYNC_TEST_DB` environment variable → uses test database
/// 3. `IMMOSYNC_DB` environment variable
/// 4. Global location: `<data dir>/immosync.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if is_test_mode() {
        return test_db_path();
    }

    if let Ok(db_path) = std::env::var(ENV_DB) {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_data_dir().map(|dir| dir.join("immosync.db"))
}

/// Get the default actor name recorded in audit events.
///
/// Priority:
/// 1. `IMMOSYNC_ACTOR` environment variable
/// 2. System username
/// 3. "immosync"
#[must_use]
pub fn default_actor() -> String {
    [ENV_ACTOR, "USER", "USERNAME"]
        .into_iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "immosync".to_string())
}
