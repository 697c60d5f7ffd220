//! Centralized path resolution for tutti-frutti
//!
//! # Environment Variables
//!
//! - `TUTTI_FRUTTI_STATE_DIR` - Override state directory
//!
//! # Path Resolution Priority
//!
//! For resolve_state_dir():
//! 1. `--state-dir` flag
//! 2. `[settings] state_dir` in the manifest
//! 3. `TUTTI_FRUTTI_STATE_DIR` environment variable
//! 4. `XDG_STATE_HOME/tutti-frutti` (if set)
//! 5. Platform default:
//!    - Windows: `%LOCALAPPDATA%\tutti-frutti`
//!    - macOS/Linux: `~/.local/state/tutti-frutti`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "TUTTI_FRUTTI_STATE_DIR";

/// Manifest file looked up inside a directory argument
pub const MANIFEST_FILE: &str = "tutti-frutti.toml";

const APP_DIR: &str = "tutti-frutti";

/// Get the default state directory path
///
/// Priority:
/// 1. `TUTTI_FRUTTI_STATE_DIR` env var
/// 2. `XDG_STATE_HOME/tutti-frutti`
/// 3. Platform default
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join(APP_DIR);
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            let path = local_app_data.join(APP_DIR);
            log::debug!("Using Windows state dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join(APP_DIR);
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// State directory for a run, flag and manifest setting first
///
/// A relative manifest setting is taken relative to the manifest directory.
pub fn resolve_state_dir(
    flag: Option<&Path>,
    setting: Option<&str>,
    manifest_dir: &Path,
) -> Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(expand(&dir.to_string_lossy()));
    }
    if let Some(dir) = setting {
        let path = expand(dir);
        log::debug!("Using state dir from manifest: {}", path.display());
        return Ok(if path.is_absolute() {
            path
        } else {
            manifest_dir.join(path)
        });
    }
    state_dir()
}

/// Manifest file for a CLI argument: the file itself, or
/// `tutti-frutti.toml` inside a directory
pub fn manifest_path(arg: &Path) -> PathBuf {
    let path = expand(&arg.to_string_lossy());
    if path.is_dir() {
        path.join(MANIFEST_FILE)
    } else {
        path
    }
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
