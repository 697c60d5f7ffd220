//! Link resource - a symlink under `<state>/links`

use anyhow::{Context, Result};
use fruitkit::{ClassBuilder, LiveResources, Outputs, Resource, ResourceClass};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

use super::entry_path;

pub const KIND: &str = "link";

/// The `link` class: required `target`, post-deploy `path`
pub fn class(state_dir: &Path) -> ClassBuilder {
    let dir = state_dir.join("links");
    let (deploy_dir, undeploy_dir, fetch_dir) = (dir.clone(), dir.clone(), dir);

    ResourceClass::builder(KIND)
        .required_props(["target"])
        .post_deploy_props(["path"])
        .deploy(move |resource| {
            let dir = deploy_dir.clone();
            async move { create(&dir, &resource) }
        })
        .undeploy(move |resource| {
            let dir = undeploy_dir.clone();
            async move { remove(&dir, resource.name()) }
        })
        .fetch_currently_deployed(move || {
            let dir = fetch_dir.clone();
            async move { list(&dir) }
        })
}

fn create(dir: &Path, resource: &Resource) -> Result<Outputs> {
    let path = entry_path(dir, resource.name())?;
    let target = PathBuf::from(resource.string("target")?);

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    // Replace whatever a previous deploy left behind
    if path.is_symlink() {
        fs::remove_file(&path).with_context(|| {
            format!("Failed to remove existing symlink: {}", path.display())
        })?;
    }

    symlink(&target, &path)?;
    log::debug!("Linked {} -> {}", path.display(), target.display());

    let mut outputs = Outputs::new();
    outputs.insert("path".into(), json!(path.to_string_lossy()));
    Ok(outputs)
}

#[cfg(unix)]
fn symlink(target: &Path, path: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, path).with_context(|| {
        format!(
            "Failed to create symlink: {} -> {}",
            path.display(),
            target.display()
        )
    })
}

#[cfg(windows)]
fn symlink(target: &Path, path: &Path) -> Result<()> {
    use std::os::windows::fs::{symlink_dir, symlink_file};

    if target.is_dir() {
        // Junctions need no admin privileges
        match junction::create(target, path) {
            Ok(()) => Ok(()),
            Err(e) => {
                log::debug!("Junction creation failed ({}), trying symlink_dir", e);
                symlink_dir(target, path).with_context(|| {
                    format!(
                        "Failed to create directory symlink: {} -> {}",
                        path.display(),
                        target.display()
                    )
                })
            }
        }
    } else {
        symlink_file(target, path).with_context(|| {
            format!(
                "Failed to create file symlink: {} -> {}",
                path.display(),
                target.display()
            )
        })
    }
}

#[cfg(not(any(unix, windows)))]
fn symlink(_target: &Path, _path: &Path) -> Result<()> {
    anyhow::bail!("Symlinks not supported on this platform")
}

fn remove(dir: &Path, name: &str) -> Result<()> {
    let path = entry_path(dir, name)?;
    if !path.is_symlink() && !path.exists() {
        log::debug!("{} already gone", path.display());
        return Ok(());
    }

    #[cfg(windows)]
    if path.is_dir() {
        return fs::remove_dir(&path)
            .with_context(|| format!("Failed to remove junction: {}", path.display()));
    }

    fs::remove_file(&path).with_context(|| format!("Failed to remove symlink: {}", path.display()))
}

fn read_target(path: &Path) -> Option<PathBuf> {
    if path.is_symlink() {
        return fs::read_link(path).ok();
    }
    #[cfg(windows)]
    if junction::exists(path).unwrap_or(false) {
        return junction::get_target(path).ok();
    }
    None
}

fn list(dir: &Path) -> Result<LiveResources> {
    let mut live = LiveResources::new();
    if !dir.exists() {
        return Ok(live);
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    paths.sort();

    for path in paths {
        let Some(target) = read_target(&path) else {
            log::debug!("Skipping non-link entry: {}", path.display());
            continue;
        };
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            log::warn!("Skipping non UTF-8 link name: {}", path.display());
            continue;
        };

        let mut record = serde_json::Map::new();
        record.insert("target".into(), Value::String(target.to_string_lossy().into_owned()));
        record.insert("path".into(), json!(path.to_string_lossy()));
        live.insert(name.to_string(), record);
    }
    Ok(live)
}
