//! File resource - a text file under `<state>/files`

use anyhow::{Context, Result, bail};
use fruitkit::{ClassBuilder, LiveResources, Outputs, Resource, ResourceClass};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

use super::entry_path;

pub const KIND: &str = "file";

/// The `file` class: required `content`, post-deploy `path` and `digest`
pub fn class(state_dir: &Path) -> ClassBuilder {
    let dir = state_dir.join("files");
    let (deploy_dir, undeploy_dir, fetch_dir) = (dir.clone(), dir.clone(), dir);

    ResourceClass::builder(KIND)
        .required_props(["content"])
        .post_deploy_props(["path", "digest"])
        .deploy(move |resource| {
            let dir = deploy_dir.clone();
            async move { write(&dir, &resource) }
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

/// BLAKE3 hex digest of file content
pub fn digest(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

fn outputs(path: &Path, content: &str) -> Outputs {
    let mut outputs = Outputs::new();
    outputs.insert("path".into(), json!(path.to_string_lossy()));
    outputs.insert("digest".into(), json!(digest(content)));
    outputs
}

fn write(dir: &Path, resource: &Resource) -> Result<Outputs> {
    let path = entry_path(dir, resource.name())?;
    // Live fetches read content back as text, so anything else never settles
    let content = match resource.value("content")? {
        Value::String(content) => content,
        other => bail!(
            "content of file \"{}\" must be a string, got {other}",
            resource.name()
        ),
    };

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    fs::write(&path, &content)
        .with_context(|| format!("Failed to write file: {}", path.display()))?;

    log::debug!("Wrote {} ({} bytes)", path.display(), content.len());
    Ok(outputs(&path, &content))
}

fn remove(dir: &Path, name: &str) -> Result<()> {
    let path = entry_path(dir, name)?;
    match fs::remove_file(&path) {
        Ok(()) => {
            log::debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("{} already gone", path.display());
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to remove file: {}", path.display())),
    }
}

fn list(dir: &Path) -> Result<LiveResources> {
    let mut live = LiveResources::new();
    if !dir.exists() {
        return Ok(live);
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    for path in paths {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            log::warn!("Skipping non UTF-8 file name: {}", path.display());
            continue;
        };
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        let mut record = serde_json::Map::new();
        record.insert("content".into(), Value::String(content.clone()));
        record.extend(outputs(&path, &content));
        live.insert(name.to_string(), record);
    }
    Ok(live)
}
