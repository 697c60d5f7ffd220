// Reconciliation commands
pub mod deploy;
pub mod plan;

use anyhow::{Context as _, Result};
use fruitkit::Collection;
use std::path::{Path, PathBuf};

use crate::manifest::{Manifest, ManifestCollector};
use crate::paths;

/// Collect the resources declared by the manifest at `arg`
///
/// `arg` is a manifest file or a directory holding one.
pub fn collect(arg: &Path, state_dir_flag: Option<&Path>) -> Result<Collection> {
    let path = paths::manifest_path(arg);
    let manifest = Manifest::load(&path)?;
    let state_dir = state_dir(&manifest, state_dir_flag)?;
    log::info!("Using state directory {}", state_dir.display());

    fruitkit::collect(&ManifestCollector::new(&manifest, state_dir))
        .with_context(|| format!("Failed to collect resources from {}", path.display()))
}

fn state_dir(manifest: &Manifest, flag: Option<&Path>) -> Result<PathBuf> {
    let dir = paths::resolve_state_dir(flag, manifest.settings.state_dir.as_deref(), &manifest.dir)?;
    std::path::absolute(&dir)
        .with_context(|| format!("Could not resolve state directory: {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::BundleCompiler;
    use fruitkit::{execute_simple, reconcile};
    use std::fs;

    const SITE: &str = r#"
[resources.shortcut]
class = "link"
target = { ref = "greeting", prop = "path", format = "{}" }

[resources.greeting]
class = "file"
content = { artifact = "hello", file = "header.txt" }
"#;

    fn rendered(steps: &[fruitkit::Step]) -> Vec<String> {
        steps.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_collect_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(paths::MANIFEST_FILE),
            "[resources.greeting]\nclass = \"file\"\ncontent = \"hello\"\n",
        )
        .unwrap();

        let state = dir.path().join("state");
        let collection = collect(dir.path(), Some(&state)).unwrap();
        assert!(collection.resources.contains_key("greeting"));
    }

    #[test]
    fn test_collect_reports_manifest_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect(dir.path(), None).unwrap_err();
        assert!(format!("{err:#}").contains(paths::MANIFEST_FILE));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_manifest_reconciles_and_settles() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state");
        let manifest = dir.path().join(paths::MANIFEST_FILE);
        fs::write(&manifest, SITE).unwrap();
        fs::write(dir.path().join("header.txt"), "# greeting").unwrap();

        let collection = collect(dir.path(), Some(&state)).unwrap();
        let steps = reconcile::plan(&collection, &BundleCompiler).await.unwrap();
        assert_eq!(rendered(&steps), vec!["deploy greeting", "deploy shortcut"]);
        execute_simple(&steps).await.unwrap();

        let file = state.join("files").join("greeting");
        assert_eq!(fs::read_to_string(&file).unwrap(), "# greeting\nhello");
        assert_eq!(fs::read_link(state.join("links").join("shortcut")).unwrap(), file);

        let collection = collect(dir.path(), Some(&state)).unwrap();
        let steps = reconcile::plan(&collection, &BundleCompiler).await.unwrap();
        assert!(steps.is_empty(), "unexpected steps: {steps:?}");

        fs::write(&manifest, "").unwrap();
        let collection = collect(dir.path(), Some(&state)).unwrap();
        let steps = reconcile::plan(&collection, &BundleCompiler).await.unwrap();
        assert_eq!(rendered(&steps), vec!["undeploy greeting", "undeploy shortcut"]);
        execute_simple(&steps).await.unwrap();
        assert!(!file.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_changed_content_redeploys_dependents() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state");
        fs::write(dir.path().join(paths::MANIFEST_FILE), SITE).unwrap();
        fs::write(dir.path().join("header.txt"), "# greeting").unwrap();

        let collection = collect(dir.path(), Some(&state)).unwrap();
        let steps = reconcile::plan(&collection, &BundleCompiler).await.unwrap();
        execute_simple(&steps).await.unwrap();

        fs::write(dir.path().join("header.txt"), "# hello again").unwrap();
        let collection = collect(dir.path(), Some(&state)).unwrap();
        let steps = reconcile::plan(&collection, &BundleCompiler).await.unwrap();
        let steps = rendered(&steps);
        assert_eq!(steps.len(), 4, "{steps:?}");
        let position = |line: &str| steps.iter().position(|s| s == line).unwrap();
        assert!(position("undeploy greeting") < position("deploy greeting"));
        assert!(position("deploy greeting") < position("deploy shortcut"));
        assert!(position("undeploy shortcut") < position("deploy shortcut"));
    }

    #[tokio::test]
    async fn test_literal_content_settles_and_numbers_fail() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state");
        let manifest = dir.path().join(paths::MANIFEST_FILE);
        fs::write(&manifest, "[resources.note]\nclass = \"file\"\ncontent = \"42\"\n").unwrap();

        let collection = collect(dir.path(), Some(&state)).unwrap();
        let steps = reconcile::plan(&collection, &BundleCompiler).await.unwrap();
        execute_simple(&steps).await.unwrap();

        let collection = collect(dir.path(), Some(&state)).unwrap();
        let steps = reconcile::plan(&collection, &BundleCompiler).await.unwrap();
        assert!(steps.is_empty(), "unexpected steps: {steps:?}");

        fs::write(&manifest, "[resources.count]\nclass = \"file\"\ncontent = 42\n").unwrap();
        let collection = collect(dir.path(), Some(&state)).unwrap();
        let steps = reconcile::plan(&collection, &BundleCompiler).await.unwrap();
        let err = execute_simple(&steps).await.unwrap_err();
        assert!(format!("{err:#}").contains("must be a string"), "{err:#}");
        assert!(!state.join("files").join("count").exists());
    }
}
