//! Manifest loading and the manifest-backed collector
//!
//! A manifest is a TOML file declaring resources of the built-in classes:
//!
//! ```toml
//! [settings]
//! state_dir = ".state"
//!
//! [classes.file]
//! comparators = { content = "trimmed" }
//!
//! [resources.greeting]
//! class = "file"
//! content = "hello"
//!
//! [resources.greeting_link]
//! class = "link"
//! target = { ref = "greeting", prop = "path" }
//!
//! [resources.script]
//! class = "file"
//! content = { artifact = "echo hi", file = "prelude.sh" }
//! ```
//!
//! Inline tables with a `ref` key refer to a post-deploy property of another
//! resource, optionally rendered through a `format` template where `{}` is
//! the value. Inline tables with an `artifact` key are artifacts, their
//! `file` relative to the manifest. Anything else is a literal.

use anyhow::{Context, Result};
use fruitkit::{
    ArtifactDescriptor, CollectContext, Collector, Error, PropValue, Props, Resource,
    ResourceClass,
};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::drivers;

/// Parsed manifest file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub settings: Settings,

    /// Per-class settings keyed by class kind
    #[serde(default)]
    pub classes: IndexMap<String, toml::Table>,

    /// Resource declarations keyed by name, in file order
    #[serde(default)]
    pub resources: IndexMap<String, toml::Table>,

    /// Directory the manifest was loaded from
    #[serde(skip)]
    pub dir: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub state_dir: Option<String>,
}

impl Manifest {
    /// Load a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest: {}", path.display()))?;
        let mut manifest = Self::parse(&content)
            .with_context(|| format!("Invalid manifest: {}", path.display()))?;
        manifest.dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(manifest)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Declares the resources of a manifest against the built-in classes
pub struct ManifestCollector<'a> {
    manifest: &'a Manifest,
    state_dir: PathBuf,
}

impl<'a> ManifestCollector<'a> {
    pub fn new(manifest: &'a Manifest, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            manifest,
            state_dir: state_dir.into(),
        }
    }

    fn classes(&self, ctx: &mut CollectContext) -> fruitkit::Result<IndexMap<String, Arc<ResourceClass>>> {
        if let Some(kind) = self
            .manifest
            .classes
            .keys()
            .find(|kind| !drivers::KINDS.contains(&kind.as_str()))
        {
            return Err(Error::Configuration(format!(
                "settings for unknown class \"{kind}\""
            )));
        }

        let mut classes = IndexMap::new();
        for kind in drivers::KINDS {
            let Some(mut builder) = drivers::builder(kind, &self.state_dir) else {
                continue;
            };
            if let Some(settings) = self.manifest.classes.get(*kind) {
                // Drivers rely on their own property lists
                let fixed: Vec<&str> = settings
                    .keys()
                    .map(String::as_str)
                    .filter(|key| *key != "comparators")
                    .collect();
                if !fixed.is_empty() {
                    return Err(Error::Configuration(format!(
                        "only comparators can be set for built-in class \"{kind}\", got {fixed:?}"
                    )));
                }
                builder = builder.settings(&to_json_table(settings)?)?;
            }
            classes.insert((*kind).to_string(), builder.register(ctx)?);
        }
        Ok(classes)
    }
}

impl Collector for ManifestCollector<'_> {
    fn collect(&self, ctx: &mut CollectContext) -> fruitkit::Result<()> {
        let classes = self.classes(ctx)?;
        let mut declarer = Declarer {
            manifest: self.manifest,
            classes: &classes,
            visiting: Vec::new(),
        };
        for name in self.manifest.resources.keys() {
            declarer.declare(ctx, name)?;
        }
        Ok(())
    }
}

/// Depth-first declaration, so references always point at declared resources
struct Declarer<'a> {
    manifest: &'a Manifest,
    classes: &'a IndexMap<String, Arc<ResourceClass>>,
    visiting: Vec<String>,
}

impl Declarer<'_> {
    fn declare(&mut self, ctx: &mut CollectContext, name: &str) -> fruitkit::Result<Resource> {
        if let Some(resource) = ctx.get(name) {
            return Ok(resource.clone());
        }
        if self.visiting.iter().any(|n| n == name) {
            let mut chain = self.visiting.clone();
            chain.push(name.to_string());
            return Err(Error::Configuration(format!(
                "reference cycle: {}",
                chain.join(" -> ")
            )));
        }

        let (manifest, classes) = (self.manifest, self.classes);
        let table = manifest.resources.get(name).ok_or_else(|| {
            Error::Configuration(format!("reference to undeclared resource \"{name}\""))
        })?;
        let kind = table
            .get("class")
            .and_then(toml::Value::as_str)
            .ok_or_else(|| Error::Configuration(format!("resource \"{name}\" has no class")))?;
        let class = classes.get(kind).ok_or_else(|| {
            Error::Configuration(format!("unknown class \"{kind}\" of resource \"{name}\""))
        })?;

        self.visiting.push(name.to_string());
        let mut config = Props::new();
        for (key, value) in table.iter().filter(|(key, _)| key.as_str() != "class") {
            let value = self.prop_value(ctx, name, key, value)?;
            config.insert(key.clone(), value);
        }
        self.visiting.pop();

        ctx.describe(name, class, config)
    }

    fn prop_value(
        &mut self,
        ctx: &mut CollectContext,
        resource: &str,
        key: &str,
        value: &toml::Value,
    ) -> fruitkit::Result<PropValue> {
        let Some(table) = value.as_table() else {
            return Ok(PropValue::Literal(to_json(value)?));
        };

        if table.contains_key("ref") {
            let invalid = |message: &str| {
                Error::Configuration(format!("\"{key}\" of \"{resource}\": {message}"))
            };
            check_keys(table, &["ref", "prop", "format"]).map_err(|m| invalid(&m))?;
            let target = str_field(table, "ref").ok_or_else(|| invalid("`ref` must be a string"))?;
            let prop = str_field(table, "prop").ok_or_else(|| invalid("`prop` must be a string"))?;

            let reference = self.declare(ctx, target)?.post_deploy_prop(prop)?;
            return Ok(match table.get("format") {
                None => PropValue::Reference(reference),
                Some(toml::Value::String(template)) => {
                    let template = template.clone();
                    PropValue::Reference(reference.map(move |v| {
                        Value::String(template.replace("{}", &plain(&v)))
                    }))
                }
                Some(_) => return Err(invalid("`format` must be a string")),
            });
        }

        if table.contains_key("artifact") {
            let invalid = |message: &str| {
                Error::Configuration(format!("\"{key}\" of \"{resource}\": {message}"))
            };
            check_keys(table, &["artifact", "file"]).map_err(|m| invalid(&m))?;
            let source =
                str_field(table, "artifact").ok_or_else(|| invalid("`artifact` must be a string"))?;
            let mut artifact = ArtifactDescriptor::new(source);
            match table.get("file") {
                None => {}
                Some(toml::Value::String(file)) => {
                    artifact = artifact.with_file(self.manifest.dir.join(file));
                }
                Some(_) => return Err(invalid("`file` must be a string")),
            }
            return Ok(PropValue::Artifact(artifact));
        }

        Ok(PropValue::Literal(to_json(value)?))
    }
}

fn str_field<'t>(table: &'t toml::Table, key: &str) -> Option<&'t str> {
    table.get(key).and_then(toml::Value::as_str)
}

fn check_keys(table: &toml::Table, allowed: &[&str]) -> std::result::Result<(), String> {
    let unknown: Vec<&str> = table
        .keys()
        .map(String::as_str)
        .filter(|key| !allowed.contains(key))
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(format!("unknown keys {unknown:?}"))
    }
}

/// String form used in format templates, without JSON quoting
fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_json(value: &toml::Value) -> fruitkit::Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::Configuration(format!("unsupported value: {e}")))
}

fn to_json_table(table: &toml::Table) -> fruitkit::Result<serde_json::Map<String, Value>> {
    match to_json(&toml::Value::Table(table.clone()))? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::Configuration("class settings must be a table".into())),
    }
}
