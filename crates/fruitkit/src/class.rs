//! Resource classes: validation, construction, and live-state lookup
//!
//! A [`ResourceClass`] is the type descriptor for a family of resources. It
//! owns the deploy/undeploy behaviour, the list of configuration and
//! post-deploy properties, per-property comparators, and the callback that
//! reports what is currently deployed.

use crate::artifact;
use crate::collect::CollectContext;
use crate::error::{Error, Result};
use crate::resource::Resource;
use crate::value::{Outputs, Props};
use futures::FutureExt;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Raw property maps of live resources, keyed by resource name
pub type LiveResources = IndexMap<String, serde_json::Map<String, Value>>;

pub type DeployFn = Arc<dyn Fn(Resource) -> BoxFuture<'static, anyhow::Result<Outputs>> + Send + Sync>;
pub type UndeployFn = Arc<dyn Fn(Resource) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;
pub type FetchFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<LiveResources>> + Send + Sync>;

/// Equality override for one property: `(live, declared) -> equal`
pub type Comparator = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Field names owned by the framework
pub const RESERVED_NAMES: &[&str] = &[
    "name",
    "class",
    "deployed",
    "undeployed",
    "deployment_state",
    "props",
    "post_deploy_props",
];

/// Method names exposed on resource instances
pub const RESOURCE_METHODS: &[&str] = &[
    "deploy",
    "undeploy",
    "on_deploy",
    "on_undeploy",
    "post_deploy_prop",
    "load_json",
    "prop",
    "props",
    "value",
    "string",
    "state",
    "is_deployed",
    "to_json",
    "ptr_eq",
];

/// Keys accepted by [`ClassBuilder::settings`]
pub const SETTING_KEYS: &[&str] = &["required_props", "post_deploy_props", "comparators"];

/// Type descriptor and factory for a family of resources
pub struct ResourceClass {
    kind: String,
    required_props: Vec<String>,
    post_deploy_props: Vec<String>,
    deploy: DeployFn,
    undeploy: Option<UndeployFn>,
    fetch: FetchFn,
    comparators: IndexMap<String, Comparator>,
}

impl ResourceClass {
    /// Start declaring a class named `kind`
    pub fn builder(kind: impl Into<String>) -> ClassBuilder {
        ClassBuilder::new(kind)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Configuration properties every instance must supply, in order
    pub fn required_props(&self) -> &[String] {
        &self.required_props
    }

    /// Properties only known once an instance deployed
    pub fn post_deploy_props(&self) -> &[String] {
        &self.post_deploy_props
    }

    pub fn is_post_deploy_prop(&self, prop: &str) -> bool {
        self.post_deploy_props.iter().any(|p| p == prop)
    }

    /// Custom comparator for a property, if one was declared
    pub fn comparator(&self, prop: &str) -> Option<&Comparator> {
        self.comparators.get(prop)
    }

    pub(crate) fn deploy_fn(&self) -> &DeployFn {
        &self.deploy
    }

    pub(crate) fn undeploy_fn(&self) -> Option<&UndeployFn> {
        self.undeploy.as_ref()
    }

    /// Construct a validated, not yet deployed instance of this class
    pub fn instantiate(self: &Arc<Self>, name: impl Into<String>, config: Props) -> Result<Resource> {
        Resource::new(name.into(), Arc::clone(self), config)
    }

    /// Query the live system and build one resource per reported entry
    ///
    /// Entries may carry post-deploy values next to their configuration;
    /// those are split off before validation, and an entry reporting all of
    /// them comes back in the deployed state.
    pub async fn fetch_currently_deployed(self: &Arc<Self>) -> Result<IndexMap<String, Resource>> {
        let raw = (self.fetch)().await.map_err(|source| Error::Fetch {
            class: self.kind.clone(),
            source,
        })?;

        let mut live = IndexMap::with_capacity(raw.len());
        for (name, data) in raw {
            let resource = self
                .live_resource(&name, data)
                .map_err(|e| Error::LiveResource {
                    name: name.clone(),
                    source: Box::new(e),
                })?;
            live.insert(name, resource);
        }

        log::debug!("Fetched {} live \"{}\" resources", live.len(), self.kind);
        Ok(live)
    }

    fn live_resource(self: &Arc<Self>, name: &str, mut data: serde_json::Map<String, Value>) -> Result<Resource> {
        let mut outputs = serde_json::Map::new();
        for prop in &self.post_deploy_props {
            if let Some(value) = data.remove(prop) {
                outputs.insert(prop.clone(), value);
            }
        }

        let config: Props = data
            .into_iter()
            .map(|(key, value)| (key, artifact::load_json(value)))
            .collect();
        let resource = self.instantiate(name, config)?;

        if outputs.len() == self.post_deploy_props.len() {
            resource.load_json(&outputs)?;
            resource.mark_deployed();
        }
        Ok(resource)
    }
}

impl fmt::Debug for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceClass")
            .field("kind", &self.kind)
            .field("required_props", &self.required_props)
            .field("post_deploy_props", &self.post_deploy_props)
            .field("undeploy", &self.undeploy.is_some())
            .field("comparators", &self.comparators.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder validating a class declaration
pub struct ClassBuilder {
    kind: String,
    required_props: Vec<String>,
    post_deploy_props: Vec<String>,
    deploy: Option<DeployFn>,
    undeploy: Option<UndeployFn>,
    fetch: Option<FetchFn>,
    comparators: IndexMap<String, Comparator>,
}

impl ClassBuilder {
    fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            required_props: Vec::new(),
            post_deploy_props: Vec::new(),
            deploy: None,
            undeploy: None,
            fetch: None,
            comparators: IndexMap::new(),
        }
    }

    pub fn required_props<I, S>(mut self, props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_props = props.into_iter().map(Into::into).collect();
        self
    }

    pub fn post_deploy_props<I, S>(mut self, props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.post_deploy_props = props.into_iter().map(Into::into).collect();
        self
    }

    /// Produce post-deploy values; must return every post-deploy property
    pub fn deploy<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Resource) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Outputs>> + Send + 'static,
    {
        self.deploy = Some(Arc::new(move |resource| f(resource).boxed()));
        self
    }

    /// Tear an instance down; classes without one cannot undeploy
    pub fn undeploy<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Resource) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.undeploy = Some(Arc::new(move |resource| f(resource).boxed()));
        self
    }

    /// Report the live resources of this class
    pub fn fetch_currently_deployed<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<LiveResources>> + Send + 'static,
    {
        self.fetch = Some(Arc::new(move || f().boxed()));
        self
    }

    pub fn comparator<F>(mut self, prop: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.comparators.insert(prop.into(), Arc::new(f));
        self
    }

    /// Apply plain-data settings, e.g. a table from a manifest
    ///
    /// Recognised keys are listed in [`SETTING_KEYS`]; comparators are given
    /// by name (see [`named_comparator`]).
    pub fn settings(mut self, settings: &serde_json::Map<String, Value>) -> Result<Self> {
        let unknown: Vec<String> = settings
            .keys()
            .filter(|key| !SETTING_KEYS.contains(&key.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(Error::UnknownClassSetting { keys: unknown });
        }

        if let Some(value) = settings.get("required_props") {
            self.required_props = string_list("required_props", value)?;
        }
        if let Some(value) = settings.get("post_deploy_props") {
            self.post_deploy_props = string_list("post_deploy_props", value)?;
        }
        if let Some(value) = settings.get("comparators") {
            let table = value.as_object().ok_or_else(|| Error::InvalidClassSetting {
                key: "comparators".into(),
                message: "expected a table of property = comparator".into(),
            })?;
            for (prop, name) in table {
                let name = name.as_str().unwrap_or_default();
                let comparator = named_comparator(name).ok_or_else(|| Error::InvalidClassSetting {
                    key: "comparators".into(),
                    message: format!("unknown comparator \"{name}\" for \"{prop}\""),
                })?;
                self.comparators.insert(prop.clone(), comparator);
            }
        }
        Ok(self)
    }

    /// Validate the declaration and produce the class
    pub fn build(self) -> Result<Arc<ResourceClass>> {
        let Some(fetch) = self.fetch else {
            return Err(Error::MissingClassFunction {
                class: self.kind,
                function: "fetch_currently_deployed",
            });
        };
        let Some(deploy) = self.deploy else {
            return Err(Error::MissingClassFunction {
                class: self.kind,
                function: "deploy",
            });
        };

        let forbidden: Vec<String> = self
            .required_props
            .iter()
            .chain(&self.post_deploy_props)
            .filter(|p| RESERVED_NAMES.contains(&p.as_str()) || RESOURCE_METHODS.contains(&p.as_str()))
            .cloned()
            .collect();
        if !forbidden.is_empty() {
            return Err(Error::ForbiddenProps { props: forbidden });
        }

        check_unique(&self.kind, "required_props", &self.required_props)?;
        check_unique(&self.kind, "post_deploy_props", &self.post_deploy_props)?;
        if let Some(both) = self
            .required_props
            .iter()
            .find(|p| self.post_deploy_props.contains(p))
        {
            return Err(Error::Configuration(format!(
                "\"{both}\" of class \"{}\" is both a required and a post-deploy prop",
                self.kind
            )));
        }

        Ok(Arc::new(ResourceClass {
            kind: self.kind,
            required_props: self.required_props,
            post_deploy_props: self.post_deploy_props,
            deploy,
            undeploy: self.undeploy,
            fetch,
            comparators: self.comparators,
        }))
    }

    /// Build and register the class with a collection pass
    pub fn register(self, ctx: &mut CollectContext) -> Result<Arc<ResourceClass>> {
        let class = self.build()?;
        ctx.register_class(&class);
        Ok(class)
    }
}

fn string_list(key: &str, value: &Value) -> Result<Vec<String>> {
    let invalid = || Error::InvalidClassSetting {
        key: key.to_string(),
        message: "expected a list of property names".into(),
    };
    value
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}

fn check_unique(kind: &str, key: &str, props: &[String]) -> Result<()> {
    for (i, prop) in props.iter().enumerate() {
        if props[..i].contains(prop) {
            return Err(Error::Configuration(format!(
                "\"{prop}\" is listed twice in {key} of class \"{kind}\""
            )));
        }
    }
    Ok(())
}

/// Look up a comparator by name
///
/// - `exact`: structural equality
/// - `trimmed`: strings equal after trimming surrounding whitespace
/// - `ignore_case`: strings equal ignoring ASCII case
/// - `ignore`: always equal, so the property never triggers a redeploy
pub fn named_comparator(name: &str) -> Option<Comparator> {
    let comparator: Comparator = match name {
        "exact" => Arc::new(|live, declared| live == declared),
        "trimmed" => Arc::new(|live, declared| match (live.as_str(), declared.as_str()) {
            (Some(a), Some(b)) => a.trim() == b.trim(),
            _ => live == declared,
        }),
        "ignore_case" => Arc::new(|live, declared| match (live.as_str(), declared.as_str()) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => live == declared,
        }),
        "ignore" => Arc::new(|_, _| true),
        _ => return None,
    };
    Some(comparator)
}
