//! Resource instances and their deployment lifecycle
//!
//! A [`Resource`] is a cheap, cloneable handle. Clones share the same
//! properties and deployment state, which is what lets a
//! [`PostDeployRef`] observe its target deploying.

use crate::artifact::{self, ArtifactDescriptor};
use crate::class::ResourceClass;
use crate::error::{Error, Result};
use crate::reference::PostDeployRef;
use crate::value::{Outputs, PropValue, Props};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

/// Where a resource is in its lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentState {
    /// Constructed, never deployed
    #[default]
    NotDeployed,
    /// Last deploy succeeded
    Deployed,
    /// Last undeploy succeeded
    Undeployed,
}

/// Zero-argument lifecycle callback
type Callback = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Deploy,
    Undeploy,
}

impl Transition {
    fn target_state(self) -> DeploymentState {
        match self {
            Self::Deploy => DeploymentState::Deployed,
            Self::Undeploy => DeploymentState::Undeployed,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deploy => write!(f, "onDeploy"),
            Self::Undeploy => write!(f, "onUndeploy"),
        }
    }
}

struct State {
    props: Props,
    deployment: DeploymentState,
    on_deploy: Vec<Callback>,
    on_undeploy: Vec<Callback>,
}

impl State {
    fn queue(&mut self, transition: Transition) -> &mut Vec<Callback> {
        match transition {
            Transition::Deploy => &mut self.on_deploy,
            Transition::Undeploy => &mut self.on_undeploy,
        }
    }
}

struct Inner {
    name: String,
    class: Arc<ResourceClass>,
    state: Mutex<State>,
}

/// A declared or live instance of a resource class
#[derive(Clone)]
pub struct Resource {
    inner: Arc<Inner>,
}

impl Resource {
    /// Validate `config` strictly against the class: every required prop
    /// present, nothing else.
    pub(crate) fn new(name: String, class: Arc<ResourceClass>, config: Props) -> Result<Self> {
        let missing: Vec<String> = class
            .required_props()
            .iter()
            .filter(|prop| !config.contains_key(*prop))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingProps {
                resource: name,
                props: missing,
            });
        }

        let extra: Vec<String> = config
            .keys()
            .filter(|key| !class.required_props().contains(key))
            .cloned()
            .collect();
        if !extra.is_empty() {
            return Err(Error::ExtraProps {
                resource: name,
                props: extra,
            });
        }

        Ok(Self {
            inner: Arc::new(Inner {
                name,
                class,
                state: Mutex::new(State {
                    props: config,
                    deployment: DeploymentState::NotDeployed,
                    on_deploy: Vec::new(),
                    on_undeploy: Vec::new(),
                }),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn class(&self) -> &Arc<ResourceClass> {
        &self.inner.class
    }

    pub fn state(&self) -> DeploymentState {
        self.lock().deployment
    }

    pub fn is_deployed(&self) -> bool {
        self.state() == DeploymentState::Deployed
    }

    /// Whether both handles point at the same instance
    pub fn ptr_eq(&self, other: &Resource) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Raw property value, references and artifacts included
    pub fn prop(&self, name: &str) -> Option<PropValue> {
        self.lock().props.get(name).cloned()
    }

    /// Snapshot of every property currently set
    pub fn props(&self) -> Props {
        self.lock().props.clone()
    }

    /// Resolved plain value of a property
    ///
    /// Post-deploy props fail until the resource is deployed, references are
    /// resolved, and artifacts yield their compiled output.
    pub fn value(&self, name: &str) -> Result<Value> {
        if self.class().is_post_deploy_prop(name) && !self.is_deployed() {
            return Err(Error::DependencyNotReady {
                target: self.name().to_string(),
                prop: name.to_string(),
            });
        }

        match self.prop(name) {
            Some(PropValue::Literal(value)) => Ok(value),
            Some(PropValue::Reference(reference)) => reference.resolve(),
            Some(PropValue::Artifact(artifact)) => artifact
                .compiled()
                .map(|compiled| Value::String(compiled.to_string()))
                .ok_or_else(|| Error::UncompiledArtifact {
                    resource: self.name().to_string(),
                    prop: name.to_string(),
                }),
            None => Err(Error::UnknownProp {
                resource: self.name().to_string(),
                prop: name.to_string(),
            }),
        }
    }

    /// Resolved value that must be a string
    pub fn string(&self, name: &str) -> Result<String> {
        match self.value(name)? {
            Value::String(s) => Ok(s),
            other => Ok(other.to_string()),
        }
    }

    /// Reference to one of this resource's post-deploy properties
    pub fn post_deploy_prop(&self, name: &str) -> Result<PostDeployRef> {
        if !self.class().is_post_deploy_prop(name) {
            return Err(Error::UnknownPostDeployProp {
                prop: name.to_string(),
            });
        }
        Ok(PostDeployRef::new(self.clone(), name))
    }

    /// Load post-deploy values from their plain-data form
    ///
    /// Every declared post-deploy property must be present in `data`.
    pub fn load_json(&self, data: &serde_json::Map<String, Value>) -> Result<()> {
        let post_deploy_props = self.class().post_deploy_props();
        let missing: Vec<String> = post_deploy_props
            .iter()
            .filter(|prop| !data.contains_key(*prop))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingLoadedProps {
                resource: self.name().to_string(),
                props: missing,
            });
        }

        let mut state = self.lock();
        for prop in post_deploy_props {
            let value = data.get(prop).cloned().unwrap_or(Value::Null);
            state.props.insert(prop.clone(), artifact::load_json(value));
        }
        Ok(())
    }

    /// Plain-data form of the resource (name excluded)
    pub fn to_json(&self) -> Value {
        let state = self.lock();
        let map: serde_json::Map<String, Value> = state
            .props
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect();
        Value::Object(map)
    }

    /// Run `callback` right before the next deploy
    ///
    /// Callbacks run most-recently-registered first. On a resource that is
    /// already deployed the callback is spawned onto the runtime instead of
    /// running inline.
    ///
    /// # Panics
    ///
    /// Panics when the resource is already deployed and no tokio runtime is
    /// running on the current thread.
    pub fn on_deploy<F, Fut>(&self, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(Transition::Deploy, Box::new(move || callback().boxed()));
    }

    /// Run `callback` right before the next undeploy; see [`Resource::on_deploy`]
    pub fn on_undeploy<F, Fut>(&self, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(Transition::Undeploy, Box::new(move || callback().boxed()));
    }

    fn register(&self, transition: Transition, callback: Callback) {
        let mut state = self.lock();
        if state.deployment == transition.target_state() {
            drop(state);
            self.spawn_callbacks(transition, vec![callback]);
        } else {
            state.queue(transition).push(callback);
        }
    }

    /// Run `callbacks` on a separate task, most recently registered first
    fn spawn_callbacks(&self, transition: Transition, callbacks: Vec<Callback>) {
        if callbacks.is_empty() {
            return;
        }
        let name = self.name().to_string();
        tokio::spawn(async move {
            for callback in callbacks.into_iter().rev() {
                if let Err(e) = callback().await {
                    log::warn!("{transition} callback of \"{name}\" failed: {e:#}");
                }
            }
        });
    }

    async fn drain_callbacks(&self, transition: Transition) -> Result<()> {
        loop {
            let next = self.lock().queue(transition).pop();
            let Some(callback) = next else {
                return Ok(());
            };
            callback().await.map_err(|source| Error::Callback {
                resource: self.name().to_string(),
                source,
            })?;
        }
    }

    /// Replace every reference property with its resolved value
    fn resolve_references(&self) -> Result<()> {
        let references: Vec<(String, PostDeployRef)> = self
            .lock()
            .props
            .iter()
            .filter_map(|(key, value)| value.as_reference().map(|r| (key.clone(), r.clone())))
            .collect();

        let mut resolved = Vec::with_capacity(references.len());
        for (key, reference) in references {
            resolved.push((key, reference.resolve()?));
        }

        let mut state = self.lock();
        for (key, value) in resolved {
            state.props.insert(key, PropValue::Literal(value));
        }
        Ok(())
    }

    /// Deploy this resource
    ///
    /// Resolves references, drains deploy callbacks, runs the class deploy
    /// function, and copies the returned post-deploy values onto the
    /// resource. The state only becomes [`DeploymentState::Deployed`] when
    /// every post-deploy property was returned.
    pub async fn deploy(&self) -> Result<Outputs> {
        log::debug!("Deploying \"{}\"", self.name());
        self.resolve_references()?;
        self.drain_callbacks(Transition::Deploy).await?;

        let deploy = Arc::clone(self.class().deploy_fn());
        let outputs = deploy(self.clone()).await.map_err(|source| Error::Deploy {
            resource: self.name().to_string(),
            source,
        })?;

        let post_deploy_props = self.class().post_deploy_props();
        let missing: Vec<String> = post_deploy_props
            .iter()
            .filter(|prop| !outputs.contains_key(*prop))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingDeployOutputs {
                resource: self.name().to_string(),
                props: missing,
            });
        }

        let mut state = self.lock();
        for prop in post_deploy_props {
            if let Some(value) = outputs.get(prop) {
                state.props.insert(prop.clone(), PropValue::Literal(value.clone()));
            }
        }
        state.deployment = DeploymentState::Deployed;
        drop(state);

        log::debug!("Deployed \"{}\"", self.name());
        Ok(outputs)
    }

    /// Undeploy this resource
    pub async fn undeploy(&self) -> Result<()> {
        let Some(undeploy) = self.class().undeploy_fn().cloned() else {
            return Err(Error::NoUndeploy {
                resource: self.name().to_string(),
            });
        };

        log::debug!("Undeploying \"{}\"", self.name());
        self.drain_callbacks(Transition::Undeploy).await?;
        undeploy(self.clone()).await.map_err(|source| Error::Undeploy {
            resource: self.name().to_string(),
            source,
        })?;

        self.lock().deployment = DeploymentState::Undeployed;
        log::debug!("Undeployed \"{}\"", self.name());
        Ok(())
    }

    pub(crate) fn mark_deployed(&self) {
        self.lock().deployment = DeploymentState::Deployed;
    }

    /// Take over the post-deploy values of the live counterpart
    pub(crate) fn adopt(&self, live: &Resource) {
        if self.ptr_eq(live) || !live.is_deployed() {
            return;
        }
        let adopted: Vec<(String, PropValue)> = self
            .class()
            .post_deploy_props()
            .iter()
            .filter_map(|prop| live.prop(prop).map(|value| (prop.clone(), value)))
            .collect();

        let mut state = self.lock();
        for (prop, value) in adopted {
            state.props.insert(prop, value);
        }
        state.deployment = DeploymentState::Deployed;
        let pending = std::mem::take(&mut state.on_deploy);
        drop(state);

        // Reaching Deployed by adoption still runs what was queued for it
        self.spawn_callbacks(Transition::Deploy, pending);
    }

    pub(crate) fn set_artifact(&self, prop: &str, artifact: ArtifactDescriptor) {
        self.lock()
            .props
            .insert(prop.to_string(), PropValue::Artifact(artifact));
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name())
            .field("class", &self.class().kind())
            .field("state", &self.state())
            .finish()
    }
}
