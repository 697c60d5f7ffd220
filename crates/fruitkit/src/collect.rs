//! Collection of declared resources
//!
//! A collection pass runs a [`Collector`] against a fresh [`CollectContext`].
//! Classes register into that context instead of any global state, so
//! passes are independent of each other.

use crate::class::ResourceClass;
use crate::error::{Error, Result};
use crate::resource::Resource;
use crate::value::Props;
use indexmap::IndexMap;
use std::sync::Arc;

/// Source of resource declarations
pub trait Collector {
    /// Declare classes and resources into `ctx`
    fn collect(&self, ctx: &mut CollectContext) -> Result<()>;
}

impl<F> Collector for F
where
    F: Fn(&mut CollectContext) -> Result<()>,
{
    fn collect(&self, ctx: &mut CollectContext) -> Result<()> {
        self(ctx)
    }
}

/// Mutable state of one collection pass
#[derive(Debug, Default)]
pub struct CollectContext {
    classes: Vec<Arc<ResourceClass>>,
    resources: IndexMap<String, Resource>,
}

impl CollectContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a class as touched by this pass; registering twice is a no-op
    pub fn register_class(&mut self, class: &Arc<ResourceClass>) {
        if !self.classes.iter().any(|c| Arc::ptr_eq(c, class)) {
            log::trace!("Registered class \"{}\"", class.kind());
            self.classes.push(Arc::clone(class));
        }
    }

    /// Declare a resource of `class`
    pub fn describe(
        &mut self,
        name: impl Into<String>,
        class: &Arc<ResourceClass>,
        config: Props,
    ) -> Result<Resource> {
        let name = name.into();
        if self.resources.contains_key(&name) {
            return Err(Error::DuplicateDeclaration { name });
        }
        self.register_class(class);
        let resource = class.instantiate(name.clone(), config)?;
        self.resources.insert(name, resource.clone());
        Ok(resource)
    }

    /// A resource declared earlier in this pass
    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    pub fn classes(&self) -> &[Arc<ResourceClass>] {
        &self.classes
    }

    pub fn resources(&self) -> &IndexMap<String, Resource> {
        &self.resources
    }

    /// End the pass
    pub fn finish(self) -> Collection {
        Collection {
            classes: self.classes,
            resources: self.resources,
        }
    }
}

/// Everything a collection pass declared
#[derive(Debug, Default)]
pub struct Collection {
    /// Every class touched, in registration order
    pub classes: Vec<Arc<ResourceClass>>,
    /// Declared resources by name, in declaration order
    pub resources: IndexMap<String, Resource>,
}

/// Run one collection pass
pub fn collect<C>(collector: &C) -> Result<Collection>
where
    C: Collector + ?Sized,
{
    let mut ctx = CollectContext::new();
    collector.collect(&mut ctx)?;
    let collection = ctx.finish();
    log::debug!(
        "Collected {} resources of {} classes",
        collection.resources.len(),
        collection.classes.len()
    );
    Ok(collection)
}
