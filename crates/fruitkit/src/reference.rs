//! Lazy references to post-deploy properties

use crate::error::{Error, Result};
use crate::resource::Resource;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type Transform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// A property of another resource that only exists after it deployed
///
/// Besides deferring a value, a reference is also a dependency edge: a
/// resource holding one deploys strictly after the referenced resource.
#[derive(Clone)]
pub struct PostDeployRef {
    target: Resource,
    prop: String,
    transform: Transform,
}

impl PostDeployRef {
    pub(crate) fn new(target: Resource, prop: impl Into<String>) -> Self {
        Self {
            target,
            prop: prop.into(),
            transform: Arc::new(|value| value),
        }
    }

    /// The resource this reference points at
    pub fn target(&self) -> &Resource {
        &self.target
    }

    /// Name of the referenced post-deploy property
    pub fn prop(&self) -> &str {
        &self.prop
    }

    /// Read the referenced value through the transform chain
    ///
    /// Fails with [`Error::DependencyNotReady`] unless the target is deployed.
    pub fn resolve(&self) -> Result<Value> {
        if !self.target.is_deployed() {
            return Err(Error::DependencyNotReady {
                target: self.target.name().to_string(),
                prop: self.prop.clone(),
            });
        }
        let raw = self.target.value(&self.prop)?;
        Ok((self.transform)(raw))
    }

    /// New reference to the same property with `f` applied after the
    /// current transform; `self` is left untouched.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        let inner = Arc::clone(&self.transform);
        Self {
            target: self.target.clone(),
            prop: self.prop.clone(),
            transform: Arc::new(move |value| f(inner(value))),
        }
    }
}

impl fmt::Debug for PostDeployRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target.name(), self.prop)
    }
}

#[cfg(test)]
mod tests {
    use crate::class::ResourceClass;
    use crate::error::Error;
    use crate::value::{Outputs, Props};
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn producer() -> Arc<ResourceClass> {
        ResourceClass::builder("producer")
            .post_deploy_props(["test"])
            .deploy(|_| async {
                let mut out = Outputs::new();
                out.insert("test".into(), json!("123"));
                Ok(out)
            })
            .fetch_currently_deployed(|| async { Ok(Default::default()) })
            .build()
            .unwrap()
    }

    fn append(suffix: &'static str) -> impl Fn(Value) -> Value + Send + Sync + 'static {
        move |value| json!(format!("{}{suffix}", value.as_str().unwrap_or_default()))
    }

    #[tokio::test]
    async fn test_resolves_to_mapped_value() {
        let target = producer().instantiate("p", Props::new()).unwrap();
        let pdp = target.post_deploy_prop("test").unwrap().map(append("456"));

        target.deploy().await.unwrap();

        assert_eq!(pdp.resolve().unwrap(), json!("123456"));
    }

    #[tokio::test]
    async fn test_resolve_fails_before_deploy() {
        let target = producer().instantiate("p", Props::new()).unwrap();
        let pdp = target.post_deploy_prop("test").unwrap();

        let err = pdp.resolve().unwrap_err();
        assert!(matches!(err, Error::DependencyNotReady { .. }));

        target.deploy().await.unwrap();
        assert_eq!(pdp.resolve().unwrap(), json!("123"));
    }

    #[tokio::test]
    async fn test_map_composes_in_order_without_mutating() {
        let target = producer().instantiate("p", Props::new()).unwrap();
        let original = target.post_deploy_prop("test").unwrap();
        let chained = original.map(append("-f")).map(append("-g"));

        target.deploy().await.unwrap();

        assert_eq!(chained.resolve().unwrap(), json!("123-f-g"));
        assert_eq!(original.resolve().unwrap(), json!("123"));
    }

    #[test]
    fn test_debug_names_target_and_prop() {
        let target = producer().instantiate("p", Props::new()).unwrap();
        let pdp = target.post_deploy_prop("test").unwrap();
        assert_eq!(format!("{pdp:?}"), "p.test");
    }
}
