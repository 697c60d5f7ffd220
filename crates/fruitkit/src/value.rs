//! Property values held by resources
//!
//! A property is either a plain JSON literal, a deferred reference to
//! another resource's post-deploy property, or an un-compiled artifact.

use crate::artifact::ArtifactDescriptor;
use crate::reference::PostDeployRef;
use indexmap::IndexMap;
use serde_json::{Value, json};
use std::fmt;

/// Insertion-ordered property map of a resource
pub type Props = IndexMap<String, PropValue>;

/// Values produced by a deploy function, keyed by post-deploy property name
pub type Outputs = serde_json::Map<String, Value>;

/// A single property value
#[derive(Clone)]
pub enum PropValue {
    /// Plain data, compared structurally
    Literal(Value),
    /// Value only known once another resource has deployed
    Reference(PostDeployRef),
    /// User code that must be compiled before comparison or deployment
    Artifact(ArtifactDescriptor),
}

impl PropValue {
    /// Literal JSON value, if this is one
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Self::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Post-deploy reference, if this is one
    pub fn as_reference(&self) -> Option<&PostDeployRef> {
        match self {
            Self::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    /// Artifact descriptor, if this is one
    pub fn as_artifact(&self) -> Option<&ArtifactDescriptor> {
        match self {
            Self::Artifact(artifact) => Some(artifact),
            _ => None,
        }
    }

    /// Plain-data rendering used for compiler context snapshots
    ///
    /// References render as a small tagged object naming their target,
    /// since their value may not exist yet.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Artifact(artifact) => artifact.to_json(),
            Self::Reference(reference) => json!({
                "_postDeployRef": {
                    "resource": reference.target().name(),
                    "prop": reference.prop(),
                }
            }),
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "Literal({value})"),
            Self::Reference(reference) => write!(f, "Reference({reference:?})"),
            Self::Artifact(artifact) => write!(f, "Artifact({artifact:?})"),
        }
    }
}

impl From<Value> for PropValue {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::Literal(Value::String(value.to_string()))
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        Self::Literal(Value::String(value))
    }
}

impl From<PostDeployRef> for PropValue {
    fn from(reference: PostDeployRef) -> Self {
        Self::Reference(reference)
    }
}

impl From<ArtifactDescriptor> for PropValue {
    fn from(artifact: ArtifactDescriptor) -> Self {
        Self::Artifact(artifact)
    }
}

/// Build a [`Props`] map from `(name, value)` pairs
pub fn props<I, K, V>(pairs: I) -> Props
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<PropValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_props_builder_keeps_order() {
        let p = props([("b", json!(2)), ("a", json!(1))]);
        let keys: Vec<_> = p.keys().cloned().collect();
        assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_literal_to_json() {
        let value = PropValue::from("hello");
        assert_eq!(value.to_json(), json!("hello"));
        assert!(value.as_reference().is_none());
    }

    #[test]
    fn test_artifact_to_json_is_tagged() {
        let value = PropValue::from(ArtifactDescriptor::new("x => x"));
        assert_eq!(value.to_json()["_artifact"], json!(true));
    }
}
