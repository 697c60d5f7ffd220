//! Artifact descriptors and the compiler seam
//!
//! An artifact is a piece of user code attached to a property. It is compiled
//! once per reconciliation run, before diffing, and the compiled output is
//! what gets compared against the live value.

use crate::value::PropValue;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

/// Tag marking the JSON form of an artifact descriptor
pub const ARTIFACT_TAG: &str = "_artifact";

/// Un-compiled reference to user code
#[derive(Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    source: String,
    file: Option<PathBuf>,
    compiled: Option<String>,
}

/// Plain-data form that crosses process boundaries
#[derive(Debug, Serialize, Deserialize)]
struct ArtifactJson {
    #[serde(rename = "_artifact")]
    tag: bool,
    source: String,
    #[serde(default)]
    file: Option<PathBuf>,
}

impl ArtifactDescriptor {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            file: None,
            compiled: None,
        }
    }

    /// Attach the file the source text was declared in
    pub fn with_file(mut self, file: impl AsRef<Path>) -> Self {
        self.file = Some(file.as_ref().to_path_buf());
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Output of the compilation pass, once it ran
    pub fn compiled(&self) -> Option<&str> {
        self.compiled.as_deref()
    }

    pub fn set_compiled(&mut self, compiled: impl Into<String>) {
        self.compiled = Some(compiled.into());
    }

    /// Serialize to the tagged JSON form (compiled output is not carried)
    pub fn to_json(&self) -> Value {
        let wire = ArtifactJson {
            tag: true,
            source: self.source.clone(),
            file: self.file.clone(),
        };
        serde_json::to_value(wire).unwrap_or(Value::Null)
    }
}

impl fmt::Debug for ArtifactDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactDescriptor")
            .field("source", &self.source)
            .field("file", &self.file)
            .field("compiled", &self.compiled.is_some())
            .finish()
    }
}

/// Reconstitute a JSON value into a property value
///
/// Objects tagged with [`ARTIFACT_TAG`] become artifact descriptors, anything
/// else passes through unchanged as a literal.
pub fn load_json(value: Value) -> PropValue {
    let tagged = value
        .get(ARTIFACT_TAG)
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !tagged {
        return PropValue::Literal(value);
    }

    match serde_json::from_value::<ArtifactJson>(value.clone()) {
        Ok(wire) => PropValue::Artifact(ArtifactDescriptor {
            source: wire.source,
            file: wire.file,
            compiled: None,
        }),
        Err(e) => {
            log::debug!("Tagged artifact object did not parse ({e}), keeping it as a literal");
            PropValue::Literal(value)
        }
    }
}

/// Turns artifact descriptors into deployable output
///
/// `context` is a plain-data snapshot of every declared resource
/// (name -> properties), available to compilers that inline declarations.
#[async_trait]
pub trait ArtifactCompiler: Send + Sync {
    async fn compile(&self, artifact: &ArtifactDescriptor, context: &Value)
    -> anyhow::Result<String>;
}

/// Compiler whose output is the source text itself
pub struct SourceCompiler;

#[async_trait]
impl ArtifactCompiler for SourceCompiler {
    async fn compile(
        &self,
        artifact: &ArtifactDescriptor,
        _context: &Value,
    ) -> anyhow::Result<String> {
        Ok(artifact.source().to_string())
    }
}
