//! Local artifact compiler
//!
//! An artifact compiles to the contents of its file, when it names one,
//! followed by its source text.

use anyhow::{Context, Result};
use async_trait::async_trait;
use fruitkit::{ArtifactCompiler, ArtifactDescriptor};
use serde_json::Value;
use std::fs;

pub struct BundleCompiler;

#[async_trait]
impl ArtifactCompiler for BundleCompiler {
    async fn compile(&self, artifact: &ArtifactDescriptor, _context: &Value) -> Result<String> {
        let mut output = String::new();

        if let Some(file) = artifact.file() {
            let prelude = fs::read_to_string(file)
                .with_context(|| format!("Failed to read artifact file: {}", file.display()))?;
            output.push_str(&prelude);
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
        }

        output.push_str(artifact.source());
        log::trace!("Compiled artifact into {} bytes", output.len());
        Ok(output)
    }
}
