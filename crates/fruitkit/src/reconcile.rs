//! Reconciliation runs: live fetch, compilation, plan, deploy

use crate::artifact::ArtifactCompiler;
use crate::class::ResourceClass;
use crate::collect::Collection;
use crate::context::{ConfirmCallback, ProgressCallback};
use crate::diff;
use crate::error::{Error, Result};
use crate::executor;
use crate::resource::Resource;
use crate::types::{ExecuteSummary, Step};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

/// Fetch the live resources of every class
///
/// Names reported by more than one class are a hard error.
pub async fn fetch_live(classes: &[Arc<ResourceClass>]) -> Result<IndexMap<String, Resource>> {
    let mut live: IndexMap<String, Resource> = IndexMap::new();
    let mut collisions = Vec::new();

    for class in classes {
        for (name, resource) in class.fetch_currently_deployed().await? {
            if live.contains_key(&name) {
                collisions.push(name);
            } else {
                live.insert(name, resource);
            }
        }
    }

    if !collisions.is_empty() {
        return Err(Error::NameCollision { names: collisions });
    }
    Ok(live)
}

/// Plain-data view of resources, name -> properties
pub fn context_snapshot<'a>(resources: impl IntoIterator<Item = &'a Resource>) -> Value {
    let map: serde_json::Map<String, Value> = resources
        .into_iter()
        .map(|resource| (resource.name().to_string(), resource.to_json()))
        .collect();
    Value::Object(map)
}

/// Compile every artifact property that has no compiled output yet
///
/// Returns the number of artifacts compiled.
pub async fn compile_artifacts<'a, C>(
    resources: impl IntoIterator<Item = &'a Resource>,
    compiler: &C,
    context: &Value,
) -> Result<usize>
where
    C: ArtifactCompiler + ?Sized,
{
    let mut compiled = 0;
    for resource in resources {
        for (prop, value) in resource.props() {
            let Some(artifact) = value.as_artifact() else {
                continue;
            };
            if artifact.compiled().is_some() {
                continue;
            }

            let output = compiler
                .compile(artifact, context)
                .await
                .map_err(|source| Error::Compile {
                    resource: resource.name().to_string(),
                    prop: prop.clone(),
                    source,
                })?;
            let mut artifact = artifact.clone();
            artifact.set_compiled(output);
            resource.set_artifact(&prop, artifact);
            compiled += 1;
        }
    }
    Ok(compiled)
}

/// Compute the ordered steps that reconcile the live system with `collection`
pub async fn plan<C>(collection: &Collection, compiler: &C) -> Result<Vec<Step>>
where
    C: ArtifactCompiler + ?Sized,
{
    let live = fetch_live(&collection.classes).await?;
    log::debug!("Found {} live resources", live.len());

    let context = context_snapshot(collection.resources.values());
    let count = compile_artifacts(collection.resources.values(), compiler, &context).await?
        + compile_artifacts(live.values(), compiler, &context).await?;
    if count > 0 {
        log::debug!("Compiled {count} artifacts");
    }

    diff::steps(&live, &collection.resources)
}

/// Plan, confirm, and execute
///
/// `progress` sees the plan first, also when it is empty. A declined
/// confirmation executes nothing and reports every step as skipped.
pub async fn deploy<C, P, F>(
    collection: &Collection,
    compiler: &C,
    progress: &mut P,
    confirm: &mut F,
) -> Result<ExecuteSummary>
where
    C: ArtifactCompiler + ?Sized,
    P: ProgressCallback + ?Sized,
    F: ConfirmCallback + ?Sized,
{
    let steps = plan(collection, compiler).await?;
    progress.on_plan(&steps);
    if steps.is_empty() {
        return Ok(ExecuteSummary::default());
    }

    let prompt = format!("Execute {} steps?", steps.len());
    let confirmed = confirm.confirm(&prompt).map_err(Error::Confirm)?;
    if !confirmed {
        return Ok(ExecuteSummary {
            skipped: steps.len(),
            ..Default::default()
        });
    }

    executor::execute(&steps, progress).await
}
