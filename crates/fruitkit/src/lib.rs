//! # Fruitkit
//!
//! Reconciliation core for declared resources ("fruit").
//!
//! Users declare resources of typed classes, the crate diffs them against what
//! each class reports as currently deployed, orders the resulting deploy and
//! undeploy steps by their post-deploy references, and runs them one at a time.
//!
//! ## Core Concepts
//!
//! - **ResourceClass**: type descriptor with deploy/undeploy behaviour, the
//!   configuration and post-deploy property names, and the live-state fetch
//! - **Resource**: an instance of a class; holds properties and a deployment state
//! - **PostDeployRef**: a value another resource only knows after deploying;
//!   also a dependency edge between the two
//! - **Step**: `Deploy` or `Undeploy` of one named resource
//!
//! ## Example
//!
//! ```ignore
//! use fruitkit::{props, reconcile, CollectContext, LiveResources, Outputs, ResourceClass};
//! use serde_json::json;
//!
//! let bucket = ResourceClass::builder("bucket")
//!     .required_props(["region"])
//!     .post_deploy_props(["arn"])
//!     .deploy(|r| async move {
//!         let mut out = Outputs::new();
//!         out.insert("arn".into(), json!(format!("arn:bucket:{}", r.name())));
//!         Ok(out)
//!     })
//!     .undeploy(|_| async { Ok(()) })
//!     .fetch_currently_deployed(|| async { Ok(LiveResources::new()) })
//!     .build()?;
//!
//! let collection = fruitkit::collect(&|ctx: &mut CollectContext| -> fruitkit::Result<()> {
//!     let logs = ctx.describe("logs", &bucket, props([("region", "eu")]))?;
//!     let arn = logs.post_deploy_prop("arn")?;
//!     ctx.describe("backup", &bucket, props([("region", arn)]))?;
//!     Ok(())
//! })?;
//!
//! let steps = reconcile::plan(&collection, &fruitkit::SourceCompiler).await?;
//! let summary = fruitkit::execute_simple(&steps).await?;
//! ```
//!
//! ## Provider Traits
//!
//! - [`Collector`]: declares resources into a [`CollectContext`]
//! - [`ArtifactCompiler`]: turns artifact descriptors into comparable output
//! - [`ProgressCallback`]: receives progress updates
//! - [`ConfirmCallback`]: handles user confirmations

pub mod artifact;
pub mod class;
pub mod collect;
pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod planner;
pub mod reconcile;
pub mod reference;
pub mod resource;
pub mod types;
pub mod value;

// Re-export main types at crate root
pub use artifact::{ArtifactCompiler, ArtifactDescriptor, SourceCompiler};
pub use class::{ClassBuilder, Comparator, LiveResources, ResourceClass, named_comparator};
pub use collect::{CollectContext, Collection, Collector, collect};
pub use context::{AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback};
pub use error::{Error, Result};
pub use executor::{execute, execute_simple};
pub use reference::PostDeployRef;
pub use resource::{DeploymentState, Resource};
pub use types::{ExecuteSummary, Step, StepKind};
pub use value::{Outputs, PropValue, Props, props};
