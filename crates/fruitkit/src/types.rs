//! Core types for reconciliation steps

use crate::resource::Resource;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which way a step moves a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    Deploy,
    Undeploy,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deploy => write!(f, "deploy"),
            Self::Undeploy => write!(f, "undeploy"),
        }
    }
}

/// One unit of execution
///
/// A modification is never a step of its own: it is an `Undeploy` of the
/// live resource followed by a `Deploy` of the declared one.
#[derive(Clone)]
pub enum Step {
    Deploy { name: String, config: Resource },
    Undeploy { name: String, config: Resource },
}

impl Step {
    pub fn deploy(config: Resource) -> Self {
        Self::Deploy {
            name: config.name().to_string(),
            config,
        }
    }

    pub fn undeploy(config: Resource) -> Self {
        Self::Undeploy {
            name: config.name().to_string(),
            config,
        }
    }

    pub fn kind(&self) -> StepKind {
        match self {
            Self::Deploy { .. } => StepKind::Deploy,
            Self::Undeploy { .. } => StepKind::Undeploy,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Deploy { name, .. } | Self::Undeploy { name, .. } => name,
        }
    }

    /// The resource the step acts on
    pub fn config(&self) -> &Resource {
        match self {
            Self::Deploy { config, .. } | Self::Undeploy { config, .. } => config,
        }
    }

    pub fn is_deploy(&self) -> bool {
        self.kind() == StepKind::Deploy
    }

    pub fn is_undeploy(&self) -> bool {
        self.kind() == StepKind::Undeploy
    }
}

/// Steps are equal when they do the same thing to the same instance
impl PartialEq for Step {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
            && self.name() == other.name()
            && self.config().ptr_eq(other.config())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.name())
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deploy { name, .. } => write!(f, "Deploy({name})"),
            Self::Undeploy { name, .. } => write!(f, "Undeploy({name})"),
        }
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub deployed: usize,
    pub undeployed: usize,
    /// Steps not executed because the run was declined
    pub skipped: usize,
}

impl ExecuteSummary {
    /// Total number of steps actually executed
    pub fn total_changes(&self) -> usize {
        self.deployed + self.undeployed
    }

    /// Total number of steps seen, executed or not
    pub fn total(&self) -> usize {
        self.total_changes() + self.skipped
    }

    /// Count one executed step
    pub fn record(&mut self, kind: StepKind) {
        match kind {
            StepKind::Deploy => self.deployed += 1,
            StepKind::Undeploy => self.undeployed += 1,
        }
    }
}
