//! Error types for reconciliation.
//!
//! Nothing here is retried. Every variant is fatal to the current
//! reconciliation run and propagates to the caller, which decides what to do
//! with partially applied steps.

use thiserror::Error;

/// Errors raised while declaring, planning, or deploying resources.
#[derive(Debug, Error)]
pub enum Error {
    // Configuration errors
    /// A mandatory class function was not supplied
    #[error("missing {function} function in class configuration of \"{class}\"")]
    MissingClassFunction {
        class: String,
        function: &'static str,
    },

    /// Class settings contained keys the builder does not understand
    #[error("unknown class configuration property: {keys:?}")]
    UnknownClassSetting { keys: Vec<String> },

    /// A class setting had the wrong shape
    #[error("invalid class configuration property \"{key}\": {message}")]
    InvalidClassSetting { key: String, message: String },

    /// Declared property names collide with framework-owned names
    #[error("forbidden configuration property: {props:?}")]
    ForbiddenProps { props: Vec<String> },

    /// Required properties absent from a resource configuration
    #[error("missing props in configuration of \"{resource}\": {props:?}")]
    MissingProps { resource: String, props: Vec<String> },

    /// Properties supplied that the class does not declare
    #[error("extra props in configuration of \"{resource}\": {props:?}")]
    ExtraProps { resource: String, props: Vec<String> },

    /// `post_deploy_prop` called with an undeclared name
    #[error("unknown postDeployProp: \"{prop}\"")]
    UnknownPostDeployProp { prop: String },

    /// Any other invalid declaration
    #[error("configuration error: {0}")]
    Configuration(String),

    // Name collisions
    /// Two declarations in one collection pass share a name
    #[error("two resources with the same name have been declared: \"{name}\"")]
    DuplicateDeclaration { name: String },

    /// Live-state fetches from different classes returned the same names
    #[error("resources already exist: {names:?}")]
    NameCollision { names: Vec<String> },

    // Contract violations
    /// The deploy function did not return every post-deploy property
    #[error("missing props in return from deploy() of \"{resource}\": {props:?}")]
    MissingDeployOutputs { resource: String, props: Vec<String> },

    /// Serialized post-deploy data lacked declared properties
    #[error("missing post-deploy props in loaded data of \"{resource}\": {props:?}")]
    MissingLoadedProps { resource: String, props: Vec<String> },

    /// A live resource returned by a class fetch could not be constructed
    #[error("invalid currently deployed resource \"{name}\": {source}")]
    LiveResource {
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// The class declares no undeploy function
    #[error("cannot undeploy \"{resource}\": no undeploy function")]
    NoUndeploy { resource: String },

    // Ordering errors
    /// A post-deploy reference was resolved before its target deployed
    #[error("\"{target}\" is not deployed yet, cannot resolve its postDeployProp \"{prop}\"")]
    DependencyNotReady { target: String, prop: String },

    /// An artifact property was read before the compilation pass ran
    #[error("artifact property \"{prop}\" of \"{resource}\" has not been compiled")]
    UncompiledArtifact { resource: String, prop: String },

    /// A property name that does not exist on the resource
    #[error("resource \"{resource}\" has no property \"{prop}\"")]
    UnknownProp { resource: String, prop: String },

    // Failures inside user-supplied behaviour
    #[error("deploy of \"{resource}\" failed: {source}")]
    Deploy {
        resource: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("undeploy of \"{resource}\" failed: {source}")]
    Undeploy {
        resource: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("fetching currently deployed \"{class}\" resources failed: {source}")]
    Fetch {
        class: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("callback of \"{resource}\" failed: {source}")]
    Callback {
        resource: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("compiling artifact of \"{resource}\".{prop} failed: {source}")]
    Compile {
        resource: String,
        prop: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("confirmation failed: {0}")]
    Confirm(#[source] anyhow::Error),

    /// Internal invariant violated; a defect rather than a user error
    #[error("internal error: {0}")]
    Invariant(String),
}

impl Error {
    /// Whether this error was raised while validating declarations.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingClassFunction { .. }
                | Self::UnknownClassSetting { .. }
                | Self::InvalidClassSetting { .. }
                | Self::ForbiddenProps { .. }
                | Self::MissingProps { .. }
                | Self::ExtraProps { .. }
                | Self::UnknownPostDeployProp { .. }
                | Self::Configuration(_)
        )
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;
