//! Capabilities the lifecycle delegates to
//!
//! Each external step is a trait so local, cluster and test implementations
//! can be swapped without touching planning logic.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use fnctl_core::FunctionDescriptor;

use crate::error::Result;

/// Produces an image from function source
#[async_trait]
pub trait Builder: Send + Sync {
    /// Build `f` as `f.build.image`
    async fn build(&self, f: &FunctionDescriptor) -> Result<()>;
}

/// Publishes a built image
#[async_trait]
pub trait Pusher: Send + Sync {
    /// Push `f.build.image`, returning the registry digest
    async fn push(&self, f: &FunctionDescriptor) -> Result<String>;
}

/// Whether a deploy created or updated the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentStatus {
    Deployed,
    Updated,
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deployed => write!(f, "deployed"),
            Self::Updated => write!(f, "updated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentResult {
    pub namespace: String,
    pub status: DeploymentStatus,
    pub url: Option<String>,
}

/// Runs `f.deploy.image` in `f.namespace`
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(&self, f: &FunctionDescriptor) -> Result<DeploymentResult>;
}

/// Deletes a deployed function.
///
/// A missing target must be reported as [`crate::DeployError::NotFound`].
#[async_trait]
pub trait Remover: Send + Sync {
    async fn remove(&self, name: &str, namespace: &str) -> Result<()>;
}

/// Builds and deploys on the cluster from a git source
#[async_trait]
pub trait PipelinesProvider: Send + Sync {
    /// Returns the service url and the descriptor as updated by the pipeline
    async fn run(&self, f: &FunctionDescriptor) -> Result<(String, FunctionDescriptor)>;
}

/// Runtime information about a deployed function
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Instance {
    pub name: String,
    pub namespace: String,
    pub routes: Vec<String>,
}

#[async_trait]
pub trait Describer: Send + Sync {
    async fn describe(&self, name: &str, namespace: &str, f: &FunctionDescriptor)
    -> Result<Instance>;
}

/// Source of the active cluster context's default namespace
pub trait ClusterContext: Send + Sync {
    fn current_namespace(&self) -> Option<String>;
}

/// A fixed context namespace, or none
#[derive(Debug, Clone, Default)]
pub struct StaticContext(pub Option<String>);

impl StaticContext {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self(Some(namespace.into()))
    }
}

impl ClusterContext for StaticContext {
    fn current_namespace(&self) -> Option<String> {
        self.0.clone()
    }
}

/// The full set of collaborators used by the executor
#[derive(Clone)]
pub struct Collaborators {
    pub builder: Arc<dyn Builder>,
    pub pusher: Arc<dyn Pusher>,
    pub deployer: Arc<dyn Deployer>,
    pub remover: Arc<dyn Remover>,
    pub describer: Arc<dyn Describer>,
    pub pipelines: Arc<dyn PipelinesProvider>,
    pub context: Arc<dyn ClusterContext>,
}
