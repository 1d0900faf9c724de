//! fnctl deploy - deployment planning and execution
//!
//! This crate provides:
//! - **Collaborators**: capability traits for build, push, deploy, remove,
//!   describe and remote pipelines, with Knative and local-tool implementations
//! - **Namespace resolution**: target namespace precedence and migration notices
//! - **Planner**: the build/push/deploy decision for one invocation
//! - **Executor**: runs a plan against collaborators and records the outcome
//! - **Stores**: `func.yaml` persistence, on disk or in memory
//! - **Mocks**: deterministic collaborators for tests

pub mod collaborators;
pub mod error;
pub mod executor;
pub mod knative;
pub mod mock;
pub mod namespace;
pub mod planner;
pub mod process;
pub mod store;

pub use collaborators::{
    Builder, ClusterContext, Collaborators, Deployer, DeploymentResult, DeploymentStatus,
    Describer, Instance, PipelinesProvider, Pusher, Remover, StaticContext,
};
pub use error::{DeployError, Result, Step};
pub use executor::{CleanupOutcome, Executor, ExecutorOptions, Plan, Report, plan};
pub use knative::{KnativeDeployer, KnativeDescriber, KnativeRemover, KubeconfigContext};
pub use mock::MockSet;
pub use namespace::{
    DEFAULT_NAMESPACE, NamespaceResolution, NamespaceResolver, NamespaceSource, Notice,
};
pub use planner::{ArtifactState, DecisionError, DeploymentDecision, DeploymentPlanner, Operation};
pub use process::{Disconnected, DockerPusher, NoPipelines, ToolBuilder, local_collaborators};
pub use store::{FileStore, FunctionStore, MemoryStore};
