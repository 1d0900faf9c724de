//! Deterministic collaborators for testing
//!
//! Every mock records the descriptors it was called with so tests can assert
//! on call order and arguments without a registry or cluster.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fnctl_core::FunctionDescriptor;

use crate::collaborators::{
    Builder, Collaborators, Deployer, DeploymentResult, DeploymentStatus, Describer, Instance,
    PipelinesProvider, Pusher, Remover, StaticContext,
};
use crate::error::{DeployError, Result, Step};
use crate::namespace::DEFAULT_NAMESPACE;

/// Digest returned by [`MockPusher`] unless configured otherwise
pub const MOCK_DIGEST: &str =
    "sha256:0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

/// Ordered log of collaborator calls shared between mocks
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn record(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Clone, Default)]
pub struct MockBuilder {
    log: CallLog,
    invocations: Arc<Mutex<Vec<FunctionDescriptor>>>,
    fail_with: Option<String>,
}

impl MockBuilder {
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn invocations(&self) -> Vec<FunctionDescriptor> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl Builder for MockBuilder {
    async fn build(&self, f: &FunctionDescriptor) -> Result<()> {
        self.log.record("build");
        self.invocations.lock().unwrap().push(f.clone());
        match &self.fail_with {
            Some(message) => Err(DeployError::collaborator(Step::Build, message.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Clone)]
pub struct MockPusher {
    log: CallLog,
    invocations: Arc<Mutex<Vec<FunctionDescriptor>>>,
    digest: String,
    fail_with: Option<String>,
}

impl Default for MockPusher {
    fn default() -> Self {
        Self {
            log: CallLog::default(),
            invocations: Arc::default(),
            digest: MOCK_DIGEST.to_string(),
            fail_with: None,
        }
    }
}

impl MockPusher {
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn invocations(&self) -> Vec<FunctionDescriptor> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl Pusher for MockPusher {
    async fn push(&self, f: &FunctionDescriptor) -> Result<String> {
        self.log.record("push");
        self.invocations.lock().unwrap().push(f.clone());
        match &self.fail_with {
            Some(message) => Err(DeployError::collaborator(Step::Push, message.clone())),
            None => Ok(self.digest.clone()),
        }
    }
}

/// Deploys into `f.namespace`, reporting `Updated` on repeat deploys
#[derive(Clone, Default)]
pub struct MockDeployer {
    log: CallLog,
    invocations: Arc<Mutex<Vec<FunctionDescriptor>>>,
    fail_with: Option<String>,
}

impl MockDeployer {
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn invocations(&self) -> Vec<FunctionDescriptor> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl Deployer for MockDeployer {
    async fn deploy(&self, f: &FunctionDescriptor) -> Result<DeploymentResult> {
        self.log.record("deploy");
        self.invocations.lock().unwrap().push(f.clone());
        if let Some(message) = &self.fail_with {
            return Err(DeployError::collaborator(Step::Deploy, message.clone()));
        }
        let namespace = f
            .namespace
            .clone()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let status = if f.deploy.namespace.as_deref() == Some(namespace.as_str()) {
            DeploymentStatus::Updated
        } else {
            DeploymentStatus::Deployed
        };
        Ok(DeploymentResult {
            url: Some(format!("http://{}.{}.example.com", f.name, namespace)),
            namespace,
            status,
        })
    }
}

/// How [`MockRemover`] answers
#[derive(Debug, Clone, Default)]
pub enum RemoveBehavior {
    #[default]
    Succeed,
    NotFound,
    Fail(String),
    /// Never completes within the given time
    Hang(Duration),
}

#[derive(Clone, Default)]
pub struct MockRemover {
    log: CallLog,
    calls: Arc<Mutex<Vec<(String, String)>>>,
    behavior: RemoveBehavior,
}

impl MockRemover {
    pub fn with_behavior(behavior: RemoveBehavior) -> Self {
        Self {
            behavior,
            ..Default::default()
        }
    }

    /// `(name, namespace)` of every removal attempt
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Remover for MockRemover {
    async fn remove(&self, name: &str, namespace: &str) -> Result<()> {
        self.log.record(format!("remove {namespace}"));
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), namespace.to_string()));
        match &self.behavior {
            RemoveBehavior::Succeed => Ok(()),
            RemoveBehavior::NotFound => Err(DeployError::NotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            }),
            RemoveBehavior::Fail(message) => {
                Err(DeployError::collaborator(Step::Remove, message.clone()))
            }
            RemoveBehavior::Hang(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(())
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct MockDescriber {
    log: CallLog,
    fail_with: Option<String>,
}

impl MockDescriber {
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Describer for MockDescriber {
    async fn describe(
        &self,
        name: &str,
        namespace: &str,
        _f: &FunctionDescriptor,
    ) -> Result<Instance> {
        self.log.record("describe");
        if let Some(message) = &self.fail_with {
            return Err(DeployError::collaborator(Step::Describe, message.clone()));
        }
        Ok(Instance {
            name: name.to_string(),
            namespace: namespace.to_string(),
            routes: vec![format!("http://{name}.{namespace}.example.com")],
        })
    }
}

/// Pretends to build and deploy remotely, recording the deployed namespace
#[derive(Clone, Default)]
pub struct MockPipelinesProvider {
    log: CallLog,
    invocations: Arc<Mutex<Vec<FunctionDescriptor>>>,
}

impl MockPipelinesProvider {
    pub fn invocations(&self) -> Vec<FunctionDescriptor> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl PipelinesProvider for MockPipelinesProvider {
    async fn run(&self, f: &FunctionDescriptor) -> Result<(String, FunctionDescriptor)> {
        self.log.record("pipeline");
        self.invocations.lock().unwrap().push(f.clone());
        let namespace = f
            .namespace
            .clone()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let mut updated = f.clone();
        updated.deploy.namespace = Some(namespace.clone());
        Ok((format!("http://{}.{namespace}.example.com", f.name), updated))
    }
}

/// A complete set of mocks sharing one call log
#[derive(Clone, Default)]
pub struct MockSet {
    pub log: CallLog,
    pub builder: MockBuilder,
    pub pusher: MockPusher,
    pub deployer: MockDeployer,
    pub remover: MockRemover,
    pub describer: MockDescriber,
    pub pipelines: MockPipelinesProvider,
    pub context: StaticContext,
}

impl MockSet {
    pub fn new() -> Self {
        Self::default().relinked()
    }

    pub fn with_context(mut self, namespace: impl Into<String>) -> Self {
        self.context = StaticContext::new(namespace);
        self
    }

    pub fn with_builder(mut self, builder: MockBuilder) -> Self {
        self.builder = builder;
        self.relinked()
    }

    pub fn with_pusher(mut self, pusher: MockPusher) -> Self {
        self.pusher = pusher;
        self.relinked()
    }

    pub fn with_deployer(mut self, deployer: MockDeployer) -> Self {
        self.deployer = deployer;
        self.relinked()
    }

    pub fn with_remover(mut self, remover: MockRemover) -> Self {
        self.remover = remover;
        self.relinked()
    }

    pub fn with_describer(mut self, describer: MockDescriber) -> Self {
        self.describer = describer;
        self.relinked()
    }

    /// Point every mock at the shared call log
    fn relinked(mut self) -> Self {
        self.builder.log = self.log.clone();
        self.pusher.log = self.log.clone();
        self.deployer.log = self.log.clone();
        self.remover.log = self.log.clone();
        self.describer.log = self.log.clone();
        self.pipelines.log = self.log.clone();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.calls()
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            builder: Arc::new(self.builder.clone()),
            pusher: Arc::new(self.pusher.clone()),
            deployer: Arc::new(self.deployer.clone()),
            remover: Arc::new(self.remover.clone()),
            describer: Arc::new(self.describer.clone()),
            pipelines: Arc::new(self.pipelines.clone()),
            context: Arc::new(self.context.clone()),
        }
    }
}
