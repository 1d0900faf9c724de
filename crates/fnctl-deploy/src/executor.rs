//! Carries out deployment decisions
//!
//! The executor mutates the descriptor one completed step at a time, so when
//! a later step fails the descriptor still records exactly what succeeded
//! and can be saved as-is.

use std::future::Future;
use std::time::Duration;

use fnctl_core::{EffectiveConfig, FunctionDescriptor, ImageRef};
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, warn};

use crate::collaborators::{ClusterContext, Collaborators, DeploymentStatus};
use crate::error::{DeployError, Result, Step};
use crate::namespace::{NamespaceResolution, NamespaceResolver, NamespaceSource, Notice};
use crate::planner::{
    ArtifactState, DeploymentDecision, DeploymentPlanner, Operation, PlanInput, cached_image,
};

/// Default bound on removing a deployment from its old namespace
pub const DEFAULT_CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Executor options
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Overall deadline for the collaborator calls of one command
    pub timeout: Option<Duration>,
    pub cleanup_timeout: Duration,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            cleanup_timeout: DEFAULT_CLEANUP_TIMEOUT,
        }
    }
}

impl ExecutorOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout = timeout;
        self
    }
}

/// The decision for one command together with its inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub operation: Operation,
    pub decision: DeploymentDecision,
    pub target: ImageRef,
    pub state: ArtifactState,
    pub namespace: NamespaceResolution,
}

/// Plan a command for a descriptor that already carries `config`.
///
/// Validation, image and decision errors surface here, before any
/// collaborator is involved.
pub fn plan(
    operation: Operation,
    f: &FunctionDescriptor,
    config: &EffectiveConfig,
    context: &dyn ClusterContext,
) -> Result<Plan> {
    f.validate()?;
    let target = ImageRef::parse(&f.target_image()?)?;
    let state = ArtifactState::of(f, &target);
    let decision = DeploymentPlanner::new()
        .decide(&PlanInput {
            operation,
            build: config.build.clone(),
            push: config.push.clone(),
            remote: config.remote.value,
            target: target.clone(),
            state,
            cached_image: cached_image(f),
        })
        .into_result()?;
    let namespace = NamespaceResolver::new(context).resolve(&config.namespace, f);
    Ok(Plan {
        operation,
        decision,
        target,
        state,
        namespace,
    })
}

/// What happened to the deployment in the previous namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Removed { namespace: String },
    NotFound { namespace: String },
    Failed { namespace: String, message: String },
    TimedOut { namespace: String },
}

/// Outcome of a build or deploy command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub decision: DeploymentDecision,
    pub built_image: Option<String>,
    pub digest: Option<String>,
    pub deployed_image: Option<String>,
    pub namespace: Option<String>,
    pub status: Option<DeploymentStatus>,
    pub url: Option<String>,
    pub cleanup: Option<CleanupOutcome>,
    pub notices: Vec<Notice>,
}

impl Report {
    fn new(decision: DeploymentDecision) -> Self {
        Self {
            decision,
            built_image: None,
            digest: None,
            deployed_image: None,
            namespace: None,
            status: None,
            url: None,
            cleanup: None,
            notices: Vec::new(),
        }
    }
}

/// Drives collaborators in the order a plan decides
pub struct Executor {
    collaborators: Collaborators,
    options: ExecutorOptions,
}

impl Executor {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            options: ExecutorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    /// Build, and push when enabled, without deploying
    pub async fn build(
        &self,
        f: &mut FunctionDescriptor,
        config: &EffectiveConfig,
    ) -> Result<Report> {
        config.apply_to(f);
        let plan = plan(
            Operation::Build,
            f,
            config,
            self.collaborators.context.as_ref(),
        )?;
        let deadline = self.deadline();
        let mut report = Report::new(plan.decision.clone());
        self.build_and_push(f, &plan, deadline, &mut report).await?;
        Ok(report)
    }

    /// Build, push and deploy as the plan requires
    pub async fn deploy(
        &self,
        f: &mut FunctionDescriptor,
        config: &EffectiveConfig,
    ) -> Result<Report> {
        config.apply_to(f);
        let plan = plan(
            Operation::Deploy,
            f,
            config,
            self.collaborators.context.as_ref(),
        )?;
        let deadline = self.deadline();
        let mut report = Report::new(plan.decision.clone());
        report.notices.extend(plan.namespace.notices());

        match &plan.decision {
            DeploymentDecision::RemoteRun => {
                self.run_remote(f, &plan, deadline, &mut report).await?;
            }
            DeploymentDecision::DeployOnly { image } => {
                self.run_deploy(f, &plan, image.clone(), deadline, &mut report)
                    .await?;
                self.describe(f, deadline, &mut report).await;
            }
            _ => {
                let image = self.build_and_push(f, &plan, deadline, &mut report).await?;
                self.run_deploy(f, &plan, image, deadline, &mut report)
                    .await?;
                self.describe(f, deadline, &mut report).await;
            }
        }

        if let (Some(previous), Some(current)) =
            (plan.namespace.previous.as_deref(), report.namespace.clone())
        {
            if previous != current {
                self.remove_previous(&f.name, previous, &current, &mut report)
                    .await;
            }
        }
        Ok(report)
    }

    fn deadline(&self) -> Option<Instant> {
        self.options.timeout.map(|t| Instant::now() + t)
    }

    async fn guard<T>(
        &self,
        step: Step,
        deadline: Option<Instant>,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match (deadline, self.options.timeout) {
            (Some(deadline), Some(after)) => timeout_at(deadline, call)
                .await
                .map_err(|_| DeployError::Timeout { step, after })?,
            _ => call.await,
        }
    }

    /// Returns the reference to deploy: pinned to the pushed digest, or the
    /// tagged image when push is disabled
    async fn build_and_push(
        &self,
        f: &mut FunctionDescriptor,
        plan: &Plan,
        deadline: Option<Instant>,
        report: &mut Report,
    ) -> Result<String> {
        let image = plan.target.name().to_string();
        let mut candidate = f.clone();
        candidate.build.image = Some(image.clone());

        info!(image = %image, builder = ?f.build.builder, "building function");
        self.guard(
            Step::Build,
            deadline,
            self.collaborators.builder.build(&candidate),
        )
        .await?;
        f.build.image = Some(image.clone());
        f.build_stamp = f.source_fingerprint.clone();
        report.built_image = Some(image.clone());

        if !plan.decision.pushes() {
            return Ok(image);
        }

        info!(image = %image, "pushing function image");
        let digest = self
            .guard(Step::Push, deadline, self.collaborators.pusher.push(f))
            .await?;
        debug!(digest = %digest, "pushed");
        report.digest = Some(digest.clone());
        Ok(plan.target.with_digest(&digest).to_string())
    }

    async fn run_deploy(
        &self,
        f: &mut FunctionDescriptor,
        plan: &Plan,
        image: String,
        deadline: Option<Instant>,
        report: &mut Report,
    ) -> Result<()> {
        let namespace = plan.namespace.namespace.clone();
        let mut candidate = f.clone();
        candidate.namespace = Some(namespace.clone());
        candidate.deploy.image = Some(image.clone());

        info!(image = %image, namespace = %namespace, "deploying function");
        let result = self
            .guard(
                Step::Deploy,
                deadline,
                self.collaborators.deployer.deploy(&candidate),
            )
            .await?;

        if plan.namespace.source == NamespaceSource::Explicit {
            f.namespace = Some(namespace);
        }
        f.deploy.namespace = Some(result.namespace.clone());
        f.deploy.image = Some(image.clone());

        report.deployed_image = Some(image);
        report.namespace = Some(result.namespace);
        report.status = Some(result.status);
        report.url = result.url;
        Ok(())
    }

    async fn run_remote(
        &self,
        f: &mut FunctionDescriptor,
        plan: &Plan,
        deadline: Option<Instant>,
        report: &mut Report,
    ) -> Result<()> {
        let namespace = plan.namespace.namespace.clone();
        let mut candidate = f.clone();
        candidate.build.git = f.build.git.resolved();
        candidate.namespace = Some(namespace.clone());
        candidate.deploy.image = Some(plan.target.to_string());

        info!(namespace = %namespace, git = ?candidate.build.git.url, "starting remote pipeline");
        let (url, updated) = self
            .guard(
                Step::Pipeline,
                deadline,
                self.collaborators.pipelines.run(&candidate),
            )
            .await?;

        let requested = if plan.namespace.source == NamespaceSource::Explicit {
            Some(namespace.clone())
        } else {
            f.namespace.clone()
        };
        *f = FunctionDescriptor {
            root: f.root.clone(),
            build_stamp: f.build_stamp.clone(),
            source_fingerprint: f.source_fingerprint.clone(),
            namespace: requested,
            ..updated
        };
        let deployed = f.deploy.namespace.get_or_insert(namespace).clone();

        report.namespace = Some(deployed);
        report.deployed_image = f.deploy.image.clone();
        report.url = Some(url);
        Ok(())
    }

    /// Routes are informational; a failure only adds a warning
    async fn describe(
        &self,
        f: &FunctionDescriptor,
        deadline: Option<Instant>,
        report: &mut Report,
    ) {
        let Some(namespace) = report.namespace.clone() else {
            return;
        };
        let described = self
            .guard(
                Step::Describe,
                deadline,
                self.collaborators.describer.describe(&f.name, &namespace, f),
            )
            .await;
        match described {
            Ok(instance) => {
                if let Some(route) = instance.routes.into_iter().next() {
                    report.url = Some(route);
                }
            }
            Err(e) => {
                warn!(error = %e, "unable to describe function");
                report
                    .notices
                    .push(Notice::Warning(format!("unable to describe function: {e}")));
            }
        }
    }

    /// Best effort, bounded by the cleanup timeout; never fails the deploy
    async fn remove_previous(
        &self,
        name: &str,
        previous: &str,
        current: &str,
        report: &mut Report,
    ) {
        info!(
            "Deleting old func in '{}' because the namespace has changed to '{}'",
            previous, current
        );
        let removal = timeout(
            self.options.cleanup_timeout,
            self.collaborators.remover.remove(name, previous),
        )
        .await;

        let namespace = previous.to_string();
        let outcome = match removal {
            Ok(Ok(())) => {
                report.notices.push(Notice::Info(format!(
                    "removed previous deployment from namespace {previous}"
                )));
                CleanupOutcome::Removed { namespace }
            }
            Ok(Err(e)) if e.is_not_found() => {
                warn!(namespace = previous, "previous deployment not found");
                report.notices.push(Notice::Warning(format!(
                    "Cant undeploy Function in namespace '{previous}' - service not found"
                )));
                CleanupOutcome::NotFound { namespace }
            }
            Ok(Err(e)) => {
                warn!(namespace = previous, error = %e, "failed to remove previous deployment");
                report.notices.push(Notice::Warning(format!(
                    "failed to remove previous deployment from namespace {previous}: {e}"
                )));
                CleanupOutcome::Failed {
                    namespace,
                    message: e.to_string(),
                }
            }
            Err(_) => {
                warn!(namespace = previous, "timed out removing previous deployment");
                report.notices.push(Notice::Warning(format!(
                    "timed out after {}s removing previous deployment from namespace {previous}",
                    self.options.cleanup_timeout.as_secs()
                )));
                CleanupOutcome::TimedOut { namespace }
            }
        };
        report.cleanup = Some(outcome);
    }
}
