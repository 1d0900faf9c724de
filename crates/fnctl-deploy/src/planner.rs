//! Deployment decisions
//!
//! The planner is a pure function of the resolved settings and the persisted
//! artifact state. It never calls a collaborator; the executor carries out
//! whatever it decides.

use std::fmt;

use fnctl_core::{BuildMode, FunctionDescriptor, ImageRef, Resolved};
use tracing::debug;

use crate::error::{DeployError, Result};

/// The lifecycle command being planned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Build,
    Deploy,
}

/// State of the artifact for the image about to be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    /// No build recorded
    NotBuilt,
    /// The last build targeted another image, or the source changed since
    BuiltStale,
    /// The last build matches the target image and source
    BuiltFresh,
    /// An explicit image pinned to a digest
    Digested,
}

impl ArtifactState {
    /// Classify the artifact of `f` against the `target` image
    pub fn of(f: &FunctionDescriptor, target: &ImageRef) -> Self {
        if target.is_digested() {
            return ArtifactState::Digested;
        }
        match f.build.image.as_deref() {
            None => ArtifactState::NotBuilt,
            Some(built) if built != target.name() => ArtifactState::BuiltStale,
            Some(_) => match (f.source_fingerprint.as_deref(), f.build_stamp.as_deref()) {
                (Some(current), Some(stamp)) if current != stamp => ArtifactState::BuiltStale,
                _ => ArtifactState::BuiltFresh,
            },
        }
    }

    fn needs_build(&self) -> bool {
        matches!(self, ArtifactState::NotBuilt | ArtifactState::BuiltStale)
    }
}

impl fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotBuilt => "not built",
            Self::BuiltStale => "built, stale",
            Self::BuiltFresh => "built, up to date",
            Self::Digested => "digested",
        };
        write!(f, "{}", s)
    }
}

/// Why a deploy was refused before any collaborator ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionError {
    NotBuilt { state: ArtifactState },
    DigestConflict { flag: &'static str, value: String },
}

impl From<DecisionError> for DeployError {
    fn from(e: DecisionError) -> Self {
        match e {
            DecisionError::NotBuilt { state } => DeployError::NotBuilt {
                reason: match state {
                    ArtifactState::BuiltStale => {
                        "the registry, image or source changed since the last build".to_string()
                    }
                    _ => "no build found and --build=false".to_string(),
                },
            },
            DecisionError::DigestConflict { flag, value } => DeployError::DigestConflict {
                flag: flag.to_string(),
                value,
            },
        }
    }
}

/// What a command will do, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentDecision {
    /// Build (and optionally push) without deploying
    BuildOnly { push: bool },
    BuildPushDeploy,
    /// Build and deploy the tagged image, push disabled
    BuildDeploy,
    /// Deploy an existing image as-is
    DeployOnly { image: String },
    /// Hand the whole lifecycle to the remote pipeline
    RemoteRun,
    Error(DecisionError),
}

impl DeploymentDecision {
    pub fn builds(&self) -> bool {
        matches!(
            self,
            Self::BuildOnly { .. } | Self::BuildPushDeploy | Self::BuildDeploy
        )
    }

    pub fn pushes(&self) -> bool {
        matches!(self, Self::BuildOnly { push: true } | Self::BuildPushDeploy)
    }

    pub fn deploys(&self) -> bool {
        matches!(
            self,
            Self::BuildPushDeploy | Self::BuildDeploy | Self::DeployOnly { .. }
        )
    }

    /// Turn a refusal into its error
    pub fn into_result(self) -> Result<Self> {
        match self {
            Self::Error(e) => Err(e.into()),
            other => Ok(other),
        }
    }
}

impl fmt::Display for DeploymentDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuildOnly { push: true } => write!(f, "build, push"),
            Self::BuildOnly { push: false } => write!(f, "build"),
            Self::BuildPushDeploy => write!(f, "build, push, deploy"),
            Self::BuildDeploy => write!(f, "build, deploy"),
            Self::DeployOnly { image } => write!(f, "deploy {image}"),
            Self::RemoteRun => write!(f, "remote pipeline run"),
            Self::Error(e) => write!(f, "refused: {}", DeployError::from(e.clone())),
        }
    }
}

/// Everything the planner looks at
#[derive(Debug, Clone)]
pub struct PlanInput {
    pub operation: Operation,
    pub build: Resolved<BuildMode>,
    pub push: Resolved<bool>,
    pub remote: bool,
    pub target: ImageRef,
    pub state: ArtifactState,
    /// Image to deploy when the existing build is reused
    pub cached_image: Option<String>,
}

/// Decides build/push/deploy sequencing
#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentPlanner;

impl DeploymentPlanner {
    pub fn new() -> Self {
        Self
    }

    pub fn decide(&self, input: &PlanInput) -> DeploymentDecision {
        let decision = self.decide_inner(input);
        debug!(
            operation = ?input.operation,
            state = %input.state,
            build = %input.build.value,
            push = input.push.value,
            remote = input.remote,
            decision = %decision,
            "planned"
        );
        decision
    }

    fn decide_inner(&self, input: &PlanInput) -> DeploymentDecision {
        if input.state == ArtifactState::Digested {
            if input.build.is_explicit() && input.build.value == BuildMode::True {
                return DeploymentDecision::Error(DecisionError::DigestConflict {
                    flag: "--build",
                    value: input.build.value.to_string(),
                });
            }
            if input.push.is_explicit() && input.push.value {
                return DeploymentDecision::Error(DecisionError::DigestConflict {
                    flag: "--push",
                    value: "true".to_string(),
                });
            }
            if input.operation == Operation::Build {
                return DeploymentDecision::Error(DecisionError::DigestConflict {
                    flag: "--image",
                    value: input.target.to_string(),
                });
            }
            return DeploymentDecision::DeployOnly {
                image: input.target.to_string(),
            };
        }

        if input.operation == Operation::Build {
            return DeploymentDecision::BuildOnly {
                push: input.push.value,
            };
        }

        if input.remote {
            return DeploymentDecision::RemoteRun;
        }

        match (input.build.value, input.state.needs_build()) {
            (BuildMode::False, true) => DeploymentDecision::Error(DecisionError::NotBuilt {
                state: input.state,
            }),
            (_, true) if input.push.value => DeploymentDecision::BuildPushDeploy,
            (_, true) => DeploymentDecision::BuildDeploy,
            (_, false) => DeploymentDecision::DeployOnly {
                image: input
                    .cached_image
                    .clone()
                    .unwrap_or_else(|| input.target.to_string()),
            },
        }
    }
}

/// The image to redeploy when the last build is reused.
///
/// The digest-pinned reference of the last deploy is kept when it points at
/// the same build.
pub fn cached_image(f: &FunctionDescriptor) -> Option<String> {
    let built = f.build.image.as_deref()?;
    match f.deploy.image.as_deref().map(ImageRef::parse) {
        Some(Ok(deployed)) if deployed.name() == built => Some(deployed.to_string()),
        _ => Some(built.to_string()),
    }
}
