//! Error types for fnctl-deploy

use std::fmt;
use std::time::Duration;

use fnctl_core::CoreError;
use thiserror::Error;

/// Result type for fnctl-deploy operations
pub type Result<T> = std::result::Result<T, DeployError>;

/// A collaborator step in the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Build,
    Push,
    Deploy,
    Remove,
    Describe,
    Pipeline,
    Store,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Build => "build",
            Self::Push => "push",
            Self::Deploy => "deploy",
            Self::Remove => "remove",
            Self::Describe => "describe",
            Self::Pipeline => "pipeline run",
            Self::Store => "store",
        };
        write!(f, "{}", s)
    }
}

/// Errors that can occur while planning or executing a lifecycle command
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeployError {
    /// Invalid configuration or function state
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Deploy requested with building disabled and no usable prior build
    #[error("function not built: {reason}\nHint: build it first, or deploy with --build=auto")]
    NotBuilt { reason: String },

    /// A digested image was combined with building or pushing
    #[error("the {flag} flag '{value}' is not valid when using --image with digest")]
    DigestConflict { flag: String, value: String },

    /// Target of a removal does not exist
    #[error("function '{name}' not found in namespace '{namespace}'")]
    NotFound { name: String, namespace: String },

    /// A collaborator failed; the message is passed through
    #[error("{step} failed: {message}")]
    Collaborator { step: Step, message: String },

    #[error("{step} timed out after {}s", .after.as_secs())]
    Timeout { step: Step, after: Duration },

    #[error("operation canceled")]
    Canceled,

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DeployError {
    fn from(e: serde_json::Error) -> Self {
        DeployError::Serialization(e.to_string())
    }
}

impl DeployError {
    pub fn collaborator(step: Step, message: impl Into<String>) -> Self {
        DeployError::Collaborator {
            step,
            message: message.into(),
        }
    }

    /// True for a missing removal target or a Kubernetes 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, DeployError::NotFound { .. })
            || matches!(self, DeployError::Api(kube::Error::Api(resp)) if resp.code == 404)
    }

    /// Errors raised before any collaborator was called
    pub fn is_validation(&self) -> bool {
        match self {
            DeployError::Core(e) => e.is_validation(),
            DeployError::NotBuilt { .. } | DeployError::DigestConflict { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let not_found = DeployError::NotFound {
            name: "hello".to_string(),
            namespace: "prod".to_string(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_validation());

        let invalid: DeployError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(invalid, DeployError::Serialization(_)));
        assert!(!invalid.is_validation());

        let failed = DeployError::collaborator(Step::Push, "denied");
        assert!(!failed.is_not_found() && !failed.is_validation());
    }
}
