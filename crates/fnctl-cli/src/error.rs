//! CLI error types with exit code handling
//!
//! Library errors are folded into a single diagnostic type that carries
//! an exit code and, where one helps, a hint.

use fnctl_core::CoreError;
use fnctl_deploy::DeployError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Bad flag, setting or function state; nothing was changed
    #[error("{message}")]
    #[diagnostic(code(fnctl::cli::validation))]
    Validation {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("{message}")]
    #[diagnostic(
        code(fnctl::cli::not_built),
        help("run `fnctl build`, or deploy with --build=auto")
    )]
    NotBuilt { message: String },

    #[error("{message}")]
    #[diagnostic(code(fnctl::cli::not_found))]
    NotFound { message: String },

    /// A builder, pusher, deployer or the cluster failed
    #[error("{message}")]
    #[diagnostic(code(fnctl::cli::deploy))]
    Deploy {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("invalid usage: {message}")]
    #[diagnostic(code(fnctl::cli::usage))]
    Usage { message: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(fnctl::cli::io))]
    Io { message: String },

    #[error("operation canceled")]
    #[diagnostic(code(fnctl::cli::canceled))]
    Canceled,
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation { .. } => exit_codes::VALIDATION_ERROR,
            CliError::NotBuilt { .. } => exit_codes::NOT_BUILT,
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::Deploy { .. } => exit_codes::ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Canceled => exit_codes::CANCELED,
        }
    }

    /// Create a validation error with help text
    pub fn validation_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::RegistryRequired => CliError::validation_with_help(
                err.to_string(),
                "pass --registry (e.g. --registry quay.io/alice) or set FUNC_REGISTRY",
            ),
            CoreError::NotInitialized { .. } => CliError::validation_with_help(
                err.to_string(),
                "create a function first with `fnctl init`",
            ),
            CoreError::Io(e) => CliError::Io {
                message: e.to_string(),
            },
            e if e.is_validation() => CliError::Validation {
                message: e.to_string(),
                help: None,
            },
            e => CliError::Deploy {
                message: e.to_string(),
                help: None,
            },
        }
    }
}

impl From<DeployError> for CliError {
    fn from(err: DeployError) -> Self {
        match err {
            DeployError::Core(e) => e.into(),
            DeployError::NotBuilt { .. } => CliError::NotBuilt {
                message: err.to_string(),
            },
            DeployError::NotFound { .. } => CliError::NotFound {
                message: err.to_string(),
            },
            DeployError::Canceled => CliError::Canceled,
            DeployError::Io(e) => CliError::Io {
                message: e.to_string(),
            },
            e if e.is_validation() => CliError::Validation {
                message: e.to_string(),
                help: None,
            },
            DeployError::Api(e) => CliError::Deploy {
                message: format!("Kubernetes API error: {e}"),
                help: Some("check that the cluster is reachable and Knative Serving is installed".to_string()),
            },
            e => CliError::Deploy {
                message: e.to_string(),
                help: None,
            },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let not_built: CliError = DeployError::NotBuilt {
            reason: "no build found".to_string(),
        }
        .into();
        assert_eq!(not_built.exit_code(), exit_codes::NOT_BUILT);

        let conflict: CliError = DeployError::DigestConflict {
            flag: "--build".to_string(),
            value: "true".to_string(),
        }
        .into();
        assert_eq!(conflict.exit_code(), exit_codes::VALIDATION_ERROR);

        let failed: CliError = DeployError::collaborator(fnctl_deploy::Step::Push, "denied").into();
        assert_eq!(failed.exit_code(), exit_codes::ERROR);
        assert_eq!(failed.to_string(), "push failed: denied");

        let missing: CliError = DeployError::Core(CoreError::RegistryRequired).into();
        assert!(matches!(missing, CliError::Validation { help: Some(_), .. }));
    }
}
