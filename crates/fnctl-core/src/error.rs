//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    /// A single setting or argument failed its syntax check
    #[error("{message}")]
    Validation { message: String },

    /// One or more collection entries failed validation
    #[error("{subject} contains errors:{}", format_entries(.errors))]
    InvalidEntries {
        subject: String,
        errors: Vec<String>,
    },

    #[error("registry required to build function, please set with `--registry` or the FUNC_REGISTRY environment variable")]
    RegistryRequired,

    #[error("function name is required to derive an image name")]
    NameRequired,

    #[error("\"{builder}\" is not a known builder. Available builders are \"host\", \"pack\" and \"s2i\"")]
    UnknownBuilder { builder: String },

    #[error("no function found in '{path}'. Initialize one first")]
    NotInitialized { path: String },

    #[error("Failed to parse function descriptor: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_entries(errors: &[String]) -> String {
    errors.iter().map(|e| format!("\n\t{e}")).collect()
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation {
            message: message.into(),
        }
    }

    /// True for errors caused by user input rather than the environment
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::Validation { .. }
                | CoreError::InvalidEntries { .. }
                | CoreError::RegistryRequired
                | CoreError::NameRequired
                | CoreError::UnknownBuilder { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
