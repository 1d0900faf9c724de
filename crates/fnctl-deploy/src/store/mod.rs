//! Persistence of function descriptors
//!
//! A store loads a descriptor at command start and saves it at command end.
//! Loading also captures the current source fingerprint so the planner can
//! tell whether the last build is still fresh.

mod file;
mod mock;

pub use file::FileStore;
pub use mock::{MemoryStore, OperationCounts};

use std::path::Path;

use async_trait::async_trait;
use fnctl_core::{CoreError, FunctionDescriptor};

use crate::error::{DeployError, Result};

/// Storage for function descriptors, keyed by function root
#[async_trait]
pub trait FunctionStore: Send + Sync {
    /// Load the descriptor at `root`
    async fn load(&self, root: &Path) -> Result<FunctionDescriptor>;

    /// Persist `f` at `f.root`
    async fn save(&self, f: &FunctionDescriptor) -> Result<()>;

    /// Load the descriptor, or a fresh one named after the directory
    async fn load_or_new(&self, root: &Path) -> Result<FunctionDescriptor> {
        match self.load(root).await {
            Ok(f) => Ok(f),
            Err(DeployError::Core(CoreError::NotInitialized { .. })) => {
                let name = root
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                Ok(FunctionDescriptor::new(name, root))
            }
            Err(e) => Err(e),
        }
    }
}
