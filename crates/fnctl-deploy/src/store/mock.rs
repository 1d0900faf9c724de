//! In-memory store for tests

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use fnctl_core::{CoreError, FunctionDescriptor};

use super::FunctionStore;
use crate::error::Result;

/// Keeps descriptors in memory, keyed by root
#[derive(Clone, Default)]
pub struct MemoryStore {
    functions: Arc<RwLock<HashMap<PathBuf, FunctionDescriptor>>>,
    operations: Arc<RwLock<OperationCounts>>,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone)]
pub struct OperationCounts {
    pub loads: usize,
    pub saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a pre-populated descriptor
    pub fn with_function(f: FunctionDescriptor) -> Self {
        let store = Self::new();
        store.functions.write().unwrap().insert(f.root.clone(), f);
        store
    }

    pub fn get(&self, root: &Path) -> Option<FunctionDescriptor> {
        self.functions.read().unwrap().get(root).cloned()
    }

    pub fn operation_counts(&self) -> OperationCounts {
        self.operations.read().unwrap().clone()
    }
}

#[async_trait]
impl FunctionStore for MemoryStore {
    async fn load(&self, root: &Path) -> Result<FunctionDescriptor> {
        self.operations.write().unwrap().loads += 1;
        self.get(root).ok_or_else(|| {
            CoreError::NotInitialized {
                path: root.display().to_string(),
            }
            .into()
        })
    }

    async fn save(&self, f: &FunctionDescriptor) -> Result<()> {
        self.operations.write().unwrap().saves += 1;
        self.functions
            .write()
            .unwrap()
            .insert(f.root.clone(), f.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_counts_operations() {
        let store = MemoryStore::new();
        let f = FunctionDescriptor::new("f", "/srv/f");
        store.save(&f).await.unwrap();
        let loaded = store.load(Path::new("/srv/f")).await.unwrap();
        assert_eq!(loaded, f);

        let counts = store.operation_counts();
        assert_eq!(counts.saves, 1);
        assert_eq!(counts.loads, 1);
    }

    #[tokio::test]
    async fn test_missing_is_not_initialized() {
        let err = MemoryStore::new().load(Path::new("/nope")).await.unwrap_err();
        assert!(matches!(
            err,
            crate::DeployError::Core(CoreError::NotInitialized { .. })
        ));
    }
}
