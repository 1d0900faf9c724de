//! `func.yaml` on disk

use std::path::Path;

use async_trait::async_trait;
use fnctl_core::{BUILT_FILE, CoreError, FUNCTION_FILE, FunctionDescriptor, fingerprint};
use tracing::debug;

use super::FunctionStore;
use crate::error::Result;

/// Stores each descriptor as `func.yaml` in its function root
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStore;

impl FileStore {
    pub fn new() -> Self {
        Self
    }

    fn read_stamp(root: &Path) -> Option<String> {
        let path = root.join(fnctl_core::RUNTIME_DIR).join(BUILT_FILE);
        std::fs::read_to_string(path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn write_stamp(f: &FunctionDescriptor) -> Result<()> {
        let Some(stamp) = &f.build_stamp else {
            return Ok(());
        };
        if Self::read_stamp(&f.root).as_deref() == Some(stamp.as_str()) {
            return Ok(());
        }
        let dir = f.runtime_dir();
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(BUILT_FILE), stamp)?;
        Ok(())
    }
}

#[async_trait]
impl FunctionStore for FileStore {
    async fn load(&self, root: &Path) -> Result<FunctionDescriptor> {
        let path = root.join(FUNCTION_FILE);
        if !path.exists() {
            return Err(CoreError::NotInitialized {
                path: root.display().to_string(),
            }
            .into());
        }
        let content = std::fs::read_to_string(&path)?;
        let mut f = FunctionDescriptor::from_yaml(&content, root)?;
        f.build_stamp = Self::read_stamp(root);
        f.source_fingerprint = Some(fingerprint(root)?);
        debug!(path = %path.display(), name = %f.name, "loaded function");
        Ok(f)
    }

    async fn save(&self, f: &FunctionDescriptor) -> Result<()> {
        let path = f.root.join(FUNCTION_FILE);
        let content = f.to_yaml()?;

        let unchanged = std::fs::read_to_string(&path)
            .map(|existing| existing == content)
            .unwrap_or(false);
        if unchanged {
            debug!(path = %path.display(), "function unchanged, skipping write");
        } else {
            std::fs::create_dir_all(&f.root)?;
            std::fs::write(&path, content)?;
            debug!(path = %path.display(), "saved function");
        }

        Self::write_stamp(f)
    }
}
