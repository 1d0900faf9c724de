//! The function descriptor persisted as `func.yaml`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::envs::{Env, validate_envs};
use crate::error::{CoreError, Result};
use crate::image::derive_image;
use crate::labels::{Label, validate_labels};
use crate::volumes::{Volume, validate_volumes};

/// Descriptor file name inside the function root
pub const FUNCTION_FILE: &str = "func.yaml";

/// Directory holding local build metadata
pub const RUNTIME_DIR: &str = ".func";

/// File inside [`RUNTIME_DIR`] recording the fingerprint of the last build
pub const BUILT_FILE: &str = "built";

/// A function project and its persisted lifecycle state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDescriptor {
    #[serde(default)]
    pub name: String,

    /// Directory containing `func.yaml`
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub runtime: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,

    /// Explicitly requested image, overriding the registry-derived one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Namespace the user asked to deploy into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "BuildSpec::is_empty")]
    pub build: BuildSpec,

    #[serde(default, skip_serializing_if = "RunSpec::is_empty")]
    pub run: RunSpec,

    #[serde(default, skip_serializing_if = "DeploySpec::is_empty")]
    pub deploy: DeploySpec,

    /// Fingerprint recorded by the last successful build
    #[serde(skip)]
    pub build_stamp: Option<String>,

    /// Fingerprint of the source tree as currently on disk
    #[serde(skip)]
    pub source_fingerprint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder: Option<String>,

    /// Image produced by the last successful build
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Builder image overrides keyed by builder name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub builder_images: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "GitSpec::is_empty")]
    pub git: GitSpec,
}

impl BuildSpec {
    pub fn is_empty(&self) -> bool {
        self.builder.is_none()
            && self.image.is_none()
            && self.builder_images.is_empty()
            && self.git.is_empty()
    }
}

/// Git source used by remote builds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_dir: Option<String>,
}

impl GitSpec {
    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.revision.is_none() && self.context_dir.is_none()
    }

    /// Split a `url#branch` url. An explicit revision wins over the fragment.
    pub fn resolved(&self) -> GitSpec {
        let (url, fragment) = match self.url.as_deref().map(split_git_url) {
            Some((url, fragment)) => (Some(url), fragment),
            None => (None, None),
        };
        GitSpec {
            url,
            revision: self.revision.clone().or(fragment),
            context_dir: self.context_dir.clone(),
        }
    }
}

/// Split `https://host/repo.git#branch` into the url and branch
pub fn split_git_url(url: &str) -> (String, Option<String>) {
    match url.split_once('#') {
        Some((base, branch)) if !branch.is_empty() => (base.to_string(), Some(branch.to_string())),
        Some((base, _)) => (base.to_string(), None),
        None => (url.to_string(), None),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<Env>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
}

impl RunSpec {
    pub fn is_empty(&self) -> bool {
        self.envs.is_empty() && self.volumes.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploySpec {
    /// Namespace of the last successful deployment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Image reference of the last successful deployment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
}

impl DeploySpec {
    pub fn is_empty(&self) -> bool {
        self.namespace.is_none() && self.image.is_none() && self.labels.is_empty()
    }
}

impl FunctionDescriptor {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            created: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// A descriptor is initialized once it carries a name
    pub fn is_initialized(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn from_yaml(content: &str, root: &Path) -> Result<Self> {
        let mut f: FunctionDescriptor = serde_yaml::from_str(content)?;
        f.root = root.to_path_buf();
        Ok(f)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate all collections, reporting every problem at once
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if !self.is_initialized() {
            errors.push("function name is required".to_string());
        }
        errors.extend(validate_envs(&self.run.envs));
        errors.extend(validate_volumes(&self.run.volumes));
        errors.extend(validate_labels(&self.deploy.labels));
        if let Some(url) = &self.build.git.url {
            if url.trim().is_empty() || url.chars().any(char::is_whitespace) {
                errors.push(format!("git url {url:?} is not valid"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidEntries {
                subject: FUNCTION_FILE.to_string(),
                errors,
            })
        }
    }

    /// The image a build or deploy should produce right now.
    ///
    /// An explicit image wins, then the registry-derived name, then the image
    /// of the last build.
    pub fn target_image(&self) -> Result<String> {
        if let Some(image) = self.image.as_deref().filter(|i| !i.is_empty()) {
            return Ok(image.to_string());
        }
        if let Some(registry) = self.registry.as_deref().filter(|r| !r.is_empty()) {
            return derive_image(registry, &self.name);
        }
        if let Some(built) = &self.build.image {
            return Ok(built.clone());
        }
        Err(CoreError::RegistryRequired)
    }

    pub fn runtime_dir(&self) -> PathBuf {
        self.root.join(RUNTIME_DIR)
    }
}

/// Fingerprint a source tree by path and modification time.
///
/// The runtime directory, `.git` and the descriptor itself are excluded.
pub fn fingerprint(root: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !matches!(e.file_name().to_str(), Some(RUNTIME_DIR) | Some(".git"))
        });
    for entry in walker {
        let entry = entry.map_err(|e| CoreError::Io(std::io::Error::other(e.to_string())))?;
        if entry.depth() == 0 || (entry.depth() == 1 && entry.file_name() == FUNCTION_FILE) {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let modified = entry
            .metadata()
            .map_err(|e| CoreError::Io(std::io::Error::other(e.to_string())))?
            .modified()?;
        let since_epoch = modified.duration_since(UNIX_EPOCH).unwrap_or_default();
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update(since_epoch.as_nanos().to_le_bytes());
    }
    Ok(hex::encode(hasher.finalize()))
}
