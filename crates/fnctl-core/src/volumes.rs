//! Volumes mounted into the function container

use serde::{Deserialize, Serialize};

use crate::collection::{ChangeSet, MergeEntry};
use crate::error::{CoreError, Result};

/// Medium for memory-backed empty dirs
pub const MEDIUM_MEMORY: &str = "Memory";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaim {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_name: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmptyDir {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub medium: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_limit: Option<String>,
}

/// A volume entry, keyed by its mount path
///
/// Exactly one source field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PersistentVolumeClaim>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_dir: Option<EmptyDir>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// The backing source of a volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeSource {
    Secret(String),
    ConfigMap(String),
    PersistentVolumeClaim(PersistentVolumeClaim),
    EmptyDir(EmptyDir),
}

impl Volume {
    pub fn new(path: impl Into<String>, source: VolumeSource) -> Self {
        let mut volume = Volume {
            path: Some(path.into()),
            ..Default::default()
        };
        volume.assign(source);
        volume
    }

    /// The single configured source, if exactly one is set
    pub fn source(&self) -> Option<VolumeSource> {
        let sources = [
            self.secret.clone().map(VolumeSource::Secret),
            self.config_map.clone().map(VolumeSource::ConfigMap),
            self.persistent_volume_claim
                .clone()
                .map(VolumeSource::PersistentVolumeClaim),
            self.empty_dir.clone().map(VolumeSource::EmptyDir),
        ];
        let mut set = sources.into_iter().flatten();
        match (set.next(), set.next()) {
            (Some(source), None) => Some(source),
            _ => None,
        }
    }

    fn source_count(&self) -> usize {
        [
            self.secret.is_some(),
            self.config_map.is_some(),
            self.persistent_volume_claim.is_some(),
            self.empty_dir.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }
}

impl MergeEntry for Volume {
    type Value = VolumeSource;
    const KIND: &'static str = "volume";

    fn entry_name(&self) -> Option<&str> {
        self.path.as_deref()
    }

    fn assign(&mut self, value: VolumeSource) {
        self.secret = None;
        self.config_map = None;
        self.persistent_volume_claim = None;
        self.empty_dir = None;
        match value {
            VolumeSource::Secret(name) => self.secret = Some(name),
            VolumeSource::ConfigMap(name) => self.config_map = Some(name),
            VolumeSource::PersistentVolumeClaim(pvc) => self.persistent_volume_claim = Some(pvc),
            VolumeSource::EmptyDir(dir) => self.empty_dir = Some(dir),
        }
    }

    fn named(name: &str, value: VolumeSource) -> Self {
        Volume::new(name, value)
    }

    fn validate(entries: &[Self]) -> Vec<String> {
        validate_volumes(entries)
    }
}

/// Validate volume entries, returning one message per problem
pub fn validate_volumes(volumes: &[Volume]) -> Vec<String> {
    let mut errors = Vec::new();
    for (i, volume) in volumes.iter().enumerate() {
        match volume.source_count() {
            0 => errors.push(format!(
                "volume entry #{i} is missing a source, set one of secret, configMap, persistentVolumeClaim or emptyDir"
            )),
            1 => {}
            _ => errors.push(format!(
                "volume entry #{i} may only define one of secret, configMap, persistentVolumeClaim or emptyDir"
            )),
        }
        if let Some(pvc) = &volume.persistent_volume_claim {
            if pvc.claim_name.as_deref().is_none_or(str::is_empty) {
                errors.push(format!(
                    "volume entry #{i} (persistentVolumeClaim) is missing claimName"
                ));
            }
        }
        if let Some(dir) = &volume.empty_dir {
            if !dir.medium.is_empty() && dir.medium != MEDIUM_MEMORY {
                errors.push(format!(
                    "volume entry #{i} (emptyDir) has invalid medium {:?}, allowed values are \"\" and {MEDIUM_MEMORY:?}",
                    dir.medium
                ));
            }
        }
        if volume.path.as_deref().is_none_or(str::is_empty) {
            errors.push(format!("volume entry #{i} is missing path field"));
        }
    }
    errors
}

/// A single volume change from the command line
#[derive(Debug, Clone, Default)]
pub struct VolumeArgs {
    pub secret: Option<String>,
    pub config_map: Option<String>,
    pub mount_path: Option<String>,
}

/// Turn `--secret`/`--configmap` plus `--mount` into an addition or update
pub fn volume_change(args: &VolumeArgs) -> Result<ChangeSet<Volume>> {
    let source = match (&args.secret, &args.config_map) {
        (Some(secret), None) => VolumeSource::Secret(secret.clone()),
        (None, Some(config_map)) => VolumeSource::ConfigMap(config_map.clone()),
        (Some(_), Some(_)) => {
            return Err(CoreError::validation(
                "only one of --secret or --configmap may be given for a volume",
            ));
        }
        (None, None) => {
            return Err(CoreError::validation(
                "a volume needs either --secret or --configmap",
            ));
        }
    };
    let Some(path) = args.mount_path.as_deref().filter(|p| !p.is_empty()) else {
        return Err(CoreError::validation("a volume needs a --mount path"));
    };
    let mut changes = ChangeSet::default();
    changes.updates.insert(path.to_string(), source);
    Ok(changes)
}

/// Removal of the volume mounted at `path`
pub fn volume_removal(path: &str) -> ChangeSet<Volume> {
    ChangeSet {
        removals: vec![path.to_string()],
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_exactly_one_source() {
        let none = Volume {
            path: Some("/data".to_string()),
            ..Default::default()
        };
        let both = Volume {
            secret: Some("s".to_string()),
            config_map: Some("c".to_string()),
            path: Some("/data".to_string()),
            ..Default::default()
        };
        let errors = validate_volumes(&[none, both]);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("entry #0"));
        assert!(errors[1].contains("entry #1"));
    }

    #[test]
    fn test_validate_pvc_and_empty_dir() {
        let pvc = Volume::new(
            "/pvc",
            VolumeSource::PersistentVolumeClaim(PersistentVolumeClaim::default()),
        );
        let dir = Volume::new(
            "/tmp",
            VolumeSource::EmptyDir(EmptyDir {
                medium: "Disk".to_string(),
                size_limit: None,
            }),
        );
        let errors = validate_volumes(&[pvc, dir]);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("claimName"));
        assert!(errors[1].contains("medium"));
    }

    #[test]
    fn test_validate_requires_path() {
        let volume = Volume {
            secret: Some("s".to_string()),
            ..Default::default()
        };
        assert_eq!(validate_volumes(&[volume]).len(), 1);
    }

    #[test]
    fn test_update_replaces_source_at_same_path() {
        let existing = vec![Volume::new("/cfg", VolumeSource::Secret("old".to_string()))];
        let changes = volume_change(&VolumeArgs {
            config_map: Some("settings".to_string()),
            mount_path: Some("/cfg".to_string()),
            ..Default::default()
        })
        .unwrap();
        let merged = changes.apply(existing).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged[0].source(),
            Some(VolumeSource::ConfigMap("settings".to_string()))
        );
        assert!(merged[0].secret.is_none());
    }

    #[test]
    fn test_volume_change_requires_mount() {
        let err = volume_change(&VolumeArgs {
            secret: Some("s".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("--mount"));
    }

    #[test]
    fn test_volume_removal_by_path() {
        let existing = vec![
            Volume::new("/a", VolumeSource::Secret("a".to_string())),
            Volume::new("/b", VolumeSource::Secret("b".to_string())),
        ];
        let merged = volume_removal("/a").apply(existing).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].path.as_deref(), Some("/b"));
    }

    #[test]
    fn test_yaml_shape() {
        let volume = Volume::new("/cfg", VolumeSource::ConfigMap("settings".to_string()));
        let yaml = serde_yaml::to_string(&volume).unwrap();
        insta::assert_snapshot!(yaml, @r"
        configMap: settings
        path: /cfg
        ");
    }
}
