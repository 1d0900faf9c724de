//! fnctl core - function descriptor and configuration resolution
//!
//! This crate provides the types every fnctl command works with:
//! - `FunctionDescriptor`: the persisted `func.yaml` state
//! - `ConfigResolver`: layered settings with provenance
//! - `ImageRef`: image references, registry derivation and digests
//! - collection merging and validation for envs, labels and volumes

pub mod collection;
pub mod config;
pub mod envs;
pub mod error;
pub mod function;
pub mod image;
pub mod labels;
pub mod volumes;

pub use collection::{ChangeSet, MergeEntry, merge};
pub use config::{
    BuildMode, BuilderKind, ConfigLayer, ConfigResolver, EffectiveConfig, GlobalConfig,
    LayerValues, Resolved, Setting, validate_namespace,
};
pub use envs::{Env, EnvSource};
pub use error::{CoreError, Result};
pub use function::{
    BUILT_FILE, BuildSpec, DeploySpec, FUNCTION_FILE, FunctionDescriptor, GitSpec, RUNTIME_DIR,
    RunSpec, fingerprint,
};
pub use image::{DEFAULT_REGISTRY, ImageRef, derive_image};
pub use labels::Label;
pub use volumes::{Volume, VolumeSource};
