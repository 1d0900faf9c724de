//! Layered configuration resolution
//!
//! Every setting is resolved from an ordered stack of layers, lowest first:
//!
//! 1. static defaults
//! 2. the global config file (`~/.config/func/config.yaml`)
//! 3. the function descriptor (`func.yaml`)
//! 4. `FUNC_*` environment variables
//! 5. command line flags
//!
//! The topmost layer that sets a value wins, and the winning layer is kept
//! alongside the value so callers can tell an explicit request (environment
//! or flag) from an inherited one. An empty string is an explicit clear.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::function::{FunctionDescriptor, split_git_url};
use crate::image::{ImageRef, validate_registry};

/// Environment variable pointing at an alternate global config file
pub const CONFIG_FILE_ENV: &str = "FUNC_CONFIG_FILE";

const MAX_NAMESPACE_LEN: usize = 63;

static NAMESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid regex"));

/// A configuration source, ordered by precedence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigLayer {
    StaticDefault,
    GlobalConfig,
    FunctionState,
    EnvironmentVariable,
    CliFlag,
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StaticDefault => "default",
            Self::GlobalConfig => "global config",
            Self::FunctionState => "func.yaml",
            Self::EnvironmentVariable => "environment",
            Self::CliFlag => "flag",
        };
        write!(f, "{}", s)
    }
}

/// A configurable setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Setting {
    Registry,
    Image,
    Builder,
    Namespace,
    Build,
    Push,
    Remote,
    GitUrl,
    GitBranch,
    GitDir,
    Verbose,
}

impl Setting {
    pub const ALL: [Setting; 11] = [
        Setting::Registry,
        Setting::Image,
        Setting::Builder,
        Setting::Namespace,
        Setting::Build,
        Setting::Push,
        Setting::Remote,
        Setting::GitUrl,
        Setting::GitBranch,
        Setting::GitDir,
        Setting::Verbose,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Registry => "registry",
            Self::Image => "image",
            Self::Builder => "builder",
            Self::Namespace => "namespace",
            Self::Build => "build",
            Self::Push => "push",
            Self::Remote => "remote",
            Self::GitUrl => "git-url",
            Self::GitBranch => "git-branch",
            Self::GitDir => "git-dir",
            Self::Verbose => "verbose",
        }
    }

    pub fn env_var(&self) -> &'static str {
        match self {
            Self::Registry => "FUNC_REGISTRY",
            Self::Image => "FUNC_IMAGE",
            Self::Builder => "FUNC_BUILDER",
            Self::Namespace => "FUNC_NAMESPACE",
            Self::Build => "FUNC_BUILD",
            Self::Push => "FUNC_PUSH",
            Self::Remote => "FUNC_REMOTE",
            Self::GitUrl => "FUNC_GIT_URL",
            Self::GitBranch => "FUNC_GIT_BRANCH",
            Self::GitDir => "FUNC_GIT_DIR",
            Self::Verbose => "FUNC_VERBOSE",
        }
    }

    pub fn flag(&self) -> String {
        format!("--{}", self.key())
    }
}

/// Values contributed by a single layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerValues(BTreeMap<Setting, String>);

impl LayerValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, setting: Setting, value: impl Into<String>) {
        self.0.insert(setting, value.into());
    }

    /// Builder form of [`LayerValues::set`]
    pub fn with(mut self, setting: Setting, value: impl Into<String>) -> Self {
        self.set(setting, value);
        self
    }

    /// Set only when a value is present
    pub fn with_opt(mut self, setting: Setting, value: Option<impl Into<String>>) -> Self {
        if let Some(value) = value {
            self.set(setting, value);
        }
        self
    }

    pub fn get(&self, setting: Setting) -> Option<&str> {
        self.0.get(&setting).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read every `FUNC_*` variable present in `env`
    pub fn from_env(env: &HashMap<String, String>) -> Self {
        let mut values = Self::new();
        for setting in Setting::ALL {
            if let Some(value) = env.get(setting.env_var()) {
                values.set(setting, value.clone());
            }
        }
        values
    }

    /// Settings persisted in a function descriptor
    pub fn from_function(f: &FunctionDescriptor) -> Self {
        Self::new()
            .with_opt(Setting::Registry, f.registry.clone())
            .with_opt(Setting::Image, f.image.clone())
            .with_opt(Setting::Builder, f.build.builder.clone())
            .with_opt(Setting::Namespace, f.namespace.clone())
            .with_opt(Setting::GitUrl, f.build.git.url.clone())
            .with_opt(Setting::GitBranch, f.build.git.revision.clone())
            .with_opt(Setting::GitDir, f.build.git.context_dir.clone())
    }

    fn static_defaults() -> Self {
        Self::new()
            .with(Setting::Builder, BuilderKind::default().to_string())
            .with(Setting::Build, BuildMode::Auto.to_string())
            .with(Setting::Push, "true")
            .with(Setting::Remote, "false")
            .with(Setting::Verbose, "false")
    }
}

/// User-wide defaults stored in `config.yaml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_insecure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
}

impl GlobalConfig {
    /// Location of the global config file for the given environment.
    ///
    /// `FUNC_CONFIG_FILE` wins, then `$XDG_CONFIG_HOME/func/config.yaml`,
    /// then `~/.config/func/config.yaml`.
    pub fn path(env: &HashMap<String, String>) -> Option<PathBuf> {
        if let Some(file) = env.get(CONFIG_FILE_ENV).filter(|f| !f.is_empty()) {
            return Some(PathBuf::from(file));
        }
        let base = match env.get("XDG_CONFIG_HOME").filter(|d| !d.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()?.join(".config"),
        };
        Some(base.join("func").join("config.yaml"))
    }

    /// Load the global config, returning defaults when no file exists
    pub fn load(env: &HashMap<String, String>) -> Result<Self> {
        match Self::path(env) {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(&content)?;
        debug!(path = %path.display(), "loaded global config");
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    pub fn to_layer(&self) -> LayerValues {
        LayerValues::new()
            .with_opt(Setting::Registry, self.registry.clone())
            .with_opt(Setting::Builder, self.builder.clone())
            .with_opt(Setting::Namespace, self.namespace.clone())
            .with_opt(Setting::Verbose, self.verbose.map(|v| v.to_string()))
    }
}

/// Builders able to turn function source into an image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BuilderKind {
    Host,
    Pack,
    #[default]
    S2i,
}

impl BuilderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Pack => "pack",
            Self::S2i => "s2i",
        }
    }
}

impl fmt::Display for BuilderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuilderKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "host" => Ok(Self::Host),
            "pack" => Ok(Self::Pack),
            "s2i" => Ok(Self::S2i),
            other => Err(CoreError::UnknownBuilder {
                builder: other.to_string(),
            }),
        }
    }
}

/// Whether a deploy should build first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    True,
    False,
    /// Build only when the artifact is missing or stale
    Auto,
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::True => "true",
            Self::False => "false",
            Self::Auto => "auto",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for BuildMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        match parse_bool(s) {
            Some(true) => Ok(Self::True),
            Some(false) => Ok(Self::False),
            None => Err(CoreError::validation(format!(
                "invalid value for --build: {s:?}, expected true, false or auto"
            ))),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Check a namespace is a valid DNS-1123 label
pub fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.len() > MAX_NAMESPACE_LEN || !NAMESPACE.is_match(namespace) {
        return Err(CoreError::validation(format!(
            "namespace {namespace:?} is not valid, it must be a lowercase RFC 1123 label of at most {MAX_NAMESPACE_LEN} characters"
        )));
    }
    Ok(())
}

/// A resolved value and the layer it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub layer: ConfigLayer,
}

impl<T> Resolved<T> {
    pub fn new(value: T, layer: ConfigLayer) -> Self {
        Self { value, layer }
    }

    /// Set by an environment variable or flag in this invocation
    pub fn is_explicit(&self) -> bool {
        self.layer >= ConfigLayer::EnvironmentVariable
    }
}

/// Resolves settings across configuration layers for one invocation
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    layers: BTreeMap<ConfigLayer, LayerValues>,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver {
    /// A resolver holding only the static defaults
    pub fn new() -> Self {
        let mut layers = BTreeMap::new();
        layers.insert(ConfigLayer::StaticDefault, LayerValues::static_defaults());
        Self { layers }
    }

    /// Static defaults for `build`, where pushing is opt-in
    pub fn for_build() -> Self {
        Self::new().layer(
            ConfigLayer::StaticDefault,
            LayerValues::static_defaults().with(Setting::Push, "false"),
        )
    }

    /// Add or replace a layer
    pub fn layer(mut self, layer: ConfigLayer, values: LayerValues) -> Self {
        self.layers.insert(layer, values);
        self
    }

    /// Raw value from the topmost layer that sets `setting`.
    ///
    /// Empty strings resolve to `None` but keep their layer.
    pub fn resolve(&self, setting: Setting) -> Resolved<Option<String>> {
        for (layer, values) in self.layers.iter().rev() {
            if let Some(value) = values.get(setting) {
                let value = (!value.is_empty()).then(|| value.to_string());
                return Resolved::new(value, *layer);
            }
        }
        Resolved::new(None, ConfigLayer::StaticDefault)
    }

    /// The value and whether it was explicitly set in this invocation
    pub fn resolve_value(&self, setting: Setting) -> (Option<String>, bool) {
        let resolved = self.resolve(setting);
        let explicit = resolved.is_explicit();
        (resolved.value, explicit)
    }

    fn resolve_parsed<T: FromStr<Err = CoreError>>(
        &self,
        setting: Setting,
        default: T,
    ) -> Result<Resolved<T>> {
        let raw = self.resolve(setting);
        let value = match raw.value.as_deref() {
            Some(v) => v.parse()?,
            None => default,
        };
        Ok(Resolved::new(value, raw.layer))
    }

    fn resolve_bool(&self, setting: Setting, default: bool) -> Result<Resolved<bool>> {
        let raw = self.resolve(setting);
        let value = match raw.value.as_deref() {
            Some(v) => parse_bool(v).ok_or_else(|| {
                CoreError::validation(format!(
                    "invalid value for {}: {v:?}, expected true or false",
                    setting.flag()
                ))
            })?,
            None => default,
        };
        Ok(Resolved::new(value, raw.layer))
    }

    /// Validate and resolve every setting
    pub fn effective(&self) -> Result<EffectiveConfig> {
        let registry = self.resolve(Setting::Registry);
        if let Some(r) = registry.value.as_deref() {
            validate_registry(r)?;
        }
        let image = self.resolve(Setting::Image);
        if let Some(i) = image.value.as_deref() {
            ImageRef::parse(i)?;
        }
        let namespace = self.resolve(Setting::Namespace);
        if let Some(ns) = namespace.value.as_deref() {
            validate_namespace(ns)?;
        }

        let config = EffectiveConfig {
            registry,
            image,
            builder: self.resolve_parsed(Setting::Builder, BuilderKind::default())?,
            namespace,
            build: self.resolve_parsed(Setting::Build, BuildMode::Auto)?,
            push: self.resolve_bool(Setting::Push, true)?,
            remote: self.resolve_bool(Setting::Remote, false)?,
            git_url: self.resolve(Setting::GitUrl),
            git_branch: self.resolve(Setting::GitBranch),
            git_dir: self.resolve(Setting::GitDir),
            verbose: self.resolve_bool(Setting::Verbose, false)?,
        };
        debug!(
            registry = ?config.registry.value,
            image = ?config.image.value,
            builder = %config.builder.value,
            build = %config.build.value,
            push = config.push.value,
            remote = config.remote.value,
            "resolved configuration"
        );
        Ok(config)
    }
}

/// Fully resolved and validated settings for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub registry: Resolved<Option<String>>,
    pub image: Resolved<Option<String>>,
    pub builder: Resolved<BuilderKind>,
    pub namespace: Resolved<Option<String>>,
    pub build: Resolved<BuildMode>,
    pub push: Resolved<bool>,
    pub remote: Resolved<bool>,
    pub git_url: Resolved<Option<String>>,
    pub git_branch: Resolved<Option<String>>,
    pub git_dir: Resolved<Option<String>>,
    pub verbose: Resolved<bool>,
}

impl EffectiveConfig {
    /// Record the settings that belong in the function descriptor.
    ///
    /// An explicit registry without an explicit image drops any persisted
    /// image override so the image is derived from the new registry.
    /// The namespace is left alone; it is settled by a successful deploy.
    pub fn apply_to(&self, f: &mut FunctionDescriptor) {
        f.registry = self.registry.value.clone();
        if self.image.is_explicit() {
            f.image = self.image.value.clone();
        } else if self.registry.is_explicit() {
            f.image = None;
        }
        f.build.builder = Some(self.builder.value.to_string());

        if self.git_url.is_explicit() {
            match self.git_url.value.as_deref().map(split_git_url) {
                Some((url, fragment)) => {
                    f.build.git.url = Some(url);
                    if fragment.is_some() && !self.git_branch.is_explicit() {
                        f.build.git.revision = fragment;
                    }
                }
                None => f.build.git.url = None,
            }
        }
        if self.git_branch.is_explicit() {
            f.build.git.revision = self.git_branch.value.clone();
        }
        if self.git_dir.is_explicit() {
            f.build.git.context_dir = self.git_dir.value.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DIGEST: &str = "sha256:1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d7e8f9a0b1c2d3e4f5a6b7c8d9e0f1a2b";

    fn flags(values: &[(Setting, &str)]) -> LayerValues {
        values
            .iter()
            .fold(LayerValues::new(), |acc, (s, v)| acc.with(*s, *v))
    }

    #[test]
    fn test_static_defaults() {
        let config = ConfigResolver::new().effective().unwrap();
        assert_eq!(config.builder.value, BuilderKind::S2i);
        assert_eq!(config.build.value, BuildMode::Auto);
        assert!(config.push.value);
        assert!(!config.remote.value);
        assert_eq!(config.registry.value, None);
        assert_eq!(config.push.layer, ConfigLayer::StaticDefault);
    }

    #[test]
    fn test_build_defaults_do_not_push() {
        let config = ConfigResolver::for_build().effective().unwrap();
        assert!(!config.push.value);
        assert_eq!(config.push.layer, ConfigLayer::StaticDefault);
        assert_eq!(config.builder.value, BuilderKind::S2i);

        let config = ConfigResolver::for_build()
            .layer(ConfigLayer::CliFlag, flags(&[(Setting::Push, "true")]))
            .effective()
            .unwrap();
        assert!(config.push.value);
        assert!(config.push.is_explicit());
    }

    #[test]
    fn test_resolution_is_repeatable() {
        let resolver = || {
            ConfigResolver::new()
                .layer(
                    ConfigLayer::GlobalConfig,
                    flags(&[(Setting::Registry, "global"), (Setting::Namespace, "team")]),
                )
                .layer(
                    ConfigLayer::EnvironmentVariable,
                    flags(&[(Setting::Builder, "pack"), (Setting::Push, "false")]),
                )
                .layer(
                    ConfigLayer::CliFlag,
                    flags(&[(Setting::Registry, "quay.io/alice"), (Setting::GitUrl, "")]),
                )
        };

        let first = resolver().effective().unwrap();
        let second = resolver().effective().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.registry.layer, ConfigLayer::CliFlag);
        assert_eq!(first.namespace.layer, ConfigLayer::GlobalConfig);
        assert_eq!(first.builder.layer, ConfigLayer::EnvironmentVariable);

        let same = resolver();
        assert_eq!(same.effective().unwrap(), same.effective().unwrap());
    }

    #[test]
    fn test_higher_layer_wins() {
        let resolver = ConfigResolver::new()
            .layer(
                ConfigLayer::GlobalConfig,
                flags(&[(Setting::Registry, "global")]),
            )
            .layer(
                ConfigLayer::FunctionState,
                flags(&[(Setting::Registry, "persisted")]),
            )
            .layer(
                ConfigLayer::EnvironmentVariable,
                flags(&[(Setting::Registry, "fromenv")]),
            );
        let resolved = resolver.resolve(Setting::Registry);
        assert_eq!(resolved.value.as_deref(), Some("fromenv"));
        assert_eq!(resolved.layer, ConfigLayer::EnvironmentVariable);
        assert!(resolved.is_explicit());

        let resolver = resolver.layer(ConfigLayer::CliFlag, flags(&[(Setting::Registry, "flag")]));
        assert_eq!(
            resolver.resolve_value(Setting::Registry),
            (Some("flag".to_string()), true)
        );
    }

    #[test]
    fn test_empty_value_is_explicit_clear() {
        let resolver = ConfigResolver::new()
            .layer(
                ConfigLayer::FunctionState,
                flags(&[(Setting::Registry, "alice")]),
            )
            .layer(ConfigLayer::CliFlag, flags(&[(Setting::Registry, "")]));
        assert_eq!(resolver.resolve_value(Setting::Registry), (None, true));
    }

    #[test]
    fn test_persisted_value_is_not_explicit() {
        let resolver = ConfigResolver::new().layer(
            ConfigLayer::FunctionState,
            flags(&[(Setting::Registry, "alice")]),
        );
        assert_eq!(
            resolver.resolve_value(Setting::Registry),
            (Some("alice".to_string()), false)
        );
    }

    #[test]
    fn test_env_layer_from_map() {
        let env = HashMap::from([
            ("FUNC_REGISTRY".to_string(), "quay.io/alice".to_string()),
            ("FUNC_PUSH".to_string(), "false".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ]);
        let values = LayerValues::from_env(&env);
        assert_eq!(values.get(Setting::Registry), Some("quay.io/alice"));
        assert_eq!(values.get(Setting::Push), Some("false"));
        assert_eq!(values.get(Setting::Build), None);
    }

    #[test]
    fn test_effective_rejects_bad_values_first() {
        let bad = [
            (Setting::Registry, "a/b/c/d"),
            (Setting::Image, "alice/f@sha256:abc"),
            (Setting::Builder, "kaniko"),
            (Setting::Build, "sometimes"),
            (Setting::Push, "maybe"),
            (Setting::Namespace, "Not_Valid"),
        ];
        for (setting, value) in bad {
            let resolver =
                ConfigResolver::new().layer(ConfigLayer::CliFlag, flags(&[(setting, value)]));
            let err = resolver.effective().unwrap_err();
            assert!(err.is_validation(), "{setting:?}={value} gave {err}");
        }
    }

    #[test]
    fn test_unknown_builder_message() {
        let resolver = ConfigResolver::new()
            .layer(ConfigLayer::CliFlag, flags(&[(Setting::Builder, "kaniko")]));
        let err = resolver.effective().unwrap_err();
        assert_eq!(
            err.to_string(),
            r#""kaniko" is not a known builder. Available builders are "host", "pack" and "s2i""#
        );
    }

    #[test]
    fn test_apply_explicit_registry_clears_image_override() {
        let mut f = FunctionDescriptor::new("f", "/tmp/f");
        f.image = Some("docker.io/bob/f:latest".to_string());
        f.registry = Some("bob".to_string());
        let config = ConfigResolver::new()
            .layer(ConfigLayer::FunctionState, LayerValues::from_function(&f))
            .layer(ConfigLayer::CliFlag, flags(&[(Setting::Registry, "alice")]))
            .effective()
            .unwrap();
        config.apply_to(&mut f);
        assert_eq!(f.registry.as_deref(), Some("alice"));
        assert_eq!(f.image, None);
        assert_eq!(f.target_image().unwrap(), "docker.io/alice/f:latest");
    }

    #[test]
    fn test_apply_explicit_image_keeps_registry() {
        let mut f = FunctionDescriptor::new("f", "/tmp/f");
        f.registry = Some("alice".to_string());
        let config = ConfigResolver::new()
            .layer(ConfigLayer::FunctionState, LayerValues::from_function(&f))
            .layer(
                ConfigLayer::CliFlag,
                flags(&[(Setting::Image, "registry.example.com/charlie/f:latest")]),
            )
            .effective()
            .unwrap();
        config.apply_to(&mut f);
        assert_eq!(f.registry.as_deref(), Some("alice"));
        assert_eq!(
            f.target_image().unwrap(),
            "registry.example.com/charlie/f:latest"
        );
    }

    #[test]
    fn test_apply_registry_and_image_pass_through() {
        let mut f = FunctionDescriptor::new("f", "/tmp/f");
        let image = format!("quay.io/alice/f@{DIGEST}");
        let config = ConfigResolver::new()
            .layer(
                ConfigLayer::CliFlag,
                flags(&[(Setting::Registry, "bob"), (Setting::Image, image.as_str())]),
            )
            .effective()
            .unwrap();
        config.apply_to(&mut f);
        assert_eq!(f.registry.as_deref(), Some("bob"));
        assert_eq!(f.image.as_deref(), Some(image.as_str()));
    }

    #[test]
    fn test_apply_git_url_with_branch_fragment() {
        let mut f = FunctionDescriptor::new("f", "/tmp/f");
        let config = ConfigResolver::new()
            .layer(
                ConfigLayer::CliFlag,
                flags(&[(Setting::GitUrl, "https://example.com/repo.git#dev")]),
            )
            .effective()
            .unwrap();
        config.apply_to(&mut f);
        assert_eq!(f.build.git.url.as_deref(), Some("https://example.com/repo.git"));
        assert_eq!(f.build.git.revision.as_deref(), Some("dev"));

        let config = ConfigResolver::new()
            .layer(
                ConfigLayer::CliFlag,
                flags(&[
                    (Setting::GitUrl, "https://example.com/repo.git#dev"),
                    (Setting::GitBranch, "main"),
                ]),
            )
            .effective()
            .unwrap();
        config.apply_to(&mut f);
        assert_eq!(f.build.git.revision.as_deref(), Some("main"));
    }

    #[test]
    fn test_global_config_path_precedence() {
        let env = HashMap::from([
            (CONFIG_FILE_ENV.to_string(), "/etc/func.yaml".to_string()),
            ("XDG_CONFIG_HOME".to_string(), "/xdg".to_string()),
        ]);
        assert_eq!(
            GlobalConfig::path(&env),
            Some(PathBuf::from("/etc/func.yaml"))
        );

        let env = HashMap::from([("XDG_CONFIG_HOME".to_string(), "/xdg".to_string())]);
        assert_eq!(
            GlobalConfig::path(&env),
            Some(PathBuf::from("/xdg/func/config.yaml"))
        );
    }

    #[test]
    fn test_global_config_roundtrip_and_layer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let config = GlobalConfig {
            registry: Some("quay.io/alice".to_string()),
            builder: Some("pack".to_string()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let env = HashMap::from([(
            CONFIG_FILE_ENV.to_string(),
            path.to_string_lossy().to_string(),
        )]);
        let loaded = GlobalConfig::load(&env).unwrap();
        assert_eq!(loaded, config);

        let effective = ConfigResolver::new()
            .layer(ConfigLayer::GlobalConfig, loaded.to_layer())
            .effective()
            .unwrap();
        assert_eq!(effective.builder.value, BuilderKind::Pack);
        assert_eq!(effective.registry.layer, ConfigLayer::GlobalConfig);
    }

    #[test]
    fn test_global_config_missing_file_is_default() {
        let env = HashMap::from([(
            CONFIG_FILE_ENV.to_string(),
            "/nonexistent/fnctl/config.yaml".to_string(),
        )]);
        assert_eq!(GlobalConfig::load(&env).unwrap(), GlobalConfig::default());
    }
}
