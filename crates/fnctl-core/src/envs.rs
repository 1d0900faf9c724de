//! Environment variables of a function
//!
//! An env value is either a literal or one of the reference forms:
//! - `{{ env:NAME }}`: taken from the local environment at deploy time
//! - `{{ secret:name:key }}` / `{{ configMap:name:key }}`: a single key
//! - `{{ secret:name }}` / `{{ configMap:name }}`: every key, only valid
//!   on entries without a name

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::collection::{ChangeSet, MergeEntry};
use crate::error::{CoreError, Result};

static ENV_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][-._A-Za-z0-9]*$").expect("valid regex"));
static LOCAL_ENV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\{\s*env:(\w+)\s*\}\}$").expect("valid regex"));
static SECRET_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\{\{\s*secret:((?:\w|['-]\w)+):([-._a-zA-Z0-9]+)\s*\}\}$").expect("valid regex")
});
static SECRET_ALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\{\{\s*secret:((?:\w|['-]\w)+)\s*\}\}$").expect("valid regex")
});
static CONFIG_MAP_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\{\{\s*configMap:((?:\w|['-]\w)+):([-._a-zA-Z0-9]+)\s*\}\}$")
        .expect("valid regex")
});
static CONFIG_MAP_ALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\{\{\s*configMap:((?:\w|['-]\w)+)\s*\}\}$").expect("valid regex")
});

/// A single environment entry in `func.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Env {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub value: String,
}

/// Where an env entry takes its value from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvSource {
    Literal(String),
    Local(String),
    SecretKey { secret: String, key: String },
    ConfigMapKey { config_map: String, key: String },
    Secret(String),
    ConfigMap(String),
}

impl Env {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            value: value.into(),
        }
    }

    pub fn anonymous(value: impl Into<String>) -> Self {
        Self {
            name: None,
            value: value.into(),
        }
    }

    /// Classify the value. Unrecognized templates are treated as literals.
    pub fn source(&self) -> EnvSource {
        let v = self.value.as_str();
        if let Some(c) = LOCAL_ENV.captures(v) {
            EnvSource::Local(c[1].to_string())
        } else if let Some(c) = SECRET_KEY.captures(v) {
            EnvSource::SecretKey {
                secret: c[1].to_string(),
                key: c[2].to_string(),
            }
        } else if let Some(c) = CONFIG_MAP_KEY.captures(v) {
            EnvSource::ConfigMapKey {
                config_map: c[1].to_string(),
                key: c[2].to_string(),
            }
        } else if let Some(c) = SECRET_ALL.captures(v) {
            EnvSource::Secret(c[1].to_string())
        } else if let Some(c) = CONFIG_MAP_ALL.captures(v) {
            EnvSource::ConfigMap(c[1].to_string())
        } else {
            EnvSource::Literal(self.value.clone())
        }
    }
}

impl MergeEntry for Env {
    type Value = String;
    const KIND: &'static str = "env";

    fn entry_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn assign(&mut self, value: String) {
        self.value = value;
    }

    fn named(name: &str, value: String) -> Self {
        Env::new(name, value)
    }

    fn validate(entries: &[Self]) -> Vec<String> {
        validate_envs(entries)
    }
}

/// Validate env entries, returning one message per invalid entry
pub fn validate_envs(envs: &[Env]) -> Vec<String> {
    let mut errors = Vec::new();
    for (i, env) in envs.iter().enumerate() {
        match &env.name {
            Some(name) => {
                if !ENV_NAME.is_match(name) {
                    errors.push(format!(
                        "env entry #{i} has invalid name set: {name:?}; the name must start with a letter or underscore and contain only letters, digits, '-', '.' or '_'"
                    ));
                } else if env.value.starts_with("{{")
                    && !(LOCAL_ENV.is_match(&env.value)
                        || SECRET_KEY.is_match(&env.value)
                        || CONFIG_MAP_KEY.is_match(&env.value))
                {
                    errors.push(format!(
                        "env entry #{i} with name {name:?} has invalid value field set, it has {:?}, but allowed is only '{{{{ env:MY_ENV }}}}', '{{{{ secret:mysecret:key }}}}' or '{{{{ configMap:myconfigmap:key }}}}'",
                        env.value
                    ));
                }
            }
            None => {
                if !(SECRET_ALL.is_match(&env.value) || CONFIG_MAP_ALL.is_match(&env.value)) {
                    errors.push(format!(
                        "env entry #{i} has invalid value field set, it has {:?}, but allowed is only '{{{{ secret:mysecret }}}}' or '{{{{ configMap:myconfigmap }}}}'",
                        env.value
                    ));
                }
            }
        }
    }
    errors
}

/// Parse `--env` arguments.
///
/// `NAME=value` updates or adds, `NAME-` removes and a bare
/// `{{ secret:name }}` / `{{ configMap:name }}` adds an anonymous entry.
pub fn parse_env_args(args: &[String]) -> Result<ChangeSet<Env>> {
    let mut changes = ChangeSet::default();
    for arg in args {
        if arg.trim_start().starts_with("{{") {
            changes.additions.push(Env::anonymous(arg.trim()));
        } else if let Some((name, value)) = arg.split_once('=') {
            changes.updates.insert(name.to_string(), value.to_string());
        } else if let Some(name) = arg.strip_suffix('-') {
            changes.removals.push(name.to_string());
        } else {
            return Err(CoreError::validation(format!(
                "invalid --env argument {arg:?}, expected NAME=value, NAME- or '{{{{ secret:name }}}}'"
            )));
        }
    }
    Ok(changes)
}

/// Resolve a `{{ env:NAME }}` value from the local environment.
///
/// Any other value is returned unchanged.
pub fn resolve_local(value: &str, local: &HashMap<String, String>) -> Result<String> {
    match LOCAL_ENV.captures(value) {
        Some(c) => local.get(&c[1]).cloned().ok_or_else(|| {
            CoreError::validation(format!(
                "required local environment variable {:?} is not set",
                &c[1]
            ))
        }),
        None => Ok(value.to_string()),
    }
}

/// Replace `{{ env:NAME }}` values with the matching local variable.
///
/// Fails when a referenced variable is not set.
pub fn interpolate(envs: &[Env], local: &HashMap<String, String>) -> Result<Vec<Env>> {
    envs.iter()
        .map(|env| {
            Ok(Env {
                name: env.name.clone(),
                value: resolve_local(&env.value, local)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::merge;
    use indexmap::IndexMap;

    #[test]
    fn test_source_forms() {
        assert_eq!(
            Env::new("A", "{{ env:HOME }}").source(),
            EnvSource::Local("HOME".to_string())
        );
        assert_eq!(
            Env::new("A", "{{secret:db-creds:password}}").source(),
            EnvSource::SecretKey {
                secret: "db-creds".to_string(),
                key: "password".to_string()
            }
        );
        assert_eq!(
            Env::anonymous("{{ configMap:settings }}").source(),
            EnvSource::ConfigMap("settings".to_string())
        );
        assert_eq!(
            Env::new("A", "plain").source(),
            EnvSource::Literal("plain".to_string())
        );
    }

    #[test]
    fn test_validate_rejects_bad_name() {
        let errors = validate_envs(&[Env::new("1BAD", "x"), Env::new("GOOD", "y")]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("entry #0"));
    }

    #[test]
    fn test_validate_rejects_unknown_template() {
        let errors = validate_envs(&[Env::new("A", "{{ vault:x }}")]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("invalid value field"));
    }

    #[test]
    fn test_validate_anonymous_requires_whole_source() {
        assert!(validate_envs(&[Env::anonymous("{{ secret:creds }}")]).is_empty());
        assert_eq!(validate_envs(&[Env::anonymous("{{ env:HOME }}")]).len(), 1);
        assert_eq!(validate_envs(&[Env::anonymous("literal")]).len(), 1);
    }

    #[test]
    fn test_parse_env_args() {
        let args: Vec<String> = ["A=1", "B-", "{{ secret:creds }}", "C=x=y"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let changes = parse_env_args(&args).unwrap();
        assert_eq!(changes.additions, vec![Env::anonymous("{{ secret:creds }}")]);
        assert_eq!(changes.updates.get("A").map(String::as_str), Some("1"));
        assert_eq!(changes.updates.get("C").map(String::as_str), Some("x=y"));
        assert_eq!(changes.removals, vec!["B".to_string()]);
    }

    #[test]
    fn test_parse_env_args_rejects_bare_name() {
        assert!(parse_env_args(&["JUSTNAME".to_string()]).is_err());
    }

    #[test]
    fn test_merge_envs_aggregates_errors() {
        let mut updates = IndexMap::new();
        updates.insert("9X".to_string(), "a".to_string());
        updates.insert("OK".to_string(), "{{ nope }}".to_string());
        let err = merge(vec![Env::new("1A", "b")], &updates, &[]).unwrap_err();
        match err {
            CoreError::InvalidEntries { errors, .. } => assert_eq!(errors.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_interpolate_local_env() {
        let local = HashMap::from([("USER".to_string(), "alice".to_string())]);
        let envs = interpolate(
            &[
                Env::new("WHO", "{{ env:USER }}"),
                Env::new("KEEP", "{{ secret:s:k }}"),
            ],
            &local,
        )
        .unwrap();
        assert_eq!(envs[0].value, "alice");
        assert_eq!(envs[1].value, "{{ secret:s:k }}");
    }

    #[test]
    fn test_interpolate_missing_local_env() {
        let err = interpolate(&[Env::new("WHO", "{{ env:NOPE }}")], &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("NOPE"));
    }
}
