//! Labels attached to the deployed service

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::collection::{ChangeSet, MergeEntry};
use crate::envs::resolve_local;
use crate::error::{CoreError, Result};

/// Label carrying the function name
pub const NAME_LABEL: &str = "function.knative.dev/name";
/// Label carrying the function runtime
pub const RUNTIME_LABEL: &str = "function.knative.dev/runtime";
/// Marker label present on every function service
pub const FUNCTION_LABEL: &str = "function.knative.dev";

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

static NAME_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]$").expect("valid regex")
});
static DNS_SUBDOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("valid regex")
});
static LOCAL_ENV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\{\s*env:(\w+)\s*\}\}$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub value: String,
}

impl Label {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: value.into(),
        }
    }
}

impl MergeEntry for Label {
    type Value = String;
    const KIND: &'static str = "label";

    fn entry_name(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn assign(&mut self, value: String) {
        self.value = value;
    }

    fn named(name: &str, value: String) -> Self {
        Label::new(name, value)
    }

    fn validate(entries: &[Self]) -> Vec<String> {
        validate_labels(entries)
    }
}

fn qualified_name_errors(key: &str) -> Vec<String> {
    let mut errors = Vec::new();
    let (prefix, name) = match key.rsplit_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };
    if let Some(prefix) = prefix {
        if prefix.is_empty() {
            errors.push("prefix part must be non-empty".to_string());
        } else if prefix.len() > MAX_PREFIX_LEN || !DNS_SUBDOMAIN.is_match(prefix) {
            errors.push(format!(
                "prefix part {prefix:?} must be a lowercase DNS subdomain of at most {MAX_PREFIX_LEN} characters"
            ));
        }
    }
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        errors.push(format!(
            "name part must be between 1 and {MAX_NAME_LEN} characters"
        ));
    } else if !NAME_PART.is_match(name) {
        errors.push(
            "name part must consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character".to_string(),
        );
    }
    errors
}

fn label_value_errors(value: &str) -> Vec<String> {
    if value.starts_with("{{") {
        if LOCAL_ENV.is_match(value) {
            return Vec::new();
        }
        return vec!["only '{{ env:MY_ENV }}' is allowed as a template value".to_string()];
    }
    let mut errors = Vec::new();
    if value.len() > MAX_NAME_LEN {
        errors.push(format!("must be no more than {MAX_NAME_LEN} characters"));
    }
    if !value.is_empty() && !NAME_PART.is_match(value) {
        errors.push(
            "a valid label must be an empty string or consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character".to_string(),
        );
    }
    errors
}

/// Validate label entries, returning one message per problem
pub fn validate_labels(labels: &[Label]) -> Vec<String> {
    let mut errors = Vec::new();
    for (i, label) in labels.iter().enumerate() {
        let Some(key) = &label.key else {
            errors.push(format!(
                "label entry #{i} is missing key field, only value {:?} is set",
                label.value
            ));
            continue;
        };
        for problem in qualified_name_errors(key) {
            errors.push(format!("label entry #{i} has invalid key {key:?}: {problem}"));
        }
        for problem in label_value_errors(&label.value) {
            errors.push(format!(
                "label entry #{i} has invalid value {:?}: {problem}",
                label.value
            ));
        }
    }
    errors
}

/// Parse `--label` arguments of the form `KEY=value` or `KEY-`
pub fn parse_label_args(args: &[String]) -> Result<ChangeSet<Label>> {
    let mut changes = ChangeSet::default();
    for arg in args {
        if let Some((key, value)) = arg.split_once('=') {
            changes.updates.insert(key.to_string(), value.to_string());
        } else if let Some(key) = arg.strip_suffix('-') {
            changes.removals.push(key.to_string());
        } else {
            return Err(CoreError::validation(format!(
                "invalid --label argument {arg:?}, expected KEY=value or KEY-"
            )));
        }
    }
    Ok(changes)
}

/// Build the label map applied to the deployed service.
///
/// User labels are interpolated against the local environment and the
/// function defaults are added on top.
pub fn labels_map(
    labels: &[Label],
    name: &str,
    runtime: &str,
    local: &HashMap<String, String>,
) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for label in labels {
        let Some(key) = &label.key else { continue };
        let value = resolve_local(&label.value, local)?;
        map.insert(key.clone(), value);
    }
    map.insert(NAME_LABEL.to_string(), name.to_string());
    if !runtime.is_empty() {
        map.insert(RUNTIME_LABEL.to_string(), runtime.to_string());
    }
    map.insert(FUNCTION_LABEL.to_string(), "true".to_string());
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_prefixed_key() {
        let labels = vec![
            Label::new("app.kubernetes.io/part-of", "shop"),
            Label::new("tier", ""),
            Label::new("owner", "{{ env:USER }}"),
        ];
        assert!(validate_labels(&labels).is_empty());
    }

    #[test]
    fn test_validate_rejects_missing_key() {
        let errors = validate_labels(&[Label {
            key: None,
            value: "v".to_string(),
        }]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("missing key"));
    }

    #[test]
    fn test_validate_rejects_bad_key_and_value() {
        let errors = validate_labels(&[Label::new("-bad", "x".repeat(64))]);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.contains("label entry #0")));
    }

    #[test]
    fn test_validate_rejects_uppercase_prefix() {
        let errors = validate_labels(&[Label::new("Example.com/key", "v")]);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_validate_rejects_secret_template() {
        let errors = validate_labels(&[Label::new("k", "{{ secret:s:k }}")]);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_parse_label_args() {
        let changes =
            parse_label_args(&["team=payments".to_string(), "old-".to_string()]).unwrap();
        assert_eq!(
            changes.updates.get("team").map(String::as_str),
            Some("payments")
        );
        assert_eq!(changes.removals, vec!["old".to_string()]);
    }

    #[test]
    fn test_labels_map_adds_defaults_and_interpolates() {
        let local = HashMap::from([("USER".to_string(), "alice".to_string())]);
        let map = labels_map(
            &[Label::new("owner", "{{ env:USER }}")],
            "hello",
            "go",
            &local,
        )
        .unwrap();
        assert_eq!(map.get("owner").map(String::as_str), Some("alice"));
        assert_eq!(map.get(NAME_LABEL).map(String::as_str), Some("hello"));
        assert_eq!(map.get(RUNTIME_LABEL).map(String::as_str), Some("go"));
        assert_eq!(map.get(FUNCTION_LABEL).map(String::as_str), Some("true"));
    }
}
