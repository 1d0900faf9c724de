//! Image references, registry syntax and digest handling
//!
//! A function image is either derived from a registry and the function name
//! (`<registry>/<name>:latest`) or given explicitly. Explicit images may be
//! pinned to a content digest (`<name>@sha256:<64 hex>`), in which case the
//! reference is treated as immutable and must never be rebuilt or pushed.

use std::fmt;

use crate::error::{CoreError, Result};

/// Registry used when only a namespace such as `alice` is given
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// The only digest algorithm accepted in image references
pub const DIGEST_PREFIX: &str = "sha256:";

const DIGEST_HEX_LEN: usize = 64;

/// A parsed image reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    name: String,
    digest: Option<String>,
}

impl ImageRef {
    /// Parse an image reference, validating any digest it carries
    pub fn parse(image: &str) -> Result<Self> {
        let image = image.trim();
        if image.is_empty() {
            return Err(CoreError::validation("image reference must not be empty"));
        }
        if image.chars().any(char::is_whitespace) {
            return Err(CoreError::validation(format!(
                "image reference '{image}' must not contain whitespace"
            )));
        }

        match image.split_once('@') {
            None => Ok(Self {
                name: image.to_string(),
                digest: None,
            }),
            Some((name, digest)) => {
                if name.is_empty() {
                    return Err(CoreError::validation(format!(
                        "image reference '{image}' is missing a name before the digest"
                    )));
                }
                validate_digest(image, digest)?;
                Ok(Self {
                    name: name.to_string(),
                    digest: Some(digest.to_string()),
                })
            }
        }
    }

    /// Name part of the reference, including any tag
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    pub fn is_digested(&self) -> bool {
        self.digest.is_some()
    }

    /// Pin this reference to the given digest, replacing any existing one
    pub fn with_digest(&self, digest: &str) -> Self {
        Self {
            name: self.name.clone(),
            digest: Some(digest.to_string()),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.digest {
            Some(digest) => write!(f, "{}@{}", self.name, digest),
            None => write!(f, "{}", self.name),
        }
    }
}

fn validate_digest(image: &str, digest: &str) -> Result<()> {
    let Some(hex) = digest.strip_prefix(DIGEST_PREFIX) else {
        return Err(CoreError::validation(format!(
            "value '{image}' in --image has invalid prefix syntax for digest (should be '{DIGEST_PREFIX}')"
        )));
    };
    if hex.len() != DIGEST_HEX_LEN {
        return Err(CoreError::validation(format!(
            "sha256 hash in '{hex}' from --image has the wrong length ({}), should be {DIGEST_HEX_LEN}",
            hex.len()
        )));
    }
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CoreError::validation(format!(
            "sha256 hash in '{hex}' from --image contains non-hexadecimal characters"
        )));
    }
    Ok(())
}

/// Check registry syntax: one to three `/`-separated non-empty segments
pub fn validate_registry(registry: &str) -> Result<()> {
    registry_segments(registry).map(|_| ())
}

fn registry_segments(registry: &str) -> Result<Vec<&str>> {
    let trimmed = registry.trim_matches('/');
    if trimmed.is_empty() {
        return Err(CoreError::validation("registry must not be empty"));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(CoreError::validation(format!(
            "registry '{registry}' must not contain whitespace"
        )));
    }
    let segments: Vec<&str> = trimmed.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(CoreError::validation(format!(
            "registry '{registry}' contains an empty path segment"
        )));
    }
    if segments.len() > 3 {
        return Err(CoreError::validation(format!(
            "registry '{registry}' has too many path segments, expected at most 3"
        )));
    }
    Ok(segments)
}

/// Derive the image a function is built as from its registry and name.
///
/// A single-segment registry is treated as a namespace on [`DEFAULT_REGISTRY`].
pub fn derive_image(registry: &str, name: &str) -> Result<String> {
    if name.trim().is_empty() {
        return Err(CoreError::NameRequired);
    }
    let segments = registry_segments(registry)?;
    let prefix = if segments.len() == 1 {
        format!("{DEFAULT_REGISTRY}/{}", segments[0])
    } else {
        segments.join("/")
    };
    Ok(format!("{prefix}/{name}:latest"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "sha256:1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d7e8f9a0b1c2d3e4f5a6b7c8d9e0f1a2b";

    #[test]
    fn test_derive_image_single_segment_uses_default_registry() {
        assert_eq!(
            derive_image("alice", "hello").unwrap(),
            "docker.io/alice/hello:latest"
        );
    }

    #[test]
    fn test_derive_image_multi_segment() {
        assert_eq!(
            derive_image("quay.io/alice", "hello").unwrap(),
            "quay.io/alice/hello:latest"
        );
        assert_eq!(
            derive_image("registry.example.com/team/alice/", "hello").unwrap(),
            "registry.example.com/team/alice/hello:latest"
        );
    }

    #[test]
    fn test_derive_image_rejects_deep_registry() {
        let err = derive_image("a/b/c/d", "hello").unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("too many path segments"));
    }

    #[test]
    fn test_derive_image_requires_name() {
        assert!(matches!(
            derive_image("alice", ""),
            Err(CoreError::NameRequired)
        ));
    }

    #[test]
    fn test_parse_plain_reference() {
        let image = ImageRef::parse("quay.io/alice/hello:v1").unwrap();
        assert_eq!(image.name(), "quay.io/alice/hello:v1");
        assert!(!image.is_digested());
    }

    #[test]
    fn test_parse_digested_reference() {
        let raw = format!("quay.io/alice/hello@{DIGEST}");
        let image = ImageRef::parse(&raw).unwrap();
        assert!(image.is_digested());
        assert_eq!(image.digest(), Some(DIGEST));
        assert_eq!(image.to_string(), raw);
    }

    #[test]
    fn test_parse_rejects_wrong_algorithm() {
        let err = ImageRef::parse("alice/hello@md5:abc").unwrap_err();
        assert!(err.to_string().contains("invalid prefix syntax for digest"));
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        let err = ImageRef::parse(&format!("alice/hello@{DIGEST}f")).unwrap_err();
        assert!(err.to_string().contains("wrong length (65), should be 64"));
    }

    #[test]
    fn test_parse_rejects_non_hex_digest() {
        let bad = format!("alice/hello@sha256:{}", "z".repeat(64));
        let err = ImageRef::parse(&bad).unwrap_err();
        assert!(err.to_string().contains("non-hexadecimal"));
    }

    #[test]
    fn test_with_digest_replaces_existing() {
        let image = ImageRef::parse(&format!("alice/hello@{DIGEST}")).unwrap();
        let pinned = image.with_digest("sha256:ff");
        assert_eq!(pinned.to_string(), "alice/hello@sha256:ff");
    }
}
