//! Target namespace resolution
//!
//! Precedence, highest first:
//! 1. `--namespace` / `FUNC_NAMESPACE`
//! 2. the namespace requested in `func.yaml`
//! 3. the namespace of the last successful deployment
//! 4. the global config default
//! 5. the active cluster context
//! 6. `default`

use std::fmt;

use fnctl_core::{ConfigLayer, FunctionDescriptor, Resolved};
use tracing::debug;

use crate::collaborators::ClusterContext;

/// Namespace used when nothing else applies
pub const DEFAULT_NAMESPACE: &str = "default";

/// Which source decided the namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceSource {
    Explicit,
    Requested,
    Deployed,
    Configured,
    Context,
    Fallback,
}

impl fmt::Display for NamespaceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Explicit => "flag",
            Self::Requested => "func.yaml",
            Self::Deployed => "previous deployment",
            Self::Configured => "global config",
            Self::Context => "cluster context",
            Self::Fallback => "default",
        };
        write!(f, "{}", s)
    }
}

/// A message for the user produced while resolving or executing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Warning(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceResolution {
    pub namespace: String,
    pub source: NamespaceSource,
    /// Namespace of the last successful deployment
    pub previous: Option<String>,
    /// Default namespace of the active cluster context
    pub context: Option<String>,
}

impl NamespaceResolution {
    /// The function moves away from the namespace it was last deployed to
    pub fn is_migration(&self) -> bool {
        self.previous
            .as_deref()
            .is_some_and(|prev| prev != self.namespace)
    }

    /// The migration info message and, when the target also differs from
    /// the active context, a warning naming both
    pub fn notices(&self) -> Vec<Notice> {
        let Some(previous) = self.previous.as_deref().filter(|_| self.is_migration()) else {
            return Vec::new();
        };
        let mut notices = vec![Notice::Info(format!(
            "namespace changed from {previous} to {}",
            self.namespace
        ))];
        if let Some(context) = self.context.as_deref().filter(|c| *c != self.namespace) {
            notices.push(Notice::Warning(format!(
                "function is deployed to namespace {:?} but the active cluster context uses {context:?}",
                self.namespace
            )));
        }
        notices
    }
}

/// Resolves the namespace a function is deployed to
pub struct NamespaceResolver<'a> {
    context: &'a dyn ClusterContext,
}

impl<'a> NamespaceResolver<'a> {
    pub fn new(context: &'a dyn ClusterContext) -> Self {
        Self { context }
    }

    /// `requested` is the effective namespace setting of this invocation.
    ///
    /// An explicitly empty value (`--namespace=`) clears the request: it
    /// falls through to the previous deployment, global config and cluster
    /// context rather than selecting `default` directly.
    pub fn resolve(
        &self,
        requested: &Resolved<Option<String>>,
        f: &FunctionDescriptor,
    ) -> NamespaceResolution {
        let context = self.context.current_namespace().filter(|c| !c.is_empty());
        let previous = f.deploy.namespace.clone().filter(|p| !p.is_empty());
        let requested_value = requested.value.clone().filter(|r| !r.is_empty());

        let (namespace, source) = match (requested_value, requested.layer) {
            (Some(ns), _) if requested.is_explicit() => (ns, NamespaceSource::Explicit),
            (Some(ns), ConfigLayer::FunctionState) => (ns, NamespaceSource::Requested),
            (configured, _) => match (&previous, configured, &context) {
                (Some(prev), _, _) => (prev.clone(), NamespaceSource::Deployed),
                (None, Some(ns), _) => (ns, NamespaceSource::Configured),
                (None, None, Some(ctx)) => (ctx.clone(), NamespaceSource::Context),
                (None, None, None) => (DEFAULT_NAMESPACE.to_string(), NamespaceSource::Fallback),
            },
        };

        let resolution = NamespaceResolution {
            namespace,
            source,
            previous,
            context,
        };
        debug!(
            namespace = %resolution.namespace,
            source = %resolution.source,
            "resolved namespace"
        );
        resolution
    }
}
