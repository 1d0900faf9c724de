//! Collaborators backed by local tools
//!
//! Builds run through the `pack` or `s2i` CLIs and images are pushed with
//! `docker push`. Each tool must be on `PATH`.

use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use fnctl_core::{BuilderKind, FunctionDescriptor};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;
use tracing::debug;

use crate::collaborators::{
    Builder, Collaborators, Deployer, DeploymentResult, Describer, Instance, PipelinesProvider,
    Pusher, Remover,
};
use crate::error::{DeployError, Result, Step};
use crate::knative::KubeconfigContext;

static PUSH_DIGEST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"digest: (sha256:[0-9a-f]{64})").expect("valid regex"));

/// Run `program` in `dir`, returning stdout or the failure as a step error
async fn run(step: Step, program: &str, args: &[OsString], dir: &Path) -> Result<String> {
    debug!(program, ?args, dir = %dir.display(), "running");
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| DeployError::collaborator(step, format!("unable to run {program}: {e}")))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let code = output.status.code().unwrap_or(-1);
        Err(DeployError::collaborator(
            step,
            format!("{program} exited with code {code}: {stderr}"),
        ))
    }
}

fn built_image(f: &FunctionDescriptor) -> Result<&str> {
    f.build
        .image
        .as_deref()
        .ok_or_else(|| DeployError::collaborator(Step::Build, "no image to build"))
}

const PACK_BASE_BUILDER: &str = "ghcr.io/gauron99/builder-jammy-base:latest";
const PACK_TINY_BUILDER: &str = "ghcr.io/gauron99/builder-jammy-tiny:latest";

/// Builder image used for `runtime` when func.yaml names none
pub fn default_builder_image(kind: BuilderKind, runtime: &str) -> Option<&'static str> {
    match (kind, runtime) {
        (BuilderKind::Pack, "go" | "quarkus") => Some(PACK_TINY_BUILDER),
        (BuilderKind::Pack, "node" | "nodejs" | "typescript" | "python" | "rust" | "springboot") => {
            Some(PACK_BASE_BUILDER)
        }
        (BuilderKind::S2i, "node" | "nodejs" | "typescript") => {
            Some("registry.access.redhat.com/ubi8/nodejs-20-minimal")
        }
        (BuilderKind::S2i, "go") => Some("registry.access.redhat.com/ubi8/go-toolset"),
        (BuilderKind::S2i, "python") => Some("registry.access.redhat.com/ubi8/python-39"),
        (BuilderKind::S2i, "quarkus") => Some("registry.access.redhat.com/ubi8/openjdk-21"),
        _ => None,
    }
}

/// The configured builder image for `kind`, else the runtime default
pub fn builder_image(f: &FunctionDescriptor, kind: BuilderKind) -> Result<String> {
    if let Some(image) = f.build.builder_images.get(kind.as_str()) {
        return Ok(image.clone());
    }
    if f.runtime.is_empty() {
        return Err(DeployError::collaborator(
            Step::Build,
            format!("the {kind} builder needs a runtime to pick a builder image"),
        ));
    }
    default_builder_image(kind, &f.runtime)
        .map(str::to_string)
        .ok_or_else(|| {
            DeployError::collaborator(
                Step::Build,
                format!(
                    "no default {kind} builder image for runtime {:?}; set build.builderImages.{kind} in func.yaml",
                    f.runtime
                ),
            )
        })
}

/// Arguments for `pack build`
pub fn pack_args(f: &FunctionDescriptor) -> Result<Vec<OsString>> {
    Ok(vec![
        "build".into(),
        built_image(f)?.into(),
        "--path".into(),
        f.root.clone().into_os_string(),
        "--builder".into(),
        builder_image(f, BuilderKind::Pack)?.into(),
    ])
}

/// Arguments for `s2i build`
pub fn s2i_args(f: &FunctionDescriptor) -> Result<Vec<OsString>> {
    Ok(vec![
        "build".into(),
        f.root.clone().into_os_string(),
        builder_image(f, BuilderKind::S2i)?.into(),
        built_image(f)?.into(),
    ])
}

/// Builds with the builder named in `f.build.builder`
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolBuilder;

#[async_trait]
impl Builder for ToolBuilder {
    async fn build(&self, f: &FunctionDescriptor) -> Result<()> {
        let kind = match f.build.builder.as_deref() {
            Some(builder) => builder.parse()?,
            None => BuilderKind::default(),
        };
        let (program, args) = match kind {
            BuilderKind::Pack => ("pack", pack_args(f)?),
            BuilderKind::S2i => ("s2i", s2i_args(f)?),
            BuilderKind::Host => {
                return Err(DeployError::collaborator(
                    Step::Build,
                    "the host builder is not supported, use pack or s2i",
                ));
            }
        };
        run(Step::Build, program, &args, &f.root).await?;
        Ok(())
    }
}

/// Extract the digest reported by `docker push`
pub fn parse_push_digest(output: &str) -> Option<String> {
    PUSH_DIGEST
        .captures_iter(output)
        .last()
        .map(|c| c[1].to_string())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DockerPusher;

#[async_trait]
impl Pusher for DockerPusher {
    async fn push(&self, f: &FunctionDescriptor) -> Result<String> {
        let image = f
            .build
            .image
            .as_deref()
            .ok_or_else(|| DeployError::collaborator(Step::Push, "no built image to push"))?;
        let output = run(Step::Push, "docker", &["push".into(), image.into()], &f.root).await?;
        parse_push_digest(&output).ok_or_else(|| {
            DeployError::collaborator(Step::Push, format!("no digest reported for {image}"))
        })
    }
}

/// Stands in when no on-cluster pipeline is installed
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPipelines;

#[async_trait]
impl PipelinesProvider for NoPipelines {
    async fn run(&self, _f: &FunctionDescriptor) -> Result<(String, FunctionDescriptor)> {
        Err(DeployError::collaborator(
            Step::Pipeline,
            "remote builds need an on-cluster pipelines provider, none is installed",
        ))
    }
}

/// Cluster steps for commands that run without a cluster connection
#[derive(Debug, Clone, Copy, Default)]
pub struct Disconnected;

impl Disconnected {
    fn refuse(step: Step) -> DeployError {
        DeployError::collaborator(step, "no cluster connection")
    }
}

#[async_trait]
impl Deployer for Disconnected {
    async fn deploy(&self, _f: &FunctionDescriptor) -> Result<DeploymentResult> {
        Err(Self::refuse(Step::Deploy))
    }
}

#[async_trait]
impl Remover for Disconnected {
    async fn remove(&self, _name: &str, _namespace: &str) -> Result<()> {
        Err(Self::refuse(Step::Remove))
    }
}

#[async_trait]
impl Describer for Disconnected {
    async fn describe(
        &self,
        _name: &str,
        _namespace: &str,
        _f: &FunctionDescriptor,
    ) -> Result<Instance> {
        Err(Self::refuse(Step::Describe))
    }
}

/// Collaborators for building and pushing only
pub fn local_collaborators() -> Collaborators {
    Collaborators {
        builder: Arc::new(ToolBuilder),
        pusher: Arc::new(DockerPusher),
        deployer: Arc::new(Disconnected),
        remover: Arc::new(Disconnected),
        describer: Arc::new(Disconnected),
        pipelines: Arc::new(NoPipelines),
        context: Arc::new(KubeconfigContext),
    }
}
