//! Knative Serving collaborators
//!
//! Functions run as `serving.knative.dev/v1` Services, applied with
//! Server-Side Apply through a dynamic API.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use fnctl_core::envs::interpolate;
use fnctl_core::labels::labels_map;
use fnctl_core::{EnvSource, FunctionDescriptor, VolumeSource};
use k8s_openapi::api::core::v1::{
    ConfigMapEnvSource, ConfigMapKeySelector, ConfigMapVolumeSource, Container,
    EmptyDirVolumeSource, EnvFromSource, EnvVar, EnvVarSource, PersistentVolumeClaimVolumeSource,
    SecretEnvSource, SecretKeySelector, SecretVolumeSource, Volume as PodVolume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::{
    Client,
    api::{Api, DeleteParams, DynamicObject, Patch, PatchParams},
    config::Kubeconfig,
    core::GroupVersionKind,
    discovery::ApiResource,
};
use serde_json::{Value, json};
use tracing::debug;

use crate::collaborators::{
    ClusterContext, Collaborators, Deployer, DeploymentResult, DeploymentStatus, Describer,
    Instance, Remover,
};
use crate::error::{DeployError, Result, Step};
use crate::namespace::DEFAULT_NAMESPACE;
use crate::process::{DockerPusher, NoPipelines, ToolBuilder};

/// Field manager for applied services
const FIELD_MANAGER: &str = "fnctl";

fn service_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(
        "serving.knative.dev",
        "v1",
        "Service",
    ))
}

fn services(client: &Client, namespace: &str) -> Api<DynamicObject> {
    Api::namespaced_with(client.clone(), namespace, &service_resource())
}

/// `status.url` of a service, when it has been reconciled
fn status_url(service: &DynamicObject) -> Option<String> {
    service
        .data
        .pointer("/status/url")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn env_var(name: String, value: Option<String>, value_from: Option<EnvVarSource>) -> EnvVar {
    EnvVar {
        name,
        value,
        value_from,
    }
}

/// Container envs and bulk `envFrom` references
fn container_env(
    f: &FunctionDescriptor,
    local: &HashMap<String, String>,
) -> Result<(Vec<EnvVar>, Vec<EnvFromSource>)> {
    let mut env = Vec::new();
    let mut env_from = Vec::new();
    for entry in interpolate(&f.run.envs, local)? {
        match (entry.name.clone(), entry.source()) {
            (Some(name), EnvSource::SecretKey { secret, key }) => env.push(env_var(
                name,
                None,
                Some(EnvVarSource {
                    secret_key_ref: Some(SecretKeySelector {
                        name: secret,
                        key,
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
            )),
            (Some(name), EnvSource::ConfigMapKey { config_map, key }) => env.push(env_var(
                name,
                None,
                Some(EnvVarSource {
                    config_map_key_ref: Some(ConfigMapKeySelector {
                        name: config_map,
                        key,
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
            )),
            (None, EnvSource::Secret(secret)) => env_from.push(EnvFromSource {
                secret_ref: Some(SecretEnvSource {
                    name: secret,
                    ..Default::default()
                }),
                ..Default::default()
            }),
            (None, EnvSource::ConfigMap(config_map)) => env_from.push(EnvFromSource {
                config_map_ref: Some(ConfigMapEnvSource {
                    name: config_map,
                    ..Default::default()
                }),
                ..Default::default()
            }),
            (Some(name), _) => env.push(env_var(name, Some(entry.value), None)),
            (None, _) => {}
        }
    }
    Ok((env, env_from))
}

/// Pod volumes and the matching container mounts.
///
/// A source mounted at several paths yields one pod volume; a path may
/// be mounted only once.
fn container_volumes(f: &FunctionDescriptor) -> Result<(Vec<PodVolume>, Vec<VolumeMount>)> {
    let mut volumes: Vec<PodVolume> = Vec::new();
    let mut mounts = Vec::new();
    let mut used_paths = HashSet::new();
    for (i, volume) in f.run.volumes.iter().enumerate() {
        let (Some(path), Some(source)) = (volume.path.as_deref(), volume.source()) else {
            continue;
        };
        if !used_paths.insert(path) {
            return Err(DeployError::collaborator(
                Step::Deploy,
                format!("mount path {path} is defined multiple times, each volume needs its own path"),
            ));
        }
        let volume = match source {
            VolumeSource::Secret(secret) => PodVolume {
                name: format!("secret-{secret}"),
                secret: Some(SecretVolumeSource {
                    secret_name: Some(secret),
                    ..Default::default()
                }),
                ..Default::default()
            },
            VolumeSource::ConfigMap(config_map) => PodVolume {
                name: format!("config-map-{config_map}"),
                config_map: Some(ConfigMapVolumeSource {
                    name: config_map,
                    ..Default::default()
                }),
                ..Default::default()
            },
            VolumeSource::PersistentVolumeClaim(claim) => {
                let claim_name = claim.claim_name.unwrap_or_default();
                PodVolume {
                    name: format!("pvc-{claim_name}"),
                    persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                        claim_name,
                        read_only: claim.read_only.then_some(true),
                    }),
                    ..Default::default()
                }
            }
            VolumeSource::EmptyDir(empty_dir) => PodVolume {
                name: format!("empty-dir-{i}"),
                empty_dir: Some(EmptyDirVolumeSource {
                    medium: Some(empty_dir.medium).filter(|m| !m.is_empty()),
                    size_limit: empty_dir.size_limit.map(Quantity),
                }),
                ..Default::default()
            },
        };
        mounts.push(VolumeMount {
            name: volume.name.clone(),
            mount_path: path.to_string(),
            ..Default::default()
        });
        if !volumes.iter().any(|v| v.name == volume.name) {
            volumes.push(volume);
        }
    }
    Ok((volumes, mounts))
}

/// Build the Service object for `f`.
///
/// `f.deploy.image` is the image to run and `f.namespace` the target;
/// `local` resolves `{{ env:X }}` references.
pub fn service_manifest(
    f: &FunctionDescriptor,
    local: &HashMap<String, String>,
) -> Result<DynamicObject> {
    let image = f
        .deploy
        .image
        .as_deref()
        .ok_or_else(|| DeployError::collaborator(Step::Deploy, "no image to deploy"))?;
    let namespace = f.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
    let labels = labels_map(&f.deploy.labels, &f.name, &f.runtime, local)?;

    let (env, env_from) = container_env(f, local)?;
    let (volumes, mounts) = container_volumes(f)?;
    let container = Container {
        image: Some(image.to_string()),
        env: Some(env).filter(|e| !e.is_empty()),
        env_from: Some(env_from).filter(|e| !e.is_empty()),
        volume_mounts: Some(mounts).filter(|m| !m.is_empty()),
        ..Default::default()
    };

    let mut service = DynamicObject::new(&f.name, &service_resource())
        .within(namespace)
        .data(json!({
            "spec": {
                "template": {
                    "metadata": { "labels": labels },
                    "spec": {
                        "containers": [container],
                        "volumes": volumes,
                    }
                }
            }
        }));
    service.metadata.labels = Some(labels);
    Ok(service)
}

/// Applies functions as Knative Services
pub struct KnativeDeployer {
    client: Client,
    local: HashMap<String, String>,
}

impl KnativeDeployer {
    /// `local` is the environment used for `{{ env:X }}` references
    pub fn new(client: Client, local: HashMap<String, String>) -> Self {
        Self { client, local }
    }
}

#[async_trait]
impl Deployer for KnativeDeployer {
    async fn deploy(&self, f: &FunctionDescriptor) -> Result<DeploymentResult> {
        let service = service_manifest(f, &self.local)?;
        let namespace = service
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let api = services(&self.client, &namespace);

        let exists = api.get_opt(&f.name).await?.is_some();
        let params = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            force: true,
            ..Default::default()
        };
        let applied = api
            .patch(&f.name, &params, &Patch::Apply(&service))
            .await
            .map_err(|e| {
                DeployError::collaborator(
                    Step::Deploy,
                    format!("failed to apply service {}: {}", f.name, e),
                )
            })?;
        debug!(name = %f.name, namespace = %namespace, exists, "applied service");

        Ok(DeploymentResult {
            namespace,
            status: if exists {
                DeploymentStatus::Updated
            } else {
                DeploymentStatus::Deployed
            },
            url: status_url(&applied),
        })
    }
}

pub struct KnativeRemover {
    client: Client,
}

impl KnativeRemover {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Remover for KnativeRemover {
    async fn remove(&self, name: &str, namespace: &str) -> Result<()> {
        match services(&self.client, namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Err(DeployError::NotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reads routes from the service status
pub struct KnativeDescriber {
    client: Client,
}

impl KnativeDescriber {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Describer for KnativeDescriber {
    async fn describe(
        &self,
        name: &str,
        namespace: &str,
        _f: &FunctionDescriptor,
    ) -> Result<Instance> {
        let service = services(&self.client, namespace).get(name).await?;
        let mut routes: Vec<String> = status_url(&service).into_iter().collect();
        if let Some(internal) = service
            .data
            .pointer("/status/address/url")
            .and_then(Value::as_str)
        {
            routes.push(internal.to_string());
        }
        Ok(Instance {
            name: name.to_string(),
            namespace: namespace.to_string(),
            routes,
        })
    }
}

/// Namespace of the current kubeconfig context
#[derive(Debug, Clone, Copy, Default)]
pub struct KubeconfigContext;

impl ClusterContext for KubeconfigContext {
    fn current_namespace(&self) -> Option<String> {
        let config = Kubeconfig::read().ok()?;
        let current = config.current_context.as_deref()?;
        config
            .contexts
            .iter()
            .find(|c| c.name == current)?
            .context
            .as_ref()?
            .namespace
            .clone()
    }
}

/// Connect with the default kubeconfig or in-cluster configuration
pub async fn connect(local: HashMap<String, String>) -> Result<Collaborators> {
    let client = Client::try_default().await?;
    Ok(collaborators(client, local))
}

/// Local tools for building and pushing, Knative Serving for the rest
pub fn collaborators(client: Client, local: HashMap<String, String>) -> Collaborators {
    Collaborators {
        builder: Arc::new(ToolBuilder),
        pusher: Arc::new(DockerPusher),
        deployer: Arc::new(KnativeDeployer::new(client.clone(), local)),
        remover: Arc::new(KnativeRemover::new(client.clone())),
        describer: Arc::new(KnativeDescriber::new(client)),
        pipelines: Arc::new(NoPipelines),
        context: Arc::new(KubeconfigContext),
    }
}
