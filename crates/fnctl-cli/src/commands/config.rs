//! Config commands - edit collections and git settings in func.yaml

use std::path::Path;

use console::style;
use fnctl_core::envs::parse_env_args;
use fnctl_core::labels::parse_label_args;
use fnctl_core::volumes::{VolumeArgs, volume_change, volume_removal};
use fnctl_core::{FunctionDescriptor, GitSpec, VolumeSource, function::split_git_url};
use fnctl_deploy::{FileStore, FunctionStore};

use crate::cli::{ConfigCommand, GitCommand, VolumeCommand};
use crate::commands::function_root;
use crate::error::{CliError, Result};

pub async fn run(command: ConfigCommand) -> Result<()> {
    let store = FileStore::new();
    match command {
        ConfigCommand::Envs { env, path } => {
            let mut f = load(&store, &path).await?;
            if env.is_empty() {
                list_envs(&f);
                return Ok(());
            }
            update_envs(&mut f, &env)?;
            save(&store, &f, "environment variables").await
        }
        ConfigCommand::Labels { label, path } => {
            let mut f = load(&store, &path).await?;
            if label.is_empty() {
                list_labels(&f);
                return Ok(());
            }
            update_labels(&mut f, &label)?;
            save(&store, &f, "labels").await
        }
        ConfigCommand::Volumes { command } => match command {
            VolumeCommand::Add {
                secret,
                configmap,
                mount,
                path,
            } => {
                let mut f = load(&store, &path).await?;
                add_volume(
                    &mut f,
                    &VolumeArgs {
                        secret,
                        config_map: configmap,
                        mount_path: Some(mount),
                    },
                )?;
                save(&store, &f, "volumes").await
            }
            VolumeCommand::Remove { mount, path } => {
                let mut f = load(&store, &path).await?;
                remove_volume(&mut f, &mount)?;
                save(&store, &f, "volumes").await
            }
            VolumeCommand::List { path } => {
                list_volumes(&load(&store, &path).await?);
                Ok(())
            }
        },
        ConfigCommand::Git { command } => match command {
            GitCommand::Set {
                git_url,
                git_branch,
                git_dir,
                path,
            } => {
                let mut f = load(&store, &path).await?;
                set_git(&mut f, git_url, git_branch, git_dir)?;
                save(&store, &f, "git settings").await
            }
            GitCommand::Remove { path } => {
                let mut f = load(&store, &path).await?;
                f.build.git = GitSpec::default();
                save(&store, &f, "git settings").await
            }
        },
    }
}

async fn load(store: &dyn FunctionStore, path: &Path) -> Result<FunctionDescriptor> {
    Ok(store.load(&function_root(path)?).await?)
}

async fn save(store: &dyn FunctionStore, f: &FunctionDescriptor, what: &str) -> Result<()> {
    store.save(f).await?;
    println!(
        "{} Updated {} of {}",
        style("✓").green().bold(),
        what,
        style(&f.name).cyan()
    );
    Ok(())
}

fn update_envs(f: &mut FunctionDescriptor, args: &[String]) -> Result<()> {
    f.run.envs = parse_env_args(args)?.apply(std::mem::take(&mut f.run.envs))?;
    Ok(())
}

fn update_labels(f: &mut FunctionDescriptor, args: &[String]) -> Result<()> {
    f.deploy.labels = parse_label_args(args)?.apply(std::mem::take(&mut f.deploy.labels))?;
    Ok(())
}

fn add_volume(f: &mut FunctionDescriptor, args: &VolumeArgs) -> Result<()> {
    f.run.volumes = volume_change(args)?.apply(std::mem::take(&mut f.run.volumes))?;
    Ok(())
}

fn remove_volume(f: &mut FunctionDescriptor, mount: &str) -> Result<()> {
    if !f.run.volumes.iter().any(|v| v.path.as_deref() == Some(mount)) {
        return Err(CliError::NotFound {
            message: format!("no volume is mounted at {mount}"),
        });
    }
    f.run.volumes = volume_removal(mount).apply(std::mem::take(&mut f.run.volumes))?;
    Ok(())
}

fn set_git(
    f: &mut FunctionDescriptor,
    url: Option<String>,
    branch: Option<String>,
    dir: Option<String>,
) -> Result<()> {
    if url.is_none() && branch.is_none() && dir.is_none() {
        return Err(CliError::usage(
            "give at least one of --git-url, --git-branch or --git-dir",
        ));
    }
    if let Some(url) = url {
        let (url, fragment) = split_git_url(&url);
        f.build.git.url = Some(url).filter(|u| !u.is_empty());
        if fragment.is_some() && branch.is_none() {
            f.build.git.revision = fragment;
        }
    }
    if let Some(branch) = branch {
        f.build.git.revision = Some(branch).filter(|b| !b.is_empty());
    }
    if let Some(dir) = dir {
        f.build.git.context_dir = Some(dir).filter(|d| !d.is_empty());
    }
    f.validate()?;
    Ok(())
}

fn list_envs(f: &FunctionDescriptor) {
    if f.run.envs.is_empty() {
        println!("No environment variables set");
        return;
    }
    println!("Environment variables of {}:", style(&f.name).cyan());
    for env in &f.run.envs {
        match &env.name {
            Some(name) => println!("  {}={}", name, env.value),
            None => println!("  {}", env.value),
        }
    }
}

fn list_labels(f: &FunctionDescriptor) {
    if f.deploy.labels.is_empty() {
        println!("No labels set");
        return;
    }
    println!("Labels of {}:", style(&f.name).cyan());
    for label in &f.deploy.labels {
        println!("  {}={}", label.key.as_deref().unwrap_or_default(), label.value);
    }
}

fn list_volumes(f: &FunctionDescriptor) {
    if f.run.volumes.is_empty() {
        println!("No volumes mounted");
        return;
    }
    println!("Volumes of {}:", style(&f.name).cyan());
    for volume in &f.run.volumes {
        let source = match volume.source() {
            Some(VolumeSource::Secret(name)) => format!("secret {name}"),
            Some(VolumeSource::ConfigMap(name)) => format!("config map {name}"),
            Some(VolumeSource::PersistentVolumeClaim(claim)) => format!(
                "persistent volume claim {}",
                claim.claim_name.as_deref().unwrap_or_default()
            ),
            Some(VolumeSource::EmptyDir(_)) => "empty dir".to_string(),
            None => "invalid source".to_string(),
        };
        println!(
            "  {} at {}",
            source,
            volume.path.as_deref().unwrap_or_default()
        );
    }
}
