//! CLI command implementations

pub mod build;
pub mod config;
pub mod deploy;
pub mod init;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use console::style;
use fnctl_core::{
    ConfigLayer, ConfigResolver, EffectiveConfig, FunctionDescriptor, GlobalConfig, LayerValues,
};
use fnctl_deploy::{DeployError, FunctionStore, Notice};

use crate::error::Result;

/// Snapshot of the process environment for one invocation
pub fn environment() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Absolute function root for a `--path` argument
pub fn function_root(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}

/// Merge every configuration layer for `f` over the defaults in `base`
pub fn resolve(
    base: ConfigResolver,
    f: &FunctionDescriptor,
    env: &HashMap<String, String>,
    flags: LayerValues,
) -> Result<EffectiveConfig> {
    let global = GlobalConfig::load(env)?;
    Ok(base
        .layer(ConfigLayer::GlobalConfig, global.to_layer())
        .layer(ConfigLayer::FunctionState, LayerValues::from_function(f))
        .layer(ConfigLayer::EnvironmentVariable, LayerValues::from_env(env))
        .layer(ConfigLayer::CliFlag, flags)
        .effective()?)
}

/// Persist what a lifecycle command completed.
///
/// Validation failures leave func.yaml untouched; any other outcome is
/// saved so steps that succeeded before a failure are kept.
pub async fn finish<T>(
    store: &dyn FunctionStore,
    f: &FunctionDescriptor,
    outcome: std::result::Result<T, DeployError>,
) -> Result<T> {
    match outcome {
        Ok(value) => {
            store.save(f).await?;
            Ok(value)
        }
        Err(e) if e.is_validation() => Err(e.into()),
        Err(e) => {
            store.save(f).await?;
            Err(e.into())
        }
    }
}

/// Run `fut` unless the user interrupts first
pub async fn interruptible<T>(
    fut: impl Future<Output = std::result::Result<T, DeployError>>,
) -> std::result::Result<T, DeployError> {
    tokio::select! {
        result = fut => result,
        _ = tokio::signal::ctrl_c() => Err(DeployError::Canceled),
    }
}

pub fn print_notices(notices: &[Notice]) {
    for notice in notices {
        match notice {
            Notice::Info(message) => println!("{} {}", style("→").blue(), message),
            Notice::Warning(message) => eprintln!("{} {}", style("⚠").yellow(), message),
        }
    }
}
