//! Build command - build and optionally push the function image

use std::collections::HashMap;
use std::path::Path;

use console::style;
use fnctl_core::{ConfigResolver, LayerValues};
use fnctl_deploy::{Executor, FileStore, FunctionStore, Report, local_collaborators};

use crate::commands::{environment, finish, function_root, interruptible, resolve};
use crate::error::Result;

pub async fn run(path: &Path, flags: LayerValues) -> Result<()> {
    let root = function_root(path)?;
    let executor = Executor::new(local_collaborators());
    let report = execute(&FileStore::new(), &executor, &root, &environment(), flags).await?;

    if let Some(image) = &report.built_image {
        println!(
            "{} Function built: {}",
            style("✓").green().bold(),
            style(image).cyan()
        );
    }
    if let Some(digest) = &report.digest {
        println!("{} Pushed {}", style("✓").green().bold(), digest);
    }
    Ok(())
}

/// Load, build and save the function at `root`
pub async fn execute(
    store: &dyn FunctionStore,
    executor: &Executor,
    root: &Path,
    env: &HashMap<String, String>,
    flags: LayerValues,
) -> Result<Report> {
    let mut f = store.load(root).await?;
    let config = resolve(ConfigResolver::for_build(), &f, env, flags)?;
    println!(
        "{} Building function {}",
        style("→").blue().bold(),
        style(&f.name).cyan()
    );
    let outcome = interruptible(executor.build(&mut f, &config)).await;
    finish(store, &f, outcome).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use fnctl_core::{FunctionDescriptor, Setting};
    use fnctl_deploy::MemoryStore;
    use fnctl_deploy::mock::{MOCK_DIGEST, MockSet};

    fn env() -> HashMap<String, String> {
        HashMap::from([(
            "FUNC_CONFIG_FILE".to_string(),
            "/nonexistent/config.yaml".to_string(),
        )])
    }

    #[tokio::test]
    async fn test_build_does_not_push_by_default() {
        let store = MemoryStore::with_function(FunctionDescriptor::new("f", "/srv/f"));
        let mocks = MockSet::new();
        let executor = Executor::new(mocks.collaborators());
        let flags = LayerValues::new().with(Setting::Registry, "alice");

        let report = execute(&store, &executor, Path::new("/srv/f"), &env(), flags)
            .await
            .unwrap();

        assert_eq!(mocks.calls(), vec!["build"]);
        assert_eq!(report.digest, None);
        let saved = store.get(Path::new("/srv/f")).unwrap();
        assert_eq!(saved.build.image.as_deref(), Some("docker.io/alice/f:latest"));
    }

    #[tokio::test]
    async fn test_build_records_image() {
        let store = MemoryStore::with_function(FunctionDescriptor::new("f", "/srv/f"));
        let mocks = MockSet::new();
        let executor = Executor::new(mocks.collaborators());
        let flags = LayerValues::new()
            .with(Setting::Registry, "alice")
            .with(Setting::Push, "true");

        let report = execute(&store, &executor, Path::new("/srv/f"), &env(), flags)
            .await
            .unwrap();

        assert_eq!(mocks.calls(), vec!["build", "push"]);
        assert_eq!(report.digest.as_deref(), Some(MOCK_DIGEST));
        let saved = store.get(Path::new("/srv/f")).unwrap();
        assert_eq!(saved.build.image.as_deref(), Some("docker.io/alice/f:latest"));
        assert_eq!(saved.registry.as_deref(), Some("alice"));
        assert_eq!(saved.deploy.image, None);
    }

    #[tokio::test]
    async fn test_build_without_registry_saves_nothing() {
        let store = MemoryStore::with_function(FunctionDescriptor::new("f", "/srv/f"));
        let executor = Executor::new(MockSet::new().collaborators());

        let err = execute(&store, &executor, Path::new("/srv/f"), &env(), LayerValues::new())
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), crate::exit_codes::VALIDATION_ERROR);
        assert_eq!(store.operation_counts().saves, 0);
    }
}
