//! Init command - create func.yaml in a function directory

use std::path::Path;

use console::style;
use fnctl_core::{FUNCTION_FILE, FunctionDescriptor, image::validate_registry};
use fnctl_deploy::{FileStore, FunctionStore};

use crate::commands::function_root;
use crate::error::{CliError, Result};

pub async fn run(
    name: Option<&str>,
    runtime: &str,
    registry: Option<&str>,
    path: &Path,
) -> Result<()> {
    let root = function_root(path)?;
    if root.join(FUNCTION_FILE).exists() {
        return Err(CliError::validation_with_help(
            format!("a function already exists at {}", root.display()),
            "edit func.yaml or choose another --path",
        ));
    }

    let name = match name {
        Some(name) => name.to_string(),
        None => root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
    };
    if let Some(registry) = registry {
        validate_registry(registry)?;
    }

    let mut f = FunctionDescriptor::new(&name, &root);
    f.runtime = runtime.to_string();
    f.registry = registry.map(str::to_string);
    f.validate()?;
    FileStore::new().save(&f).await?;

    println!(
        "{} Created {} function {} in {}",
        style("✓").green().bold(),
        style(runtime).yellow(),
        style(&name).cyan(),
        root.display()
    );
    Ok(())
}
