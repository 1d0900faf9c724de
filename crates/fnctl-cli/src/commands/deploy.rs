//! Deploy command - build when needed and deploy to the cluster

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use console::style;
use fnctl_core::{ConfigResolver, FunctionDescriptor, LayerValues, envs::parse_env_args};
use fnctl_deploy::{
    ClusterContext, Executor, ExecutorOptions, FileStore, FunctionStore, KubeconfigContext,
    Operation, Report, knative, plan,
};

use crate::cli::DeployArgs;
use crate::commands::{environment, finish, function_root, interruptible, print_notices, resolve};
use crate::error::Result;

pub async fn run(args: DeployArgs) -> Result<()> {
    let root = function_root(&args.path)?;
    let env = environment();
    let store = FileStore::new();

    if args.dry_run {
        let f = store.load(&root).await?;
        return dry_run(f, &env, args.flags(), &args.env, &KubeconfigContext);
    }

    let mut options = ExecutorOptions::default();
    if let Some(seconds) = args.timeout {
        options = options.with_timeout(Duration::from_secs(seconds));
    }
    let collaborators = knative::connect(env.clone()).await?;
    let executor = Executor::new(collaborators).with_options(options);

    let report = execute(&store, &executor, &root, &env, args.flags(), &args.env).await?;
    print_report(&report);
    Ok(())
}

/// Apply `--env` changes to the loaded function
fn apply_env_args(f: &mut FunctionDescriptor, env_args: &[String]) -> Result<()> {
    if env_args.is_empty() {
        return Ok(());
    }
    let changes = parse_env_args(env_args)?;
    f.run.envs = changes.apply(std::mem::take(&mut f.run.envs))?;
    Ok(())
}

/// Load, deploy and save the function at `root`
pub async fn execute(
    store: &dyn FunctionStore,
    executor: &Executor,
    root: &Path,
    env: &HashMap<String, String>,
    flags: LayerValues,
    env_args: &[String],
) -> Result<Report> {
    let mut f = store.load(root).await?;
    let config = resolve(ConfigResolver::new(), &f, env, flags)?;
    apply_env_args(&mut f, env_args)?;

    println!(
        "{} Deploying function {}",
        style("→").blue().bold(),
        style(&f.name).cyan()
    );
    let outcome = interruptible(executor.deploy(&mut f, &config)).await;
    finish(store, &f, outcome).await
}

fn dry_run(
    mut f: FunctionDescriptor,
    env: &HashMap<String, String>,
    flags: LayerValues,
    env_args: &[String],
    context: &dyn ClusterContext,
) -> Result<()> {
    let config = resolve(ConfigResolver::new(), &f, env, flags)?;
    apply_env_args(&mut f, env_args)?;
    config.apply_to(&mut f);
    let plan = plan(Operation::Deploy, &f, &config, context)?;

    println!(
        "{} Dry run - {} would {}",
        style("✓").green().bold(),
        style(&f.name).cyan(),
        plan.decision
    );
    println!("  image:     {} ({})", plan.target, plan.state);
    println!(
        "  namespace: {} (from {})",
        style(&plan.namespace.namespace).yellow(),
        plan.namespace.source
    );
    print_notices(&plan.namespace.notices());
    Ok(())
}

fn print_report(report: &Report) {
    if let Some(image) = &report.built_image {
        println!("{} Function built: {}", style("✓").green().bold(), image);
    }
    if let Some(digest) = &report.digest {
        println!("{} Pushed {}", style("✓").green().bold(), digest);
    }
    print_notices(&report.notices);

    let namespace = report.namespace.as_deref().unwrap_or_default();
    let status = report
        .status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "deployed".to_string());
    match &report.url {
        Some(url) => println!(
            "{} Function {} in namespace {:?} and exposed at URL:\n  {}",
            style("✓").green().bold(),
            status,
            namespace,
            style(url).cyan()
        ),
        None => println!(
            "{} Function {} in namespace {:?}",
            style("✓").green().bold(),
            status,
            namespace
        ),
    }
}
