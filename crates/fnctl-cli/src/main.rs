//! fnctl - build and deploy functions to Knative

use clap::Parser;

mod cli;
mod commands;
mod error;
mod exit_codes;
mod logging;

use cli::{Cli, Commands};

fn verbose_from_env() -> bool {
    std::env::var("FUNC_VERBOSE")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[tokio::main]
async fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();
    logging::init(cli.verbose || verbose_from_env());

    let result = match cli.command {
        Commands::Init {
            name,
            runtime,
            registry,
            path,
        } => commands::init::run(name.as_deref(), &runtime, registry.as_deref(), &path).await,

        Commands::Build(args) => commands::build::run(&args.path, args.flags()).await,

        Commands::Deploy(args) => commands::deploy::run(args).await,

        Commands::Config { command } => commands::config::run(command).await,
    };

    if let Err(err) = result {
        let code = err.exit_code();
        tracing::debug!(code, "command failed");
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
