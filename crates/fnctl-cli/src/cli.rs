//! Command line definitions

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use fnctl_core::{LayerValues, Setting};

#[derive(Parser)]
#[command(name = "fnctl")]
#[command(version)]
#[command(about = "Build and deploy functions to Knative", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Print debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a function project
    Init {
        /// Function name (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,

        /// Language runtime
        #[arg(short, long, default_value = "node")]
        runtime: String,

        /// Registry to publish images under
        #[arg(long)]
        registry: Option<String>,

        /// Function directory
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },

    /// Build the function image
    Build(BuildArgs),

    /// Deploy the function, building first when needed
    Deploy(DeployArgs),

    /// Edit function settings stored in func.yaml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Image settings shared by build and deploy
#[derive(Args, Debug, Default)]
pub struct ImageArgs {
    /// Registry for the function image, e.g. quay.io/alice
    #[arg(short = 'r', long)]
    pub registry: Option<String>,

    /// Full image reference, overriding the registry-derived name
    #[arg(short = 'i', long)]
    pub image: Option<String>,

    /// Builder: host, pack or s2i
    #[arg(short = 'b', long)]
    pub builder: Option<String>,

    /// Push the image after building
    #[arg(short = 'u', long, num_args = 0..=1, default_missing_value = "true")]
    pub push: Option<bool>,
}

impl ImageArgs {
    fn layer(&self) -> LayerValues {
        LayerValues::new()
            .with_opt(Setting::Registry, self.registry.clone())
            .with_opt(Setting::Image, self.image.clone())
            .with_opt(Setting::Builder, self.builder.clone())
            .with_opt(Setting::Push, self.push.map(|p| p.to_string()))
    }
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub image: ImageArgs,

    /// Function directory
    #[arg(short, long, default_value = ".")]
    pub path: PathBuf,
}

impl BuildArgs {
    /// Values given on the command line; unset flags stay absent
    pub fn flags(&self) -> LayerValues {
        self.image.layer()
    }
}

#[derive(Args, Debug)]
pub struct DeployArgs {
    #[command(flatten)]
    pub image: ImageArgs,

    /// Build before deploying: true, false or auto
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub build: Option<String>,

    /// Target namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Build and deploy on the cluster from git
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub remote: Option<bool>,

    /// Git repository for remote builds, optionally with #branch
    #[arg(short = 'g', long)]
    pub git_url: Option<String>,

    /// Git branch or revision for remote builds
    #[arg(short = 't', long)]
    pub git_branch: Option<String>,

    /// Directory inside the repository holding the function
    #[arg(short = 'd', long)]
    pub git_dir: Option<String>,

    /// Environment variable change: NAME=value, NAME- or '{{ secret:name }}'
    #[arg(short, long = "env")]
    pub env: Vec<String>,

    /// Abort after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print the plan without building or deploying
    #[arg(long)]
    pub dry_run: bool,

    /// Function directory
    #[arg(short, long, default_value = ".")]
    pub path: PathBuf,
}

impl DeployArgs {
    /// Values given on the command line; unset flags stay absent
    pub fn flags(&self) -> LayerValues {
        self.image
            .layer()
            .with_opt(Setting::Build, self.build.clone())
            .with_opt(Setting::Namespace, self.namespace.clone())
            .with_opt(Setting::Remote, self.remote.map(|r| r.to_string()))
            .with_opt(Setting::GitUrl, self.git_url.clone())
            .with_opt(Setting::GitBranch, self.git_branch.clone())
            .with_opt(Setting::GitDir, self.git_dir.clone())
    }
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// List or change environment variables
    Envs {
        /// NAME=value, NAME- or '{{ secret:name }}'; lists when omitted
        #[arg(short, long = "env")]
        env: Vec<String>,

        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },

    /// List or change labels
    Labels {
        /// KEY=value or KEY-; lists when omitted
        #[arg(short, long = "label")]
        label: Vec<String>,

        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },

    /// Manage mounted volumes
    Volumes {
        #[command(subcommand)]
        command: VolumeCommand,
    },

    /// Manage the git source for remote builds
    Git {
        #[command(subcommand)]
        command: GitCommand,
    },
}

#[derive(Subcommand)]
pub enum VolumeCommand {
    /// Mount a secret or config map
    Add {
        #[arg(long, conflicts_with = "configmap", required_unless_present = "configmap")]
        secret: Option<String>,

        #[arg(long)]
        configmap: Option<String>,

        /// Mount path inside the container
        #[arg(short, long)]
        mount: String,

        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },

    /// Remove the volume at a mount path
    Remove {
        #[arg(short, long)]
        mount: String,

        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },

    List {
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum GitCommand {
    /// Store git settings in func.yaml
    Set {
        #[arg(short = 'g', long)]
        git_url: Option<String>,

        #[arg(short = 't', long)]
        git_branch: Option<String>,

        #[arg(short = 'd', long)]
        git_dir: Option<String>,

        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },

    /// Clear the git settings
    Remove {
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deploy(args: &[&str]) -> DeployArgs {
        let cli = Cli::try_parse_from(["fnctl", "deploy"].iter().chain(args)).unwrap();
        match cli.command {
            Commands::Deploy(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_unset_flags_are_absent() {
        let flags = deploy(&[]).flags();
        assert!(flags.is_empty());
    }

    #[test]
    fn test_bare_boolean_flags() {
        let flags = deploy(&["--build", "--push", "--remote"]).flags();
        assert_eq!(flags.get(Setting::Build), Some("true"));
        assert_eq!(flags.get(Setting::Push), Some("true"));
        assert_eq!(flags.get(Setting::Remote), Some("true"));

        let flags = deploy(&["--build=false", "--push=false"]).flags();
        assert_eq!(flags.get(Setting::Build), Some("false"));
        assert_eq!(flags.get(Setting::Push), Some("false"));
    }

    #[test]
    fn test_explicit_empty_clears() {
        let flags = deploy(&["--git-url="]).flags();
        assert_eq!(flags.get(Setting::GitUrl), Some(""));
    }

    #[test]
    fn test_repeatable_env() {
        let args = deploy(&["-e", "A=1", "--env", "B-"]);
        assert_eq!(args.env, vec!["A=1", "B-"]);
    }
}
