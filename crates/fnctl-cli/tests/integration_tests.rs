//! Integration tests for CLI commands

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const DIGEST: &str = "sha256:2c26b46b68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae";

/// Run fnctl with an isolated configuration
fn fnctl(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fnctl"))
        .args(args)
        .arg("--path")
        .arg(dir)
        .env("FUNC_CONFIG_FILE", dir.join("missing-config.yaml"))
        .env("KUBECONFIG", dir.join("missing-kubeconfig"))
        .env_remove("FUNC_REGISTRY")
        .env_remove("FUNC_NAMESPACE")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute fnctl")
}

fn init(registry: Option<&str>) -> TempDir {
    let dir = TempDir::new().unwrap();
    let mut args = vec!["init", "--name", "hello"];
    if let Some(registry) = registry {
        args.extend(["--registry", registry]);
    }
    let output = fnctl(dir.path(), &args);
    assert!(output.status.success(), "init failed: {:?}", output);
    dir
}

fn func_yaml(dir: &TempDir) -> String {
    std::fs::read_to_string(dir.path().join("func.yaml")).unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

mod init_command {
    use super::*;

    #[test]
    fn test_init_creates_function() {
        let dir = init(Some("quay.io/alice"));
        let yaml = func_yaml(&dir);
        assert!(yaml.contains("name: hello"));
        assert!(yaml.contains("registry: quay.io/alice"));
    }

    #[test]
    fn test_init_twice_fails() {
        let dir = init(None);
        let output = fnctl(dir.path(), &["init"]);
        assert_eq!(output.status.code(), Some(2));
    }

    #[test]
    fn test_init_rejects_bad_registry() {
        let dir = TempDir::new().unwrap();
        let output = fnctl(dir.path(), &["init", "--registry", "a/b/c/d"]);
        assert_eq!(output.status.code(), Some(2));
        assert!(!dir.path().join("func.yaml").exists());
    }
}

mod deploy_command {
    use super::*;

    #[test]
    fn test_dry_run_prints_plan() {
        let dir = init(Some("alice"));
        let output = fnctl(dir.path(), &["deploy", "--dry-run"]);

        assert!(output.status.success(), "dry run failed: {:?}", output);
        let out = stdout(&output);
        assert!(out.contains("would build, push, deploy"));
        assert!(out.contains("docker.io/alice/hello:latest"));
        assert!(out.contains("namespace: default"));
    }

    #[test]
    fn test_dry_run_explicit_namespace() {
        let dir = init(Some("alice"));
        let output = fnctl(dir.path(), &["deploy", "--dry-run", "-n", "prod"]);

        assert!(output.status.success());
        assert!(stdout(&output).contains("namespace: prod (from flag)"));
    }

    #[test]
    fn test_no_build_without_image_exits_not_built() {
        let dir = init(Some("alice"));
        let before = func_yaml(&dir);
        let output = fnctl(dir.path(), &["deploy", "--build=false", "--dry-run"]);

        assert_eq!(output.status.code(), Some(3));
        assert_eq!(func_yaml(&dir), before);
    }

    #[test]
    fn test_digest_with_forced_build_is_rejected() {
        let dir = init(None);
        let image = format!("docker.io/alice/hello@{DIGEST}");
        let output = fnctl(
            dir.path(),
            &["deploy", "--image", &image, "--build=true", "--dry-run"],
        );
        assert_eq!(output.status.code(), Some(2));
    }

    #[test]
    fn test_digest_deploys_as_is() {
        let dir = init(None);
        let image = format!("docker.io/alice/hello@{DIGEST}");
        let output = fnctl(dir.path(), &["deploy", "--image", &image, "--dry-run"]);

        assert!(output.status.success(), "dry run failed: {:?}", output);
        assert!(stdout(&output).contains(&format!("would deploy {image}")));
    }

    #[test]
    fn test_missing_registry() {
        let dir = init(None);
        let output = fnctl(dir.path(), &["deploy", "--dry-run"]);
        assert_eq!(output.status.code(), Some(2));
    }

    #[test]
    fn test_not_initialized() {
        let dir = TempDir::new().unwrap();
        let output = fnctl(dir.path(), &["deploy", "--dry-run"]);
        assert_eq!(output.status.code(), Some(2));
        assert!(String::from_utf8_lossy(&output.stderr).contains("fnctl init"));
    }
}

mod config_command {
    use super::*;

    #[test]
    fn test_envs_add_and_list() {
        let dir = init(None);
        let output = fnctl(dir.path(), &["config", "envs", "-e", "GREETING=hi"]);
        assert!(output.status.success(), "envs failed: {:?}", output);
        assert!(func_yaml(&dir).contains("GREETING"));

        let output = fnctl(dir.path(), &["config", "envs"]);
        assert!(stdout(&output).contains("GREETING=hi"));

        let output = fnctl(dir.path(), &["config", "envs", "-e", "GREETING-"]);
        assert!(output.status.success());
        assert!(!func_yaml(&dir).contains("GREETING"));
    }

    #[test]
    fn test_invalid_env_leaves_function_unchanged() {
        let dir = init(None);
        let before = func_yaml(&dir);
        let output = fnctl(dir.path(), &["config", "envs", "-e", "1BAD=x"]);
        assert_eq!(output.status.code(), Some(2));
        assert_eq!(func_yaml(&dir), before);
    }

    #[test]
    fn test_volumes_add_and_remove() {
        let dir = init(None);
        let output = fnctl(
            dir.path(),
            &["config", "volumes", "add", "--secret", "creds", "-m", "/etc/creds"],
        );
        assert!(output.status.success(), "volumes add failed: {:?}", output);

        let output = fnctl(dir.path(), &["config", "volumes", "list"]);
        assert!(stdout(&output).contains("secret creds at /etc/creds"));

        let output = fnctl(dir.path(), &["config", "volumes", "remove", "-m", "/etc/creds"]);
        assert!(output.status.success());
        let output = fnctl(dir.path(), &["config", "volumes", "remove", "-m", "/etc/creds"]);
        assert_eq!(output.status.code(), Some(4));
    }

    #[test]
    fn test_git_set_and_remove() {
        let dir = init(None);
        let output = fnctl(
            dir.path(),
            &["config", "git", "set", "-g", "https://example.com/hello.git#dev"],
        );
        assert!(output.status.success(), "git set failed: {:?}", output);
        let yaml = func_yaml(&dir);
        assert!(yaml.contains("url: https://example.com/hello.git"));
        assert!(yaml.contains("revision: dev"));

        let output = fnctl(dir.path(), &["config", "git", "remove"]);
        assert!(output.status.success());
        assert!(!func_yaml(&dir).contains("example.com"));
    }

    #[test]
    fn test_git_set_without_values_is_usage_error() {
        let dir = init(None);
        let output = fnctl(dir.path(), &["config", "git", "set"]);
        assert_eq!(output.status.code(), Some(64));
    }
}
