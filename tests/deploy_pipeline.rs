use std::path::{Path, PathBuf};
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stagehand::config::Config;
use stagehand::deploy::{Deployer, ProcessSupervisor, Stage};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Local git repository with the given files committed, cloneable by path.
async fn git_repo(root: &Path, files: &[(&str, &[u8])]) -> PathBuf {
    let repo = root.join("origin");
    std::fs::create_dir_all(&repo).unwrap();

    for (rel, contents) in files {
        let full = repo.join(rel);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, contents).unwrap();
    }

    for args in [
        vec!["init", "-q"],
        vec!["config", "user.email", "ci@test"],
        vec!["config", "user.name", "ci"],
        vec!["add", "-f", "."],
        vec!["commit", "-q", "-m", "init"],
    ] {
        let status = tokio::process::Command::new("git")
            .args(&args)
            .current_dir(&repo)
            .status()
            .await
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    repo
}

/// Fake JVM home whose `bin/java` runs the given script body.
fn fake_java(root: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let home = root.join("jvm");
    std::fs::create_dir_all(home.join("bin")).unwrap();
    let bin = home.join("bin/java");
    std::fs::write(&bin, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
    home
}

/// Serve the deploy key for the default secret name.
async fn mount_deploy_key(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/secrets/eu-north-1/java-app-ssh-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "java-app-ssh-key",
            "value": "FAKE DEPLOY KEY",
        })))
        .mount(server)
        .await;
}

fn test_config(server: &MockServer, root: &Path, repo_url: String, java_home: Option<PathBuf>) -> Config {
    Config {
        repo_url,
        target_dir: root.join("app"),
        port: 9000,
        daemon: false,
        build: false,
        secret_name: "java-app-ssh-key".into(),
        region: "eu-north-1".into(),
        secrets_endpoint: server.uri(),
        secrets_token: Some("test-token".into()),
        ssh_dir: root.join(".ssh"),
        java_home,
    }
}

fn quick_supervisor() -> ProcessSupervisor {
    ProcessSupervisor::with_timing(Duration::from_millis(300), Duration::from_secs(2))
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn prebuilt_artifact_deploys_to_supervising() {
    let tmp = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    mount_deploy_key(&server).await;

    let repo = git_repo(tmp.path(), &[("build/libs/project.jar", b"JARBYTES".as_slice())]).await;
    let java_home = fake_java(tmp.path(), "sleep 30");

    let cfg = test_config(
        &server,
        tmp.path(),
        repo.to_string_lossy().into_owned(),
        Some(java_home),
    );
    let deployer = Deployer::new(cfg.clone(), quick_supervisor());

    let pid = deployer.run().await.unwrap();
    assert!(pid > 0);
    assert_eq!(deployer.supervisor().pid().await, Some(pid));

    // Key installed with owner-only permissions as part of the pipeline.
    assert!(cfg.ssh_dir.join("deploy_key").exists());
    assert!(cfg.target_dir.join("build/libs/project.jar").exists());

    assert!(deployer.supervisor().terminate().await);
}

#[tokio::test]
async fn missing_secret_aborts_before_staging() {
    let tmp = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({ "error": "not found" })),
        )
        .mount(&server)
        .await;

    let cfg = test_config(&server, tmp.path(), "git@github.com:acme/app.git".into(), None);
    let deployer = Deployer::new(cfg.clone(), quick_supervisor());

    let err = deployer.run().await.unwrap_err();
    assert_eq!(err.stage(), Stage::Credential);
    assert!(!cfg.target_dir.exists(), "nothing may be staged");
    assert_eq!(deployer.supervisor().pid().await, None);
}

#[tokio::test]
async fn missing_artifact_aborts_before_launch() {
    let tmp = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    mount_deploy_key(&server).await;

    // Clones fine, but there is no artifact at build/libs/project.jar.
    let repo = git_repo(tmp.path(), &[("README.md", b"docs".as_slice())]).await;
    let java_home = fake_java(tmp.path(), "sleep 30");

    let cfg = test_config(
        &server,
        tmp.path(),
        repo.to_string_lossy().into_owned(),
        Some(java_home),
    );
    let deployer = Deployer::new(cfg.clone(), quick_supervisor());

    let err = deployer.run().await.unwrap_err();
    assert_eq!(err.stage(), Stage::Verify);
    assert!(cfg.target_dir.join("README.md").exists(), "staging did happen");
    assert_eq!(deployer.supervisor().pid().await, None, "no process launched");
}

#[tokio::test]
async fn staging_replaces_preexisting_target_content() {
    let tmp = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    mount_deploy_key(&server).await;

    let repo = git_repo(tmp.path(), &[("build/libs/project.jar", b"JAR".as_slice())]).await;
    let java_home = fake_java(tmp.path(), "sleep 30");

    let cfg = test_config(
        &server,
        tmp.path(),
        repo.to_string_lossy().into_owned(),
        Some(java_home),
    );
    std::fs::create_dir_all(cfg.target_dir.join("leftover")).unwrap();
    std::fs::write(cfg.target_dir.join("leftover/stale.txt"), "old").unwrap();

    let deployer = Deployer::new(cfg.clone(), quick_supervisor());
    deployer.run().await.unwrap();

    assert!(!cfg.target_dir.join("leftover").exists(), "prior content fully gone");
    deployer.supervisor().terminate().await;
}

#[tokio::test]
async fn early_exit_during_grace_window_fails_launch() {
    let tmp = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    mount_deploy_key(&server).await;

    let repo = git_repo(tmp.path(), &[("build/libs/project.jar", b"JAR".as_slice())]).await;
    let java_home = fake_java(tmp.path(), "echo 'port 9000 unavailable' >&2; exit 1");

    let cfg = test_config(
        &server,
        tmp.path(),
        repo.to_string_lossy().into_owned(),
        Some(java_home),
    );
    let deployer = Deployer::new(cfg, quick_supervisor());

    let err = deployer.run().await.unwrap_err();
    assert_eq!(err.stage(), Stage::Launch);
    assert!(err.to_string().contains("port 9000 unavailable"));
    assert_eq!(deployer.supervisor().pid().await, None);

    // Cleanup path after a failed launch must still be a safe no-op.
    assert!(!deployer.supervisor().terminate().await);
}

#[tokio::test]
async fn build_variant_runs_wrapper_before_verification() {
    let tmp = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    mount_deploy_key(&server).await;

    // gradlew produces the artifact the verifier expects.
    let gradlew = "#!/bin/sh\nmkdir -p build/libs\nprintf JAR > build/libs/project.jar\n";
    let repo = git_repo(tmp.path(), &[("gradlew", gradlew.as_bytes())]).await;
    let java_home = fake_java(tmp.path(), "case \"$1\" in -version) exit 0;; esac\nsleep 30");

    let mut cfg = test_config(
        &server,
        tmp.path(),
        repo.to_string_lossy().into_owned(),
        Some(java_home),
    );
    cfg.build = true;

    let deployer = Deployer::new(cfg.clone(), quick_supervisor());
    let pid = deployer.run().await.unwrap();

    assert!(pid > 0);
    assert!(cfg.target_dir.join("build/libs/project.jar").exists());
    deployer.supervisor().terminate().await;
}

#[tokio::test]
async fn failing_build_aborts_at_build_stage() {
    let tmp = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    mount_deploy_key(&server).await;

    let gradlew = "#!/bin/sh\necho 'compilation failed' >&2\nexit 1\n";
    let repo = git_repo(tmp.path(), &[("gradlew", gradlew.as_bytes())]).await;
    let java_home = fake_java(tmp.path(), "exit 0");

    let mut cfg = test_config(
        &server,
        tmp.path(),
        repo.to_string_lossy().into_owned(),
        Some(java_home),
    );
    cfg.build = true;

    let deployer = Deployer::new(cfg, quick_supervisor());
    let err = deployer.run().await.unwrap_err();

    assert_eq!(err.stage(), Stage::Build);
    assert!(err.to_string().contains("compilation failed"));
    assert_eq!(deployer.supervisor().pid().await, None);
}
