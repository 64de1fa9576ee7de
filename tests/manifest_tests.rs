//! Manifest loading through to a resolved deployment

mod common;

use common::{project, strings};
use remote_deploy::config::{locate_and_load, parse_manifest, resolve, ManifestFormat};
use remote_deploy::deploy::Deployer;
use remote_deploy::env::{MapEnv, ScriptedPrompt};
use remote_deploy::observer::RecordingObserver;
use remote_deploy::transport::{MemoryCommandTransport, MemoryFileTransport};
use std::fs;
use std::path::PathBuf;

#[test]
fn test_yaml_manifest_resolves_with_defaults() {
    let dir = tempfile::TempDir::new().unwrap();
    fs::write(
        dir.path().join("deploy.yaml"),
        r#"
remote:
  host: web-1.example.org
  username: deploy
  port: 2222
clearFolders: [cache]
deletePaths:
  files: [maintenance.html]
upload:
  - index.html
commands:
  - php artisan migrate --force
envFields: [APP_KEY, DB_HOST]
"#,
    )
    .unwrap();

    let (path, manifest) = locate_and_load(None, dir.path()).unwrap();
    assert_eq!(path, dir.path().join("deploy.yaml"));
    let remote = manifest.remote.clone().unwrap();
    assert_eq!(remote.destination(), "deploy@web-1.example.org");
    assert_eq!(remote.port, 2222);

    let plan = resolve(&manifest.options, dir.path().to_path_buf());
    assert_eq!(plan.root_dir, dir.path().to_path_buf());
    assert_eq!(plan.remote_dir, "/var/www/html");
    assert_eq!(plan.clear_folders, strings(&["cache"]));
    assert_eq!(plan.delete_paths.files, strings(&["maintenance.html"]));
    assert!(plan.delete_paths.dirs.is_empty());
    assert_eq!(plan.commands, strings(&["php artisan migrate --force"]));
    assert!(!plan.mode.only_update_env);
}

#[test]
fn test_json_manifest_tolerates_malformed_fields() {
    let dir = tempfile::TempDir::new().unwrap();
    let manifest_path = dir.path().join("site.json");
    fs::write(
        &manifest_path,
        r#"{
            "remoteDir": "/srv/site",
            "ensureFolders": "logs",
            "clearFolders": 12,
            "skipPostCommands": "sometimes",
            "deletePaths": { "dirs": ["tmp", false] }
        }"#,
    )
    .unwrap();

    let (_, manifest) = locate_and_load(Some(&manifest_path), dir.path()).unwrap();
    assert!(manifest.remote.is_none());

    let plan = resolve(&manifest.options, PathBuf::from("/work"));
    assert_eq!(plan.remote_dir, "/srv/site");
    assert_eq!(plan.ensure_folders, strings(&["logs"]));
    assert!(plan.clear_folders.is_empty());
    assert!(!plan.mode.skip_post_commands);
    assert_eq!(plan.delete_paths.dirs, strings(&["tmp"]));
}

#[test]
fn test_malformed_root_dir_falls_back_to_working_directory() {
    let manifest = parse_manifest(r#"{"rootDir": 42, "upload": ["a"]}"#, ManifestFormat::Json)
        .unwrap();
    assert_eq!(manifest.options.root_dir, None);

    let plan = resolve(&manifest.options, PathBuf::from("/work"));
    assert_eq!(plan.root_dir, PathBuf::from("/work"));
    assert_eq!(plan.upload, strings(&["a"]));

    let manifest = parse_manifest("rootDir: [1, 2]\nremoteDir: /srv\n", ManifestFormat::Yaml)
        .unwrap();
    assert_eq!(manifest.options.root_dir, None);
    assert_eq!(manifest.options.remote_dir.as_deref(), Some("/srv"));
}

#[tokio::test]
async fn test_manifest_driven_run() {
    let project = project();
    fs::write(
        project.path().join("deploy.json"),
        r#"{
            "remoteDir": "/srv/site",
            "ensureFolders": ["storage/logs"],
            "upload": ["index.html", "assets/app.js"],
            "envFields": ["APP_ENV"],
            "envFile": ".env.production",
            "commands": ["systemctl reload nginx"]
        }"#,
    )
    .unwrap();

    let (_, manifest) = locate_and_load(None, project.path()).unwrap();
    let plan = resolve(&manifest.options, project.path().to_path_buf());

    let mut file = MemoryFileTransport::new();
    let mut commands = MemoryCommandTransport::new();
    let env = MapEnv::from([("PROD_APP_ENV", "production"), ("APP_ENV", "local")]);
    let prompt = ScriptedPrompt::new();
    let observer = RecordingObserver::new();

    let report = Deployer::new(plan, &mut file, &env, &prompt, &observer)
        .with_command_transport(&mut commands)
        .run()
        .await
        .unwrap();

    assert_eq!(report.env_file, ".env.production");
    assert!(file.dir_exists("/srv/site/storage/logs"));
    assert_eq!(
        file.file_contents("/srv/site/assets/app.js").as_deref(),
        Some("console.log(1)")
    );
    assert_eq!(
        file.file_contents("/srv/site/.env.production").as_deref(),
        Some("APP_ENV=production")
    );
    assert!(report.failed_commands().is_empty());
}
