//! Command flows against a scratch configuration file

use clap::Parser;
use connstr_cli::{execute, resolve_settings, Cli};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use webconfig_engine::AesGcmProtectionProvider;

const WEB_CONFIG: &str = "<?xml version='1.0' encoding='utf-8'?>
<configuration>
  <connectionStrings>
    <add name='Main' connectionString='Data Source=db01;Initial Catalog=Main;User ID=app;Password=hunter2' providerName='System.Data.SqlClient' />
  </connectionStrings>
</configuration>
";

struct Workspace {
    dir: TempDir,
    web_config: PathBuf,
    settings: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let web_config = dir.path().join("Web.config");
        fs::write(&web_config, WEB_CONFIG).unwrap();

        let temp_dir = dir.path().join("tmp");
        fs::create_dir(&temp_dir).unwrap();
        let settings = dir.path().join("connstr.toml");
        fs::write(
            &settings,
            format!(
                "temp_dir = {:?}\nprotection_key = {:?}\n",
                temp_dir.display().to_string(),
                AesGcmProtectionProvider::generate_key_base64()
            ),
        )
        .unwrap();

        Self { dir, web_config, settings }
    }

    fn run(&self, args: &[&str]) -> String {
        let mut argv = vec![
            "connstr".to_string(),
            "--config".to_string(),
            path_arg(&self.settings),
            "--web-config".to_string(),
            path_arg(&self.web_config),
        ];
        argv.extend(args.iter().map(|arg| (*arg).to_string()));

        colored::control::set_override(false);
        let cli = Cli::try_parse_from(argv).unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let mut out = Vec::new();
        assert!(runtime.block_on(execute(&cli, &mut out)).unwrap());
        String::from_utf8(out).unwrap()
    }

    fn contents(&self) -> String {
        fs::read_to_string(&self.web_config).unwrap()
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

#[test]
fn test_list_masks_passwords() {
    let workspace = Workspace::new();
    let out = workspace.run(&["list"]);
    assert!(out.contains("Main"));
    assert!(out.contains("System.Data.SqlClient"));
    assert!(!out.contains("hunter2"));
}

#[test]
fn test_add_then_encrypt_then_decrypt() {
    let workspace = Workspace::new();

    let out = workspace.run(&[
        "add",
        "--entry",
        "Main=Data Source=elsewhere",
        "--entry",
        "Reports=Data Source=db02;Initial Catalog=Reports",
    ]);
    assert!(out.contains("Added 1 connection string(s), 1 already present"));
    assert!(workspace.contents().contains("Initial Catalog=Reports"));
    assert!(!workspace.contents().contains("elsewhere"));

    let out = workspace.run(&["encrypt"]);
    assert!(out.contains("now encrypted"));
    assert!(!workspace.contents().contains("hunter2"));

    let out = workspace.run(&["encrypt"]);
    assert!(out.contains("already encrypted"));

    // Unset --encrypt keeps the section protected
    workspace.run(&["add", "--entry", "Audit=Data Source=db03"]);
    assert!(!workspace.contents().contains("db03"));
    let listed = workspace.run(&["list"]);
    assert!(listed.contains("Audit"));
    assert!(listed.contains("Reports"));

    let out = workspace.run(&["decrypt"]);
    assert!(out.contains("now decrypted"));
    assert!(workspace.contents().contains("db03"));
}

#[test]
fn test_add_with_encrypt_flag() {
    let workspace = Workspace::new();
    let out = workspace.run(&["add", "--entry", "Reports=Data Source=db02", "--encrypt", "true"]);
    assert!(out.contains("Section is now encrypted"));
    assert!(workspace.contents().contains("CipherValue"));
}

#[test]
fn test_web_config_flag_overrides_settings() {
    let workspace = Workspace::new();
    let other = workspace.dir.path().join("Other.config");
    let cli = Cli::try_parse_from([
        "connstr".to_string(),
        "--config".to_string(),
        path_arg(&workspace.settings),
        "--web-config".to_string(),
        path_arg(&other),
        "list".to_string(),
    ])
    .unwrap();
    let settings = resolve_settings(&cli).unwrap();
    assert_eq!(settings.config_path, other);
    assert!(settings.protection_key.is_some());
}
