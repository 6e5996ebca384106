//! Settings resolution tests
//!
//! Covers the CLI → environment → TOML → default priority order, graceful
//! handling of missing config files and publisher backend selection.
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Every test that reads or writes SAARTHI_* / CLOUDINARY_* variables is
//! marked #[serial].

use saarthi_common::config::{
    CliOverrides, CompiledDefaults, PublisherBackend, ResolvedPublisher, SettingsResolver,
    SignatureAlgorithm, TomlConfig, ENV_API_KEY, ENV_API_SECRET, ENV_BIND, ENV_CLOUD_NAME, ENV_CONFIG,
    ENV_LOG_LEVEL, ENV_STORAGE_ROOT,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_env() {
    for name in [
        ENV_CONFIG,
        ENV_BIND,
        ENV_STORAGE_ROOT,
        ENV_LOG_LEVEL,
        ENV_CLOUD_NAME,
        ENV_API_KEY,
        ENV_API_SECRET,
    ] {
        env::remove_var(name);
    }
}

#[test]
#[serial]
fn defaults_apply_without_any_overrides() {
    clear_env();

    let resolver = SettingsResolver::new(CliOverrides::default());
    let settings = resolver
        .resolve_with(TomlConfig::default(), None)
        .unwrap();

    let defaults = CompiledDefaults::for_current_platform();
    assert_eq!(settings.bind_addr, defaults.bind_addr);
    assert_eq!(settings.storage_root, defaults.storage_root);
    assert_eq!(settings.uploads_dir, defaults.storage_root.join("uploads"));
    assert_eq!(settings.preview_rows, 100);
    assert_eq!(settings.public_base_url, format!("http://{}", defaults.bind_addr));
    assert_eq!(settings.publisher, ResolvedPublisher::Local);
}

#[test]
#[serial]
fn cli_beats_env_beats_toml() {
    clear_env();
    env::set_var(ENV_BIND, "127.0.0.1:7001");
    env::set_var(ENV_STORAGE_ROOT, "/tmp/saarthi-env-root");

    let toml_config = TomlConfig {
        bind_addr: Some("127.0.0.1:7002".to_string()),
        storage_root: Some(PathBuf::from("/tmp/saarthi-toml-root")),
        ..TomlConfig::default()
    };

    let cli = CliOverrides {
        bind_addr: Some("127.0.0.1:7000".to_string()),
        ..CliOverrides::default()
    };
    let settings = SettingsResolver::new(cli)
        .resolve_with(toml_config.clone(), None)
        .unwrap();

    // CLI wins for bind, env wins for storage root
    assert_eq!(settings.bind_addr, "127.0.0.1:7000");
    assert_eq!(settings.storage_root, PathBuf::from("/tmp/saarthi-env-root"));

    env::remove_var(ENV_STORAGE_ROOT);
    env::remove_var(ENV_BIND);
    let settings = SettingsResolver::new(CliOverrides::default())
        .resolve_with(toml_config, None)
        .unwrap();
    assert_eq!(settings.bind_addr, "127.0.0.1:7002");
    assert_eq!(settings.storage_root, PathBuf::from("/tmp/saarthi-toml-root"));

    clear_env();
}

#[test]
#[serial]
fn explicit_missing_config_file_is_an_error() {
    clear_env();

    let cli = CliOverrides {
        config_path: Some(PathBuf::from("/nonexistent/saarthi/config.toml")),
        ..CliOverrides::default()
    };
    let result = SettingsResolver::new(cli).resolve();
    assert!(result.is_err(), "Explicit config path must exist");
}

#[test]
#[serial]
fn config_file_from_env_is_loaded() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        preview_rows = 10
        max_upload_bytes = 2048
        cors_origins = ["http://example.test"]

        [logging]
        level = "debug"
        "#,
    )
    .unwrap();
    env::set_var(ENV_CONFIG, &path);

    let settings = SettingsResolver::new(CliOverrides::default())
        .resolve()
        .unwrap();

    assert_eq!(settings.config_file.as_deref(), Some(path.as_path()));
    assert_eq!(settings.preview_rows, 10);
    assert_eq!(settings.max_upload_bytes, 2048);
    assert_eq!(settings.cors_origins, vec!["http://example.test".to_string()]);
    assert_eq!(settings.logging.level, "debug");

    clear_env();
}

#[test]
#[serial]
fn env_log_level_overrides_toml() {
    clear_env();
    env::set_var(ENV_LOG_LEVEL, "trace");

    let settings = SettingsResolver::new(CliOverrides::default())
        .resolve_with(TomlConfig::default(), None)
        .unwrap();
    assert_eq!(settings.logging.level, "trace");

    clear_env();
}

#[test]
#[serial]
fn auto_backend_uses_cloudinary_when_credentials_complete() {
    clear_env();
    env::set_var(ENV_CLOUD_NAME, "demo");
    env::set_var(ENV_API_KEY, "key");
    env::set_var(ENV_API_SECRET, "secret");

    let settings = SettingsResolver::new(CliOverrides::default())
        .resolve_with(TomlConfig::default(), None)
        .unwrap();

    match settings.publisher {
        ResolvedPublisher::Cloudinary(creds) => {
            assert_eq!(creds.cloud_name, "demo");
            assert_eq!(creds.api_key, "key");
            assert_eq!(creds.signature_algorithm, SignatureAlgorithm::Sha1);
        }
        other => panic!("Expected Cloudinary publisher, got {:?}", other),
    }

    clear_env();
}

#[test]
#[serial]
fn configured_signature_algorithm_reaches_credentials() {
    clear_env();
    env::set_var(ENV_CLOUD_NAME, "demo");
    env::set_var(ENV_API_KEY, "key");
    env::set_var(ENV_API_SECRET, "secret");

    let mut toml_config = TomlConfig::default();
    toml_config.publisher.signature_algorithm = SignatureAlgorithm::Sha256;

    let settings = SettingsResolver::new(CliOverrides::default())
        .resolve_with(toml_config, None)
        .unwrap();

    match settings.publisher {
        ResolvedPublisher::Cloudinary(creds) => {
            assert_eq!(creds.signature_algorithm, SignatureAlgorithm::Sha256);
        }
        other => panic!("Expected Cloudinary publisher, got {:?}", other),
    }

    clear_env();
}

#[test]
#[serial]
fn explicit_cloudinary_without_credentials_fails() {
    clear_env();

    let mut toml_config = TomlConfig::default();
    toml_config.publisher.backend = PublisherBackend::Cloudinary;
    toml_config.publisher.cloud_name = Some("demo".to_string());

    let result = SettingsResolver::new(CliOverrides::default()).resolve_with(toml_config, None);
    assert!(result.is_err());
}

#[test]
#[serial]
fn local_backend_ignores_credentials() {
    clear_env();
    env::set_var(ENV_CLOUD_NAME, "demo");
    env::set_var(ENV_API_KEY, "key");
    env::set_var(ENV_API_SECRET, "secret");

    let mut toml_config = TomlConfig::default();
    toml_config.publisher.backend = PublisherBackend::Local;

    let settings = SettingsResolver::new(CliOverrides::default())
        .resolve_with(toml_config, None)
        .unwrap();
    assert_eq!(settings.publisher, ResolvedPublisher::Local);

    clear_env();
}

#[test]
#[serial]
fn zero_upload_limit_is_rejected() {
    clear_env();
    let toml_config = TomlConfig {
        max_upload_bytes: Some(0),
        ..TomlConfig::default()
    };
    assert!(SettingsResolver::new(CliOverrides::default())
        .resolve_with(toml_config, None)
        .is_err());
}
