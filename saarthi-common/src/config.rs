//! Configuration loading and settings resolution
//!
//! Every setting resolves in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing config file at the default location is not an error: the service
//! logs a warning and starts on compiled defaults. A config file named
//! explicitly (flag or `SAARTHI_CONFIG`) must exist and parse.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const ENV_CONFIG: &str = "SAARTHI_CONFIG";
pub const ENV_BIND: &str = "SAARTHI_BIND";
pub const ENV_STORAGE_ROOT: &str = "SAARTHI_STORAGE_ROOT";
pub const ENV_LOG_LEVEL: &str = "SAARTHI_LOG_LEVEL";
pub const ENV_CLOUD_NAME: &str = "CLOUDINARY_CLOUD_NAME";
pub const ENV_API_KEY: &str = "CLOUDINARY_API_KEY";
pub const ENV_API_SECRET: &str = "CLOUDINARY_API_SECRET";

/// Contents of the TOML config file
///
/// Every field is optional; absent fields fall through to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Listen address, e.g. `127.0.0.1:8000`
    pub bind_addr: Option<String>,
    /// Root for all service state (uploads, published charts, registry)
    pub storage_root: Option<PathBuf>,
    /// Directory holding one sub-directory per session
    pub uploads_dir: Option<PathBuf>,
    /// Registry snapshot file
    pub registry_file: Option<PathBuf>,
    /// Directory served at `/assets` by the local publisher
    pub published_dir: Option<PathBuf>,
    /// Base URL clients use to reach this service
    pub public_base_url: Option<String>,
    pub max_upload_bytes: Option<u64>,
    pub preview_rows: Option<usize>,
    /// CORS origin allow-list
    pub cors_origins: Option<Vec<String>>,
    pub logging: LoggingConfig,
    pub publisher: PublisherConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Which asset publisher backend to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublisherBackend {
    /// Cloudinary when credentials are complete, local otherwise
    #[default]
    Auto,
    Cloudinary,
    Local,
}

/// `[publisher]` table
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub backend: PublisherBackend,
    pub cloud_name: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Upper bound for a single publish call
    pub timeout_secs: Option<u64>,
    /// Must match the account's signature algorithm setting
    pub signature_algorithm: SignatureAlgorithm,
}

/// Digest used to sign Cloudinary API requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureAlgorithm {
    /// Cloudinary's default for new and existing accounts
    #[default]
    Sha1,
    Sha256,
}

/// Credentials for the Cloudinary upload API
#[derive(Clone, PartialEq, Eq)]
pub struct CloudinaryCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub signature_algorithm: SignatureAlgorithm,
}

impl std::fmt::Debug for CloudinaryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryCredentials")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("signature_algorithm", &self.signature_algorithm)
            .finish()
    }
}

/// Publisher selection after resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPublisher {
    Cloudinary(CloudinaryCredentials),
    Local,
}

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub bind_addr: String,
    pub storage_root: PathBuf,
    pub max_upload_bytes: u64,
    pub preview_rows: usize,
    pub cors_origins: Vec<String>,
    pub publish_timeout_secs: u64,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            storage_root: default_storage_root(),
            max_upload_bytes: 100 * 1024 * 1024,
            preview_rows: 100,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            publish_timeout_secs: 30,
            log_level: default_log_level(),
        }
    }
}

/// OS-dependent default state folder
fn default_storage_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("saarthi"))
        .unwrap_or_else(|| PathBuf::from("./saarthi_data"))
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub storage_root: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Fully resolved service settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub storage_root: PathBuf,
    pub uploads_dir: PathBuf,
    pub registry_file: PathBuf,
    pub published_dir: PathBuf,
    pub public_base_url: String,
    pub max_upload_bytes: u64,
    pub preview_rows: usize,
    pub cors_origins: Vec<String>,
    pub logging: LoggingConfig,
    pub publisher: ResolvedPublisher,
    pub publish_timeout: Duration,
    /// Config file that was actually loaded, if any
    pub config_file: Option<PathBuf>,
}

impl Settings {
    /// Settings rooted at `storage_root` with every other value defaulted
    ///
    /// Uses the local publisher; intended for tests and embedding.
    pub fn with_storage_root(storage_root: impl Into<PathBuf>) -> Self {
        let defaults = CompiledDefaults::for_current_platform();
        let storage_root = storage_root.into();
        Self {
            public_base_url: format!("http://{}", defaults.bind_addr),
            bind_addr: defaults.bind_addr,
            uploads_dir: storage_root.join("uploads"),
            registry_file: storage_root.join("registry.json"),
            published_dir: storage_root.join("published"),
            storage_root,
            max_upload_bytes: defaults.max_upload_bytes,
            preview_rows: defaults.preview_rows,
            cors_origins: defaults.cors_origins,
            logging: LoggingConfig::default(),
            publisher: ResolvedPublisher::Local,
            publish_timeout: Duration::from_secs(defaults.publish_timeout_secs),
            config_file: None,
        }
    }
}

/// Resolves [`Settings`] from CLI, environment, TOML and defaults
pub struct SettingsResolver {
    cli: CliOverrides,
}

impl SettingsResolver {
    pub fn new(cli: CliOverrides) -> Self {
        Self { cli }
    }

    /// Locate the config file
    ///
    /// Returns `Ok(None)` when no file exists at the default locations.
    pub fn config_path(&self) -> Result<Option<PathBuf>> {
        // Priority 1/2: explicit path must exist
        let explicit = self
            .cli
            .config_path
            .clone()
            .or_else(|| env_nonempty(ENV_CONFIG).map(PathBuf::from));
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        // Priority 3: platform locations
        let user_config = dirs::config_dir().map(|d| d.join("saarthi").join("config.toml"));
        if let Some(path) = user_config {
            if path.exists() {
                return Ok(Some(path));
            }
        }
        let system_config = PathBuf::from("/etc/saarthi/config.toml");
        if cfg!(unix) && system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Resolve all settings
    pub fn resolve(&self) -> Result<Settings> {
        let config_file = self.config_path()?;
        let toml_config = match &config_file {
            Some(path) => {
                info!("Loading config file: {}", path.display());
                load_toml_config(path)?
            }
            None => {
                warn!("No config file found, using compiled defaults");
                TomlConfig::default()
            }
        };
        self.resolve_with(toml_config, config_file)
    }

    /// Resolve against an already-parsed TOML config
    pub fn resolve_with(
        &self,
        toml_config: TomlConfig,
        config_file: Option<PathBuf>,
    ) -> Result<Settings> {
        let defaults = CompiledDefaults::for_current_platform();

        let bind_addr = self
            .cli
            .bind_addr
            .clone()
            .or_else(|| env_nonempty(ENV_BIND))
            .or(toml_config.bind_addr)
            .unwrap_or(defaults.bind_addr);

        let storage_root = self
            .cli
            .storage_root
            .clone()
            .or_else(|| env_nonempty(ENV_STORAGE_ROOT).map(PathBuf::from))
            .or(toml_config.storage_root)
            .unwrap_or(defaults.storage_root);

        let uploads_dir = toml_config
            .uploads_dir
            .unwrap_or_else(|| storage_root.join("uploads"));
        let registry_file = toml_config
            .registry_file
            .unwrap_or_else(|| storage_root.join("registry.json"));
        let published_dir = toml_config
            .published_dir
            .unwrap_or_else(|| storage_root.join("published"));

        let public_base_url = toml_config
            .public_base_url
            .unwrap_or_else(|| format!("http://{}", bind_addr))
            .trim_end_matches('/')
            .to_string();

        let max_upload_bytes = toml_config
            .max_upload_bytes
            .unwrap_or(defaults.max_upload_bytes);
        if max_upload_bytes == 0 {
            return Err(Error::Config("max_upload_bytes must be positive".to_string()));
        }

        let preview_rows = toml_config.preview_rows.unwrap_or(defaults.preview_rows);
        let cors_origins = toml_config.cors_origins.unwrap_or(defaults.cors_origins);

        let mut logging = toml_config.logging;
        if let Some(level) = self
            .cli
            .log_level
            .clone()
            .or_else(|| env_nonempty(ENV_LOG_LEVEL))
        {
            logging.level = level;
        }

        let publish_timeout = Duration::from_secs(
            toml_config
                .publisher
                .timeout_secs
                .unwrap_or(defaults.publish_timeout_secs),
        );
        let publisher = resolve_publisher(&toml_config.publisher)?;

        Ok(Settings {
            bind_addr,
            storage_root,
            uploads_dir,
            registry_file,
            published_dir,
            public_base_url,
            max_upload_bytes,
            preview_rows,
            cors_origins,
            logging,
            publisher,
            publish_timeout,
            config_file,
        })
    }
}

/// Pick the publisher backend; environment credentials win over TOML
fn resolve_publisher(config: &PublisherConfig) -> Result<ResolvedPublisher> {
    let cloud_name = env_nonempty(ENV_CLOUD_NAME).or_else(|| config.cloud_name.clone());
    let api_key = env_nonempty(ENV_API_KEY).or_else(|| config.api_key.clone());
    let api_secret = env_nonempty(ENV_API_SECRET).or_else(|| config.api_secret.clone());

    let credentials = match (cloud_name, api_key, api_secret) {
        (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryCredentials {
            cloud_name,
            api_key,
            api_secret,
            signature_algorithm: config.signature_algorithm,
        }),
        _ => None,
    };

    match (config.backend, credentials) {
        (PublisherBackend::Local, _) => Ok(ResolvedPublisher::Local),
        (_, Some(credentials)) => Ok(ResolvedPublisher::Cloudinary(credentials)),
        (PublisherBackend::Cloudinary, None) => Err(Error::Config(format!(
            "Cloudinary publisher selected but credentials are incomplete. Set {}, {} and {} \
             or the [publisher] cloud_name/api_key/api_secret keys.",
            ENV_CLOUD_NAME, ENV_API_KEY, ENV_API_SECRET
        ))),
        (PublisherBackend::Auto, None) => Ok(ResolvedPublisher::Local),
    }
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)?;
    Ok(config)
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
