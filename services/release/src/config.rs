use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Configuration validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingField(String),

    #[error("Invalid configuration value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Main configuration for the release service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// S3 configuration
    #[serde(default)]
    pub s3: S3Config,
    /// Release index page configuration
    #[serde(default)]
    pub index: IndexConfig,
    /// Promotion configuration
    #[serde(default)]
    pub promotion: PromotionConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format (json, pretty)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// S3 bucket configuration
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// Bucket holding release artifacts and manifests
    #[serde(default)]
    pub bucket: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
    /// Public URL objects are served from, without the bucket
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

/// Release index page configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Comma-separated listing prefixes, one page section each
    #[serde(default)]
    pub prefixes: String,
    /// Artifact suffix filter
    #[serde(default)]
    pub suffix: String,
    /// Releases shown per section (0 = unbounded)
    #[serde(default = "default_max_releases")]
    pub max_releases: usize,
    /// Output path for the rendered page
    #[serde(default)]
    pub output_path: String,
    /// URL prefix commit hashes are appended to
    #[serde(default = "default_commit_url_prefix")]
    pub commit_url_prefix: String,
}

/// Promotion configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PromotionConfig {
    /// Minimum release age before promotion, in hours
    #[serde(default = "default_delay_hours")]
    pub delay_hours: u64,
    /// Releases must be built before this hour (US Eastern, 0-23)
    #[serde(default = "default_cutoff_hour")]
    pub cutoff_hour: u32,
    /// Environment name used in manifest keys
    #[serde(default = "default_env")]
    pub env: String,
    /// Optional update channel
    #[serde(default)]
    pub channel: Option<String>,
    /// Guard the manifest write with the storage backend's conditional copy
    #[serde(default)]
    pub conditional_write: bool,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_public_base_url() -> String {
    "https://s3.amazonaws.com".to_string()
}

fn default_max_releases() -> usize {
    20
}

fn default_commit_url_prefix() -> String {
    "https://github.com/keybase/client/commit/".to_string()
}

fn default_delay_hours() -> u64 {
    24
}

fn default_cutoff_hour() -> u32 {
    23
}

fn default_env() -> String {
    "prod".to_string()
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/release").required(false))
            .add_source(config::File::with_name("/etc/release/release").required(false))
            // RELEASE__S3__BUCKET -> s3.bucket
            .add_source(
                config::Environment::with_prefix("RELEASE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }

    /// Validate the loaded configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.s3.bucket.is_empty() {
            return Err(ConfigValidationError::MissingField("s3.bucket".to_string()));
        }

        if self.promotion.cutoff_hour > 23 {
            return Err(ConfigValidationError::InvalidValue {
                field: "promotion.cutoff_hour".to_string(),
                message: format!("{} is not an hour of the day (0-23)", self.promotion.cutoff_hour),
            });
        }

        if self.promotion.env.is_empty() {
            return Err(ConfigValidationError::MissingField("promotion.env".to_string()));
        }

        match self.service.log_format.as_str() {
            "json" | "pretty" => Ok(()),
            other => Err(ConfigValidationError::InvalidValue {
                field: "service.log_format".to_string(),
                message: format!("unknown format {:?}, expected json or pretty", other),
            }),
        }
    }

    /// Get promotion delay as Duration
    pub fn promotion_delay(&self) -> Duration {
        Duration::from_secs(self.promotion.delay_hours * 3600)
    }
}

impl IndexConfig {
    /// Listing prefixes, in configured order
    pub fn prefix_list(&self) -> Vec<String> {
        split_prefixes(&self.prefixes)
    }
}

/// Split a comma-separated prefix list, dropping empty entries
pub fn split_prefixes(prefixes: &str) -> Vec<String> {
    prefixes
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: default_region(),
            endpoint_url: None,
            force_path_style: false,
            public_base_url: default_public_base_url(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            prefixes: String::new(),
            suffix: String::new(),
            max_releases: default_max_releases(),
            output_path: String::new(),
            commit_url_prefix: default_commit_url_prefix(),
        }
    }
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            delay_hours: default_delay_hours(),
            cutoff_hour: default_cutoff_hour(),
            env: default_env(),
            channel: None,
            conditional_write: false,
        }
    }
}
