//! Configuration management module.
//!
//! Supports loading configuration from:
//! - A `.env` file in the working directory
//! - TOML files (config/default.toml, config/{profile}.toml)
//! - Environment variables with `ADMITDESK__<SECTION>__<KEY>` pattern

mod server;
mod storage;

use std::collections::HashSet;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::domain::RollNamespace;

pub use server::ServerConfig;
pub use storage::{
    FileStorageConfig, PostgresStorageConfig, RedisStorageConfig, StorageBackend, StorageConfig,
};

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Roll-number allocation configuration.
    #[serde(default)]
    pub allocation: AllocationConfig,

    /// Competition intake configuration.
    #[serde(default)]
    pub competition: CompetitionConfig,

    /// Result publishing configuration.
    #[serde(default)]
    pub results: ResultsConfig,

    /// Upload limits.
    #[serde(default)]
    pub uploads: UploadConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from files and environment.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. `.env` (only populates the process environment)
    /// 2. `config/default.toml`
    /// 3. `config/{ADMITDESK_PROFILE}.toml` (if `ADMITDESK_PROFILE` is set)
    /// 4. Environment variables with `ADMITDESK__` prefix
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let profile =
            std::env::var("ADMITDESK_PROFILE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{profile}")).required(false))
            // ADMITDESK__SERVER__PORT=8080 -> server.port = 8080
            .add_source(
                Environment::with_prefix("ADMITDESK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: Self = config.try_deserialize()?;
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("server.port cannot be 0".to_string()));
        }

        self.storage.validate()?;
        self.allocation.validate()?;

        if self.competition.allowed_classes.is_empty() {
            return Err(ConfigError::Message(
                "competition.allowed_classes cannot be empty".to_string(),
            ));
        }

        if self.results.canonical_prefix.trim().is_empty() {
            return Err(ConfigError::Message(
                "results.canonical_prefix cannot be empty".to_string(),
            ));
        }

        if self.uploads.max_image_bytes == 0 {
            return Err(ConfigError::Message(
                "uploads.max_image_bytes cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Roll-number allocation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AllocationConfig {
    /// Attempts before a colliding allocation is reported as a conflict.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Namespace for competition applications.
    #[serde(default = "RollNamespace::competition")]
    pub competition: RollNamespace,

    /// Namespace for admissions.
    #[serde(default = "RollNamespace::admission")]
    pub admission: RollNamespace,
}

const fn default_max_attempts() -> u32 {
    10
}

impl AllocationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Message(
                "allocation.max_attempts cannot be 0".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for namespace in [&self.competition, &self.admission] {
            namespace
                .validate()
                .map_err(|e| ConfigError::Message(format!("allocation: {e}")))?;
            if !names.insert(namespace.name.as_str()) {
                return Err(ConfigError::Message(format!(
                    "allocation: namespace '{}' is configured twice",
                    namespace.name
                )));
            }
        }

        Ok(())
    }
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            competition: RollNamespace::competition(),
            admission: RollNamespace::admission(),
        }
    }
}

/// Competition intake configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CompetitionConfig {
    /// Exam date shown on admit cards.
    #[serde(default = "default_exam_date")]
    pub exam_date: String,

    /// Exam start time.
    #[serde(default = "default_exam_time")]
    pub exam_time: String,

    /// Reporting time.
    #[serde(default = "default_reporting_time")]
    pub reporting_time: String,

    /// Exam centre.
    #[serde(default = "default_exam_center")]
    pub exam_center: String,

    /// Oldest accepted applicant age in whole years.
    #[serde(default = "default_max_age")]
    pub max_age: u32,

    /// Accepted values of `classPassed` (compared case-insensitively).
    #[serde(default = "default_allowed_classes")]
    pub allowed_classes: Vec<String>,
}

fn default_exam_date() -> String {
    "20 October 2024".to_string()
}

fn default_exam_time() -> String {
    "8:00 AM".to_string()
}

fn default_reporting_time() -> String {
    "7:00 AM".to_string()
}

fn default_exam_center() -> String {
    "SK Modern Intermediate College, Semri, Jaunpur".to_string()
}

const fn default_max_age() -> u32 {
    20
}

fn default_allowed_classes() -> Vec<String> {
    [
        "8th",
        "9th",
        "10th",
        "11th",
        "12th",
        "Diploma",
        "Undergraduate",
        "Graduation",
        "Graduate",
        "Bachelors",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for CompetitionConfig {
    fn default() -> Self {
        Self {
            exam_date: default_exam_date(),
            exam_time: default_exam_time(),
            reporting_time: default_reporting_time(),
            exam_center: default_exam_center(),
            max_age: default_max_age(),
            allowed_classes: default_allowed_classes(),
        }
    }
}

/// Result publishing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultsConfig {
    /// Prefix every stored result roll number carries.
    #[serde(default = "default_canonical_prefix")]
    pub canonical_prefix: String,

    /// Prefixes rewritten to the canonical prefix on search.
    #[serde(default = "default_legacy_prefixes")]
    pub legacy_prefixes: Vec<String>,

    /// Message returned while nothing has been published.
    #[serde(default = "default_announcement")]
    pub announcement: String,

    /// Default size of the top-performers list.
    #[serde(default = "default_top_limit")]
    pub default_top_limit: usize,
}

fn default_canonical_prefix() -> String {
    "SK".to_string()
}

fn default_legacy_prefixes() -> Vec<String> {
    vec!["GK".to_string()]
}

fn default_announcement() -> String {
    "Results will be announced on 18th October at 12:00 PM. Please check back later.".to_string()
}

const fn default_top_limit() -> usize {
    10
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            canonical_prefix: default_canonical_prefix(),
            legacy_prefixes: default_legacy_prefixes(),
            announcement: default_announcement(),
            default_top_limit: default_top_limit(),
        }
    }
}

/// Upload limits.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Largest accepted image in bytes.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

const fn default_max_image_bytes() -> usize {
    5 * 1024 * 1024
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: "text" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Install the Prometheus recorder and serve it on `/metrics`.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

const fn default_metrics_enabled() -> bool {
    true
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}
