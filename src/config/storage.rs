//! Storage configuration.

use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;

/// Storage backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON files on local disk (development/single-node).
    #[default]
    File,
    /// `PostgreSQL` with JSONB documents.
    #[serde(rename = "postgresql")]
    PostgreSQL,
    /// Redis hashes and atomic counters.
    Redis,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::PostgreSQL => write!(f, "postgresql"),
            Self::Redis => write!(f, "redis"),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Storage backend type.
    #[serde(default)]
    pub backend: StorageBackend,

    /// File storage configuration.
    #[serde(default)]
    pub file: FileStorageConfig,

    /// `PostgreSQL` storage configuration.
    #[serde(default)]
    pub postgresql: PostgresStorageConfig,

    /// Redis storage configuration.
    #[serde(default)]
    pub redis: RedisStorageConfig,
}

impl StorageConfig {
    /// Validate the storage configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration fields are missing for the selected backend.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.backend {
            StorageBackend::File => Ok(()),
            StorageBackend::PostgreSQL => {
                if self.postgresql.url.is_empty() {
                    return Err(ConfigError::Message(
                        "storage.postgresql.url cannot be empty".to_string(),
                    ));
                }
                if self.postgresql.min_connections > self.postgresql.max_connections {
                    return Err(ConfigError::Message(
                        "storage.postgresql.min_connections cannot exceed max_connections"
                            .to_string(),
                    ));
                }
                Ok(())
            }
            StorageBackend::Redis => {
                if self.redis.url.is_empty() {
                    return Err(ConfigError::Message(
                        "storage.redis.url cannot be empty".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// File storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FileStorageConfig {
    /// Directory for storing data files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// `PostgreSQL` storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PostgresStorageConfig {
    /// `PostgreSQL` connection URL.
    #[serde(default)]
    pub url: String,

    /// Connection pool minimum size.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection pool maximum size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_connect_timeout() -> u64 {
    5
}

impl Default for PostgresStorageConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// Redis storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisStorageConfig {
    /// Redis URL.
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

const fn default_pool_size() -> usize {
    10
}

impl Default for RedisStorageConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_pool_size(),
            connect_timeout: default_connect_timeout(),
        }
    }
}
