//! Settings structs and loading logic.
//!
//! All settings have sensible defaults and can be overridden via
//! environment variables or configuration files.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Upstream node connection settings.
    pub node: NodeSettings,
    /// Database configuration.
    pub database: DatabaseSettings,
    /// API server configuration.
    pub api: ApiSettings,
    /// In-memory prefetch cache configuration.
    pub cache: CacheSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Metrics configuration.
    pub metrics: MetricsSettings,
    /// Ingestion engine tuning.
    pub ingestion: IngestionSettings,
}

impl Settings {
    /// Load settings from configuration files and environment variables.
    ///
    /// Files are loaded in this order (later overrides earlier):
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (if exists)
    /// 3. Environment variables with the `CHAIN_INDEXER__` prefix
    ///
    /// # Arguments
    /// * `environment` - Environment name (e.g., "development", "production")
    ///
    /// # Errors
    /// Returns `ConfigError` if configuration is invalid or cannot be loaded.
    pub fn load(environment: &str) -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".into());

        let builder = Config::builder()
            .set_default("node.api_url", "http://localhost:3413/v2/owner")?
            .set_default("node.api_username", "grin")?
            .set_default("node.api_password", "")?
            .set_default("node.connect_timeout_ms", 5_000)?
            .set_default("node.read_timeout_ms", 60_000)?
            .set_default("node.archive", false)?
            .set_default("database.url", "postgres://localhost/chain_indexer")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout_ms", 5_000)?
            .set_default("database.idle_timeout_ms", 600_000)?
            .set_default("api.host", "0.0.0.0")?
            .set_default("api.port", 8080)?
            .set_default("api.request_timeout_ms", 30_000)?
            .set_default("cache.window_size", 1000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("logging.file_path", Option::<String>::None)?
            .set_default("metrics.enabled", true)?
            .set_default("metrics.host", "0.0.0.0")?
            .set_default("metrics.port", 9090)?
            .set_default("ingestion.significant_reorg_threshold", 2)?
            .set_default("ingestion.reorg_detection_height_cap", 1000)?
            .set_default("ingestion.reorg_check_disable_after", 1000)?
            .set_default("ingestion.progress_report_interval_secs", 60)?
            // Load default configuration file
            .add_source(File::with_name(&format!("{config_dir}/default")).required(false))
            // Load environment-specific file
            .add_source(File::with_name(&format!("{config_dir}/{environment}")).required(false))
            // Override with environment variables (CHAIN_INDEXER_ prefix)
            .add_source(
                Environment::with_prefix("CHAIN_INDEXER")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Load settings from a specific file path.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }

    /// Validate settings and return any validation errors.
    ///
    /// # Errors
    /// Returns a list of validation error messages.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.node.api_url.is_empty() {
            errors.push("node.api_url cannot be empty".into());
        }
        if self.node.connect_timeout_ms == 0 {
            errors.push("node.connect_timeout_ms must be non-zero".into());
        }
        if self.node.read_timeout_ms == 0 {
            errors.push("node.read_timeout_ms must be non-zero".into());
        }

        if self.database.url.is_empty() {
            errors.push("database.url cannot be empty".into());
        }
        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be non-zero".into());
        }
        if self.database.min_connections > self.database.max_connections {
            errors.push("database.min_connections cannot exceed max_connections".into());
        }

        if self.api.port == 0 {
            errors.push("api.port must be non-zero".into());
        }

        if self.cache.window_size == 0 {
            errors.push("cache.window_size must be non-zero".into());
        }
        if self.cache.window_size > 1000 {
            errors.push("cache.window_size cannot exceed the node's own get_blocks limit (1000)".into());
        }

        if self.ingestion.significant_reorg_threshold == 0 {
            errors.push("ingestion.significant_reorg_threshold must be non-zero".into());
        }
        if self.ingestion.reorg_detection_height_cap == 0 {
            errors.push("ingestion.reorg_detection_height_cap must be non-zero".into());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Upstream node connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSettings {
    /// JSON-RPC 2.0 base URL.
    pub api_url: String,
    /// HTTP Basic auth username.
    pub api_username: String,
    /// HTTP Basic auth password.
    pub api_password: String,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Read timeout in milliseconds (the node's compaction can stall reads).
    pub read_timeout_ms: u64,
    /// Whether this node retains full history.
    pub archive: bool,
}

impl NodeSettings {
    /// Get the connect timeout as a `Duration`.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Get the read timeout as a `Duration`.
    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum connections in the pool.
    pub max_connections: u32,
    /// Minimum connections to maintain.
    pub min_connections: u32,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Idle connection timeout in milliseconds.
    pub idle_timeout_ms: u64,
}

impl DatabaseSettings {
    /// Get the connection timeout as a `Duration`.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Get the idle timeout as a `Duration`.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// API server configuration (the three thin entry points plus health/metrics).
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl ApiSettings {
    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Get the socket address string.
    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Prefetch cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Size of the prefetch window fetched on a cache miss
    /// (`get_blocks(max(0, h - (window_size - 1)), h, window_size)`).
    pub window_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log format (json, pretty).
    pub format: String,
    /// Optional file path for log output.
    pub file_path: Option<String>,
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// Whether metrics are enabled.
    pub enabled: bool,
    /// Host to bind metrics server to.
    pub host: String,
    /// Port for metrics server.
    pub port: u16,
}

impl MetricsSettings {
    /// Get the metrics socket address string.
    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Ingestion engine tuning parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestionSettings {
    /// Reorgs shorter than this many blocks are still recorded but hidden
    /// from "significant reorgs" listings.
    pub significant_reorg_threshold: u32,
    /// Heights fetched during a single reorg-detection walk before giving up.
    pub reorg_detection_height_cap: u32,
    /// After this many checked missing heights during bootstrap, further
    /// reorg checks are disabled for the remainder of the run.
    pub reorg_check_disable_after: u32,
    /// How often the Bootstrap Loader reports progress, in seconds.
    pub progress_report_interval_secs: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
