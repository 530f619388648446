//! Configuration loading and validation for the chain-state ingestion engine.
//!
//! Configuration is loaded from multiple sources in order of precedence:
//! 1. Environment variables (highest)
//! 2. Environment-specific file (e.g., `development.toml`)
//! 3. Default file (`default.toml`)
//!
//! # Example
//!
//! ```ignore
//! use mw_chain_indexer::config::Settings;
//!
//! let settings = Settings::load("development")?;
//! println!("Node URL: {}", settings.node.api_url);
//! ```

mod settings;

pub use settings::{
    ApiSettings, CacheSettings, DatabaseSettings, IngestionSettings, LoggingSettings,
    MetricsSettings, NodeSettings, Settings,
};
