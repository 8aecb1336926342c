//! Configuration module for Biz-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and applying the environment overrides used in deployments.
//!
//! # Example
//!
//! ```no_run
//! use biz_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Lightweight attempts per page: {}", config.fetch.max_lightweight_attempts);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserConfig, Config, DelayRange, FetchConfig, OutputConfig, PacingConfig, ProxyConfig,
    SelectorConfig, ServerConfig,
};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, load_config, load_config_with_hash, parse_config,
    ENV_CHROME_PATH, ENV_PORT, ENV_PROXY_HOST, ENV_PROXY_PORT,
};
pub use validation::{is_safe_file_stem, validate};
