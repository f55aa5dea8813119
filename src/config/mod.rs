//! Configuration module for Site-Sentinel
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Only `[validator].seed` is mandatory; every other key has a default.
//!
//! # Example
//!
//! ```no_run
//! use site_sentinel::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sentinel.toml")).unwrap();
//! println!("Validating {} to depth {}", config.validator.seed, config.validator.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AuditConfig, Config, FetcherConfig, OutputConfig, ReviewConfig, ScopeConfig,
    UserAgentConfig, ValidatorConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
