//! Configuration for the scout registry client
//!
//! Settings come from `~/.scout/config.toml`, the nearest `scout.toml`,
//! `SCOUT_*` environment variables and command-line flags, in increasing
//! order of priority.

pub mod toml;
pub mod merge;

// Re-export main types
pub use toml::{ScoutConfig, ConfigFile, DEFAULT_API_KEY_PARAM, DEFAULT_BASE_URL};
pub use merge::{ConfigLoader, ConfigLayering, ConfigSource};

use scout_core::error::ScoutError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ScoutError>;
