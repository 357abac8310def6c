//! Configuration layering, file discovery, and environment overrides

use std::collections::HashMap;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use scout_core::error::ScoutError;
use crate::toml::{invalid, query_param_setting, ConfigFile, ScoutConfig};
use crate::ConfigResult;

/// Project configuration file name
pub const PROJECT_CONFIG_FILE: &str = "scout.toml";

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "SCOUT_";

/// Key variable honoured when `SCOUT_API_KEY` is absent
pub const FALLBACK_API_KEY_VAR: &str = "LIBRARIES_IO_API_KEY";

/// Main configuration loading interface
pub struct ConfigLoader {
    /// Current working directory
    cwd: Utf8PathBuf,
    /// Global file location, `~/.scout/config.toml` unless overridden
    global_path: Option<Utf8PathBuf>,
}

/// Configuration layering and merging
pub struct ConfigLayering;

/// Configuration source tracking
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Global config file
    Global(Utf8PathBuf),
    /// Project scout.toml file
    Project(Utf8PathBuf),
    /// File named on the command line
    Explicit(Utf8PathBuf),
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new(cwd: Utf8PathBuf) -> Self {
        Self {
            cwd,
            global_path: default_global_path(),
        }
    }

    /// Use a different global configuration file
    pub fn with_global_path(mut self, path: Option<Utf8PathBuf>) -> Self {
        self.global_path = path;
        self
    }

    /// Find configuration file in project (walks up directory tree)
    pub fn resolve_config_path(&self, filename: &str) -> Option<Utf8PathBuf> {
        let mut current = self.cwd.as_path();

        loop {
            let config_path = current.join(filename);
            if config_path.is_file() {
                return Some(config_path);
            }

            match current.parent() {
                Some(parent) => current = parent,
                None => return None,
            }
        }
    }

    /// Load the nearest scout.toml, if any
    pub async fn load_project_config(&self) -> ConfigResult<Option<(ConfigFile, ConfigSource)>> {
        match self.resolve_config_path(PROJECT_CONFIG_FILE) {
            Some(path) => {
                let config = crate::toml::load_from_file(&path).await?;
                Ok(Some((config, ConfigSource::Project(path))))
            }
            None => Ok(None),
        }
    }

    /// Load global configuration
    pub async fn load_global_config(&self) -> ConfigResult<Option<(ConfigFile, ConfigSource)>> {
        match &self.global_path {
            Some(path) if path.is_file() => {
                let config = crate::toml::load_from_file(path).await?;
                Ok(Some((config, ConfigSource::Global(path.clone()))))
            }
            _ => Ok(None),
        }
    }

    /// Resolve every layer into a validated configuration.
    ///
    /// An explicit file replaces project discovery; it must exist.
    pub async fn load(
        &self,
        explicit: Option<&Utf8Path>,
        env_overrides: &HashMap<String, String>,
        cli_overrides: &HashMap<String, String>,
    ) -> ConfigResult<(ScoutConfig, Vec<ConfigSource>)> {
        let mut sources = Vec::new();

        let global = self.load_global_config().await?.map(|(file, source)| {
            sources.push(source);
            file
        });

        let project = match explicit {
            Some(path) => {
                let file = crate::toml::load_from_file(path).await?;
                sources.push(ConfigSource::Explicit(path.to_owned()));
                Some(file)
            }
            None => self.load_project_config().await?.map(|(file, source)| {
                sources.push(source);
                file
            }),
        };

        let config = ConfigLayering::merge_configs(global, project, env_overrides, cli_overrides)?;
        config.validate()?;
        Ok((config, sources))
    }
}

fn default_global_path() -> Option<Utf8PathBuf> {
    let home = dirs::home_dir()?;
    let home = Utf8PathBuf::try_from(home).ok()?;
    Some(home.join(".scout").join("config.toml"))
}

impl ConfigLayering {
    /// Merge layers over the defaults: global, project, environment, then CLI
    pub fn merge_configs(
        global_config: Option<ConfigFile>,
        project_config: Option<ConfigFile>,
        env_overrides: &HashMap<String, String>,
        cli_overrides: &HashMap<String, String>,
    ) -> ConfigResult<ScoutConfig> {
        let mut merged = ScoutConfig::default();

        if let Some(global) = &global_config {
            merged.overlay(global);
        }
        if let Some(project) = &project_config {
            merged.overlay(project);
        }

        Self::apply_env_overrides(&mut merged, env_overrides)?;

        // Highest priority
        Self::apply_cli_overrides(&mut merged, cli_overrides)?;

        Ok(merged)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(config: &mut ScoutConfig, overrides: &HashMap<String, String>) -> ConfigResult<()> {
        if !overrides.contains_key("SCOUT_API_KEY") {
            if let Some(key) = overrides.get(FALLBACK_API_KEY_VAR) {
                config.api_key = Some(key.clone());
            }
        }

        for (key, value) in overrides {
            if let Some(field) = key.strip_prefix(ENV_PREFIX) {
                // Unknown SCOUT_* variables are ignored
                let field = field.to_ascii_lowercase();
                if is_known_field(&field) {
                    set_field(config, &field, value, key)?;
                }
            }
        }

        Ok(())
    }

    /// Apply CLI flag overrides, keyed by field name
    fn apply_cli_overrides(config: &mut ScoutConfig, overrides: &HashMap<String, String>) -> ConfigResult<()> {
        for (field, value) in overrides {
            if !is_known_field(field) {
                return Err(invalid(field, "unknown configuration key"));
            }
            set_field(config, field, value, field)?;
        }

        Ok(())
    }

    /// Collect environment variable overrides
    pub fn collect_env_overrides() -> HashMap<String, String> {
        std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX) || key == FALLBACK_API_KEY_VAR)
            .collect()
    }
}

const KNOWN_FIELDS: &[&str] = &[
    "api_key",
    "base_url",
    "timeout_secs",
    "max_retries",
    "retry_base_delay_ms",
    "retry_max_delay_ms",
    "max_retry_after_secs",
    "rate_limit_requests",
    "rate_limit_window_seconds",
    "cache_ttl_seconds",
    "cache_max_entries",
    "pool_max_idle_per_host",
    "pool_idle_timeout_secs",
    "coalesce_inflight",
    "api_key_query_param",
];

fn is_known_field(field: &str) -> bool {
    KNOWN_FIELDS.contains(&field)
}

/// Assign one textual override; `origin` names the variable or flag in errors
fn set_field(config: &mut ScoutConfig, field: &str, value: &str, origin: &str) -> ConfigResult<()> {
    match field {
        "api_key" => config.api_key = Some(value.to_string()),
        "api_key_query_param" => config.api_key_query_param = query_param_setting(value),
        "base_url" => config.base_url = value.to_string(),
        "timeout_secs" => config.timeout_secs = parse_value(value, origin)?,
        "max_retries" => config.max_retries = parse_value(value, origin)?,
        "retry_base_delay_ms" => config.retry_base_delay_ms = parse_value(value, origin)?,
        "retry_max_delay_ms" => config.retry_max_delay_ms = parse_value(value, origin)?,
        "max_retry_after_secs" => config.max_retry_after_secs = parse_value(value, origin)?,
        "rate_limit_requests" => config.rate_limit_requests = parse_value(value, origin)?,
        "rate_limit_window_seconds" => config.rate_limit_window_seconds = parse_value(value, origin)?,
        "cache_ttl_seconds" => config.cache_ttl_seconds = parse_value(value, origin)?,
        "cache_max_entries" => config.cache_max_entries = parse_value(value, origin)?,
        "pool_max_idle_per_host" => config.pool_max_idle_per_host = parse_value(value, origin)?,
        "pool_idle_timeout_secs" => config.pool_idle_timeout_secs = parse_value(value, origin)?,
        "coalesce_inflight" => config.coalesce_inflight = parse_bool(value, origin)?,
        other => return Err(invalid(other, "unknown configuration key")),
    }
    Ok(())
}

fn parse_value<T>(value: &str, origin: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| invalid(origin, format!("'{}' is not a valid number: {}", value, e)))
}

fn parse_bool(value: &str, origin: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ScoutError::ConfigValidation {
            field: origin.to_string(),
            reason: format!("'{}' is not a boolean", value),
        }),
    }
}
