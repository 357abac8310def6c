//! Terminal output.
//!
//! Envelopes and configuration are JSON on stdout so they can be piped;
//! everything meant for a person goes to stderr.

pub mod colors;
pub mod errors;

use scout_config::{ConfigSource, ScoutConfig};
use scout_core::error::{ScoutError, ScoutResult};
use scout_core::types::Envelope;
use serde::Serialize;
use serde_json::Value;

use colors::ColorSupport;
use errors::ErrorFormatter;

/// Output handler for consistent terminal formatting
pub struct OutputHandler {
    colors: ColorSupport,
    errors: ErrorFormatter,
    compact: bool,
}

impl OutputHandler {
    pub fn new(compact: bool) -> Self {
        Self {
            colors: ColorSupport::detect(),
            errors: ErrorFormatter::new(),
            compact,
        }
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", self.colors.yellow("warning:"), message);
    }

    /// Print an envelope; failures are also explained on stderr
    pub fn envelope(&self, envelope: &Envelope) -> ScoutResult<()> {
        println!("{}", self.render(envelope)?);

        if let Some(error) = envelope.error() {
            eprintln!("{}", self.errors.format_descriptor(error));
        } else if let Some(rate_limit) = envelope.rate_limit() {
            if rate_limit.is_exhausted() {
                self.warn("registry rate limit exhausted; further calls will wait for the window to reset");
            }
        }
        Ok(())
    }

    /// Print the resolved configuration with the API key masked
    pub fn config(&self, config: &ScoutConfig, sources: &[ConfigSource]) -> ScoutResult<()> {
        println!("{}", self.render(&masked_config(config)?)?);

        for source in sources {
            let (label, path) = match source {
                ConfigSource::Global(path) => ("global", path),
                ConfigSource::Project(path) => ("project", path),
                ConfigSource::Explicit(path) => ("explicit", path),
            };
            eprintln!("{} {}", self.colors.dim(&format!("{}:", label)), path);
        }
        Ok(())
    }

    pub fn render<T: Serialize>(&self, value: &T) -> ScoutResult<String> {
        let rendered = if self.compact {
            serde_json::to_string(value)
        } else {
            serde_json::to_string_pretty(value)
        };
        rendered.map_err(|e| ScoutError::InvalidResponse {
            message: format!("Failed to render output: {}", e),
        })
    }
}

/// Configuration as JSON with the key replaced by a marker
pub fn masked_config(config: &ScoutConfig) -> ScoutResult<Value> {
    let mut value = serde_json::to_value(config).map_err(|e| ScoutError::InvalidResponse {
        message: format!("Failed to render configuration: {}", e),
    })?;
    if let Some(key) = value.get_mut("api_key") {
        *key = Value::String("<redacted>".to_string());
    }
    Ok(value)
}
