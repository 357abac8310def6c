//! Error message formatting with actionable suggestions.
//!
//! Setup failures arrive as `ScoutError`; query failures arrive as the
//! descriptor inside an envelope. Both render the same way.

use std::error::Error;

use scout_core::error::ScoutError;
use scout_core::types::ErrorDescriptor;
use super::colors::ColorSupport;

/// Error formatter with suggestions
pub struct ErrorFormatter {
    colors: ColorSupport,
}

impl ErrorFormatter {
    /// Formatter for stderr
    pub fn new() -> Self {
        Self::with_colors(ColorSupport::detect())
    }

    pub fn with_colors(colors: ColorSupport) -> Self {
        Self { colors }
    }

    /// Format an error with context and suggestions
    pub fn format_error(&self, error: &ScoutError) -> String {
        let mut output = self.headline(&error.to_string());

        if let ScoutError::TomlParse { file, line, column, .. } = error {
            output.push('\n');
            output.push_str(&self.format_location(file, *line, *column));
        }

        self.push_help(&mut output, error.suggestion());

        // Add source chain if available
        let mut source = error.source();
        while let Some(err) = source {
            output.push('\n');
            output.push_str(&self.colors.dim("caused by"));
            output.push_str(": ");
            output.push_str(&err.to_string());
            source = err.source();
        }

        output
    }

    /// Format the failure carried by an envelope
    pub fn format_descriptor(&self, descriptor: &ErrorDescriptor) -> String {
        let mut output = self.headline(&format!("{}: {}", descriptor.kind, descriptor.message));

        if let Some(status) = descriptor.status {
            output.push('\n');
            output.push_str(&self.colors.dim("status"));
            output.push_str(&format!(": {}", status));
        }
        if let Some(secs) = descriptor.retry_after_secs {
            output.push('\n');
            output.push_str(&self.colors.dim("retry after"));
            output.push_str(&format!(": {}s", secs));
        }

        self.push_help(&mut output, descriptor.kind.suggestion());
        output
    }

    /// Format file location context
    pub fn format_location(&self, file: &str, line: usize, column: usize) -> String {
        format!("{} {}:{}:{}", self.colors.dim("-->"), file, line, column)
    }

    fn headline(&self, message: &str) -> String {
        format!("{}: {}", self.colors.red("error"), message)
    }

    fn push_help(&self, output: &mut String, suggestion: Option<&str>) {
        if let Some(suggestion) = suggestion {
            output.push('\n');
            output.push_str(&self.colors.dim("help"));
            output.push_str(": ");
            output.push_str(suggestion);
        }
    }
}

impl Default for ErrorFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::error::ErrorKind;

    fn plain() -> ErrorFormatter {
        ErrorFormatter::with_colors(ColorSupport::disabled())
    }

    #[test]
    fn test_format_toml_error_with_location() {
        let error = ScoutError::TomlParse {
            file: "scout.toml".to_string(),
            message: "invalid type".to_string(),
            line: 3,
            column: 16,
        };

        let rendered = plain().format_error(&error);
        assert!(rendered.starts_with("error: Failed to parse scout.toml"));
        assert!(rendered.contains("--> scout.toml:3:16"));
        assert!(rendered.contains("help: Fix the value in scout.toml"));
    }

    #[test]
    fn test_format_error_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let error = ScoutError::io("Failed to read scout.toml".to_string(), io);

        let rendered = plain().format_error(&error);
        assert!(rendered.contains("caused by: no such file"));
    }

    #[test]
    fn test_format_descriptor() {
        let descriptor = ErrorDescriptor {
            kind: ErrorKind::RateLimitError,
            message: "Too many requests".to_string(),
            status: Some(429),
            retry_after_secs: Some(30),
        };

        let rendered = plain().format_descriptor(&descriptor);
        assert!(rendered.starts_with("error: RateLimitError: Too many requests"));
        assert!(rendered.contains("status: 429"));
        assert!(rendered.contains("retry after: 30s"));
        assert!(rendered.contains("help: Wait for the rate limit window"));
    }
}
