//! Newsprint: configuration-driven news crawling and page capture
//!
//! This crate implements two cooperating engines:
//! - a crawl engine that walks the category listings of pre-declared news
//!   sites through declarative pagination and selector rules, and
//! - a capture orchestrator that renders batches of article URLs to images,
//!   locating the article body with an ordered chain of detection strategies.

pub mod capture;
pub mod config;
pub mod crawler;
pub mod detect;
pub mod extract;
pub mod fetch;
pub mod output;
pub mod pagination;
pub mod robots;
pub mod url;

use std::fmt;
use thiserror::Error;

/// Main error type for Newsprint operations
#[derive(Debug, Error)]
pub enum NewsprintError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Blocking page detected at {url} (matched '{marker}')")]
    Blocked { url: String, marker: String },

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Render error for {url}: {message}")]
    Render { url: String, message: String },

    #[error("URL disallowed by crawl policy: {url}")]
    PolicyDenied { url: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NewsprintError {
    /// Returns true if a retry of the same operation may succeed
    ///
    /// Timeouts, connection failures, HTTP 5xx and HTTP 429 are transient.
    /// Everything else (4xx, blocking pages, policy, configuration and
    /// extraction errors) is permanent for the current run.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            Self::Reqwest(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            Self::Render { .. } => true,
            _ => false,
        }
    }

    /// Returns true for errors that must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported config format: {0} (expected .toml, .yaml or .yml)")]
    UnsupportedFormat(String),

    #[error("Unknown category '{0}'")]
    UnknownCategory(String),

    #[error("{0}")]
    Invalid(ValidationReport),
}

/// A single offending field found while validating a configuration document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    /// Dotted path of the field, e.g. `categories.sports.selectors.title`
    pub field: String,
    /// Human-readable description of the problem
    pub message: String,
}

/// Every issue found in one configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<FieldIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an issue for `field`
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(FieldIssue {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Returns true if any issue was recorded for exactly `field`
    pub fn has_issue_for(&self, field: &str) -> bool {
        self.issues.iter().any(|i| i.field == field)
    }

    /// Converts the report into a result, failing if any issue was recorded
    pub fn into_result(self) -> ConfigResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(self))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation issue(s):", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  - {}: {}", issue.field, issue.message)?;
        }
        Ok(())
    }
}

/// Selector compilation errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Invalid selector for {field}: '{selector}' ({message})")]
    InvalidSelector {
        field: String,
        selector: String,
        message: String,
    },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Newsprint operations
pub type Result<T> = std::result::Result<T, NewsprintError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use capture::{CaptureJob, CaptureMode, CaptureOrchestrator, CaptureResult, ImageFormat};
pub use config::{load_site_config, SiteConfig};
pub use crawler::{ArticleRecord, CrawlEngine, CrawlReport};
pub use detect::{ContentDetector, ContentRegion};
pub use url::{extract_domain, normalize_url};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_report_lists_every_issue() {
        let mut report = ValidationReport::new();
        report.push("site_name", "must not be empty");
        report.push("base_url", "invalid URL");

        let rendered = ConfigError::Invalid(report).to_string();
        assert!(rendered.contains("2 validation issue(s)"));
        assert!(rendered.contains("site_name: must not be empty"));
        assert!(rendered.contains("base_url: invalid URL"));
    }

    #[test]
    fn test_report_into_result() {
        assert!(ValidationReport::new().into_result().is_ok());

        let mut report = ValidationReport::new();
        report.push("categories", "at least one category is required");
        match report.into_result() {
            Err(ConfigError::Invalid(report)) => assert_eq!(report.len(), 1),
            other => panic!("expected invalid config, got ok={}", other.is_ok()),
        }
    }

    #[test]
    fn test_retryable_classification() {
        let server_error = NewsprintError::HttpStatus {
            url: "https://example.com".to_string(),
            status: 503,
        };
        let not_found = NewsprintError::HttpStatus {
            url: "https://example.com".to_string(),
            status: 404,
        };
        let denied = NewsprintError::PolicyDenied {
            url: "https://example.com".to_string(),
        };

        assert!(server_error.is_retryable());
        assert!(!not_found.is_retryable());
        assert!(!denied.is_retryable());
        assert!(NewsprintError::Timeout {
            url: "https://example.com".to_string()
        }
        .is_retryable());
    }
}
