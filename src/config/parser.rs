use crate::config::capture::{validate_capture, CaptureConfig, CaptureDocument};
use crate::config::types::{SiteConfig, SiteDocument};
use crate::config::validation::validate_site;
use crate::ConfigError;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::path::Path;

/// On-disk format of a configuration document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Toml,
    Yaml,
}

impl DocumentFormat {
    /// Picks the format from a file extension
    ///
    /// # Arguments
    ///
    /// * `path` - Path of the configuration file
    ///
    /// # Returns
    ///
    /// * `Ok(DocumentFormat)` - `.toml`, `.yaml` or `.yml`
    /// * `Err(ConfigError::UnsupportedFormat)` - Any other extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

fn parse_document<T: DeserializeOwned>(
    content: &str,
    format: DocumentFormat,
) -> Result<T, ConfigError> {
    Ok(match format {
        DocumentFormat::Toml => toml::from_str(content)?,
        DocumentFormat::Yaml => serde_yaml::from_str(content)?,
    })
}

/// Parses and validates a site configuration from a string
pub fn parse_site_config(content: &str, format: DocumentFormat) -> Result<SiteConfig, ConfigError> {
    let doc: SiteDocument = parse_document(content, format)?;
    validate_site(doc)
}

/// Loads and validates a site configuration file
///
/// # Arguments
///
/// * `path` - Path to a `.toml`, `.yaml` or `.yml` site document
///
/// # Returns
///
/// * `Ok(SiteConfig)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the document.
///   Validation failures carry every offending field.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use newsprint::config::load_site_config;
///
/// let site = load_site_config(Path::new("sites/example.toml")).unwrap();
/// println!("Categories: {:?}", site.category_names());
/// ```
pub fn load_site_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    let format = DocumentFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    parse_site_config(&content, format)
}

/// Loads and validates a capture configuration file
pub fn load_capture_config(path: &Path) -> Result<CaptureConfig, ConfigError> {
    let format = DocumentFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    let doc: CaptureDocument = parse_document(&content, format)?;
    validate_capture(doc)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Recorded in crawl reports so that outputs can be traced back to the
/// exact document that produced them.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a site configuration and returns both the config and its hash
pub fn load_site_config_with_hash(path: &Path) -> Result<(SiteConfig, String), ConfigError> {
    let config = load_site_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
