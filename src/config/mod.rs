//! Configuration module for Newsprint
//!
//! Site documents (TOML or YAML) describe one news site's categories,
//! selectors and pagination. They deserialize into raw documents whose
//! fields are all optional, and are then validated into the immutable
//! [`SiteConfig`]. Validation reports every offending field at once.
//!
//! # Example
//!
//! ```no_run
//! use newsprint::config::load_site_config;
//! use std::path::Path;
//!
//! let site = load_site_config(Path::new("sites/example.yaml")).unwrap();
//! for name in site.category_names() {
//!     println!("{}", name);
//! }
//! ```

mod capture;
mod parser;
mod types;
mod validation;

pub use capture::{
    default_popup_selectors, validate_capture, CaptureConfig, CaptureDocument, CaptureSettings,
    ColumnMapping,
};
pub use parser::{
    compute_config_hash, load_capture_config, load_site_config, load_site_config_with_hash,
    parse_site_config, DocumentFormat,
};
pub use types::{
    ArticleDocument, ArticleSelectors, CategoryConfig, CategoryDocument, CrawlDocument,
    CrawlSettings, FieldSelector, FilterDocument, PaginationConfig, PaginationDocument,
    RawSelector, SelectorDocument, SelectorSet, SiteConfig, SiteDocument,
    DEFAULT_TEXT_ELEMENTS,
};
pub use validation::validate_site;
