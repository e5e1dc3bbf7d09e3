//! URL handling module for Newsprint
//!
//! This module provides canonical link normalization (the article
//! deduplication key), domain extraction, same-site matching and the
//! link filters applied to extracted article links.

mod domain;
mod filter;
mod matcher;
mod normalize;

pub use domain::{bare_host, domain_of, extract_domain};
pub use filter::{FilterReason, LinkFilters};
pub use matcher::{is_same_site, lookup_host, matches_wildcard};
pub use normalize::{normalize_url, resolve_link};
