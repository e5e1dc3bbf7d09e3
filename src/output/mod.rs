//! Output module for crawl and capture results
//!
//! This module handles:
//! - Writing article records as JSON, raw per run and classified per category
//! - Generating markdown summaries of crawl and capture runs
//! - Printing run statistics to the console

mod json;
mod markdown;
pub mod stats;

pub use json::{group_by_category, JsonArticleWriter, WrittenFiles};
pub use markdown::{format_capture_summary, format_crawl_summary, write_markdown};
pub use stats::{print_capture_statistics, print_crawl_statistics};
