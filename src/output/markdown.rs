//! Markdown summary generation
//!
//! Human-readable summaries of crawl and capture runs. Every summary lists
//! succeeded, skipped and failed items, with the reason for each failure.

use crate::capture::{CaptureRun, CaptureStatus};
use crate::crawler::{CategoryStatus, CrawlReport};
use crate::Result;
use std::fs;
use std::path::Path;

/// Writes a formatted summary to `output_path`
pub fn write_markdown(content: &str, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_path, content)?;
    Ok(())
}

fn status_label(status: CategoryStatus) -> &'static str {
    match status {
        CategoryStatus::Completed => "completed",
        CategoryStatus::PartialFailure => "partial failure",
        CategoryStatus::Failed => "failed",
    }
}

/// Formats a crawl report as markdown
pub fn format_crawl_summary(report: &CrawlReport) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Crawl Summary: {}\n\n", report.site_id));

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", report.finished_at.to_rfc3339()));
    let duration = (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0;
    md.push_str(&format!("- **Duration**: {:.1} seconds\n", duration));
    if let Some(hash) = &report.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push_str(&format!("- **Articles**: {}\n\n", report.total_articles()));

    md.push_str("## Categories\n\n");
    md.push_str("| Category | Status | Pages | Failed | Skipped | Kept | Dropped | Filtered | Duplicates | Stop |\n");
    md.push_str("|----------|--------|-------|--------|---------|------|---------|----------|------------|------|\n");
    for stats in &report.categories {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |\n",
            stats.category,
            status_label(stats.status),
            stats.pages_fetched,
            stats.pages_failed,
            stats.pages_skipped,
            stats.articles_kept,
            stats.articles_dropped,
            stats.articles_filtered,
            stats.duplicates,
            stats
                .stop_reason
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ));
    }
    md.push('\n');

    let failures: Vec<_> = report
        .categories
        .iter()
        .filter(|c| !c.errors.is_empty())
        .collect();
    if !failures.is_empty() {
        md.push_str("## Failures\n\n");
        for stats in failures {
            for error in &stats.errors {
                md.push_str(&format!("- **{}**: {}\n", stats.category, error));
            }
        }
        md.push('\n');
    }

    md
}

/// Formats a capture run as markdown
pub fn format_capture_summary(run: &CaptureRun) -> String {
    let mut md = String::new();

    md.push_str("# Capture Summary\n\n");

    let succeeded = run.count(CaptureStatus::Succeeded);
    let skipped = run.count(CaptureStatus::Skipped);
    let failed = run.count(CaptureStatus::Failed);
    let total = run.results.len();

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Jobs**: {}\n", total));
    md.push_str(&format!("- **Batches**: {}\n", run.batch_sizes.len()));
    md.push_str(&format!("- **Succeeded**: {}\n", succeeded));
    md.push_str(&format!("- **Skipped**: {}\n", skipped));
    md.push_str(&format!("- **Failed**: {}\n", failed));
    let rate = if total > 0 {
        succeeded as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    md.push_str(&format!("- **Success Rate**: {:.2}%\n", rate));
    if run.cancelled {
        md.push_str("- **Cancelled**: yes\n");
    }
    md.push('\n');

    let mut strategies: Vec<(&str, usize)> = Vec::new();
    for result in run.results.iter().filter(|r| r.is_success()) {
        if let Some(strategy) = result.region_strategy.as_deref() {
            match strategies.iter_mut().find(|(name, _)| *name == strategy) {
                Some((_, count)) => *count += 1,
                None => strategies.push((strategy, 1)),
            }
        }
    }
    if !strategies.is_empty() {
        md.push_str("## Content Regions\n\n");
        md.push_str("| Strategy | Pages |\n");
        md.push_str("|----------|-------|\n");
        for (strategy, count) in strategies {
            md.push_str(&format!("| {} | {} |\n", strategy, count));
        }
        md.push('\n');
    }

    for (title, status) in [
        ("Failed", CaptureStatus::Failed),
        ("Skipped", CaptureStatus::Skipped),
    ] {
        let items: Vec<_> = run.results.iter().filter(|r| r.status == status).collect();
        if items.is_empty() {
            continue;
        }
        md.push_str(&format!("## {}\n\n", title));
        md.push_str("| ID | URL | Reason |\n");
        md.push_str("|----|-----|--------|\n");
        for result in items {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                result.job_id,
                result.url,
                result.error.as_deref().unwrap_or("unknown").replace('|', "\\|")
            ));
        }
        md.push('\n');
    }

    md
}
