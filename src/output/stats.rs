//! Console statistics for crawl and capture runs

use crate::capture::{CaptureRun, CaptureStatus};
use crate::crawler::CrawlReport;

/// Prints per-category counters of a crawl
///
/// # Arguments
///
/// * `report` - The finished crawl
pub fn print_crawl_statistics(report: &CrawlReport) {
    println!("=== Crawl Statistics: {} ===\n", report.site_id);

    for stats in &report.categories {
        println!("{} ({:?}):", stats.category, stats.status);
        println!(
            "  Pages: {} fetched, {} failed, {} skipped",
            stats.pages_fetched, stats.pages_failed, stats.pages_skipped
        );
        println!(
            "  Articles: {} kept, {} dropped, {} filtered, {} duplicates",
            stats.articles_kept, stats.articles_dropped, stats.articles_filtered, stats.duplicates
        );
        if stats.details_fetched + stats.details_failed + stats.details_skipped > 0 {
            println!(
                "  Article pages: {} read, {} failed, {} skipped",
                stats.details_fetched, stats.details_failed, stats.details_skipped
            );
        }
        if let Some(stop) = stats.stop_reason {
            println!("  Stopped: {}", stop);
        }
        for error in &stats.errors {
            println!("  Error: {}", error);
        }
        println!();
    }

    let failed = report.failed_categories().count();
    println!(
        "Total: {} article(s) from {} categor{} ({} with failures)",
        report.total_articles(),
        report.categories.len(),
        if report.categories.len() == 1 { "y" } else { "ies" },
        failed
    );
}

/// Prints succeeded / skipped / failed counts of a capture run, with the
/// reason of every failure
pub fn print_capture_statistics(run: &CaptureRun) {
    println!("=== Capture Statistics ===\n");

    let total = run.results.len();
    let succeeded = run.count(CaptureStatus::Succeeded);
    println!("  Succeeded: {}", succeeded);
    println!("  Skipped: {}", run.count(CaptureStatus::Skipped));
    println!("  Failed: {}", run.count(CaptureStatus::Failed));
    if run.cancelled {
        println!("  (run was cancelled)");
    }
    println!();

    for result in run.results.iter().filter(|r| !r.is_success()) {
        println!(
            "  [{:?}] {} {}: {}",
            result.status,
            result.job_id,
            result.url,
            result.error.as_deref().unwrap_or("unknown")
        );
    }

    let success_rate = if total > 0 {
        (succeeded as f64 / total as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "\nSuccess Rate: {:.1}% ({} / {} jobs)",
        success_rate, succeeded, total
    );
}
