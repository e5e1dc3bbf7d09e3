use crate::capture::CaptureJob;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Final state of one job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStatus {
    Succeeded,
    Skipped,
    Failed,
}

/// Outcome of one capture job; every job yields exactly one
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureResult {
    pub job_id: String,
    pub url: String,
    pub group: String,
    pub status: CaptureStatus,
    pub full_page_path: Option<PathBuf>,
    pub content_path: Option<PathBuf>,
    /// Detection strategy of the content image, `fallback` when the region
    /// could not be rendered and the full page was used instead
    pub region_strategy: Option<String>,
    pub attempts: u32,
    pub elapsed: Duration,
    /// Human-readable reason for a skip or failure
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl CaptureResult {
    fn base(job_id: &str, url: &str, group: &str, status: CaptureStatus) -> Self {
        Self {
            job_id: job_id.to_string(),
            url: url.to_string(),
            group: group.to_string(),
            status,
            full_page_path: None,
            content_path: None,
            region_strategy: None,
            attempts: 0,
            elapsed: Duration::ZERO,
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub fn succeeded(job: &CaptureJob, shots: SavedShots, attempts: u32, elapsed: Duration) -> Self {
        Self {
            full_page_path: shots.full_page,
            content_path: shots.content,
            region_strategy: shots.region_strategy,
            attempts,
            elapsed,
            ..Self::base(&job.id, job.url.as_str(), &job.group, CaptureStatus::Succeeded)
        }
    }

    pub fn failed(job: &CaptureJob, error: String, attempts: u32, elapsed: Duration) -> Self {
        Self {
            error: Some(error),
            attempts,
            elapsed,
            ..Self::base(&job.id, job.url.as_str(), &job.group, CaptureStatus::Failed)
        }
    }

    /// A job that was never attempted
    pub fn skipped(job_id: &str, url: &str, group: &str, reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::base(job_id, url, group, CaptureStatus::Skipped)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CaptureStatus::Succeeded
    }
}

/// Files written by a successful job
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedShots {
    pub full_page: Option<PathBuf>,
    pub content: Option<PathBuf>,
    pub region_strategy: Option<String>,
}

/// Row of the tabular results index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub url: String,
    pub id: String,
    pub group: String,
    pub status: CaptureStatus,
    pub success: bool,
    pub fullpage_path: String,
    pub content_path: String,
    pub region_strategy: String,
    pub attempts: u32,
    pub processing_time: f64,
    pub error: String,
    pub finished_at: String,
}

fn path_text(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

impl From<&CaptureResult> for ResultRow {
    fn from(result: &CaptureResult) -> Self {
        Self {
            url: result.url.clone(),
            id: result.job_id.clone(),
            group: result.group.clone(),
            status: result.status,
            success: result.is_success(),
            fullpage_path: path_text(&result.full_page_path),
            content_path: path_text(&result.content_path),
            region_strategy: result.region_strategy.clone().unwrap_or_default(),
            attempts: result.attempts,
            processing_time: (result.elapsed.as_secs_f64() * 100.0).round() / 100.0,
            error: result.error.clone().unwrap_or_default(),
            finished_at: result.finished_at.to_rfc3339(),
        }
    }
}
