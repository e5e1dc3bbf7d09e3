//! Capture Orchestrator
//!
//! Splits jobs into batches and drains each batch with a bounded pool of
//! workers. Every worker owns its rendering context exclusively, paces its
//! own loads and retries a failed job once with a fresh context.

use crate::capture::layout::{OutputLayout, ShotKind};
use crate::capture::render::{RenderBackend, RenderContext, RenderTarget};
use crate::capture::result::SavedShots;
use crate::capture::{CaptureJob, CaptureMode, CaptureResult, CaptureStatus, ImageFormat};
use crate::config::CaptureSettings;
use crate::detect::{ContentDetector, ContentRegion, RegionTarget};
use crate::{NewsprintError, Result};
use futures::future::join_all;
use scraper::Html;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Attempts per job: the first try plus one retry with a fresh context
const MAX_ATTEMPTS: u32 = 2;

/// How a run is executed
#[derive(Debug, Clone)]
pub struct CapturePlan {
    pub batch_size: usize,
    pub max_workers: usize,
    /// Minimum pause between two loads of the same worker
    pub delay: Duration,
    /// Upper bound of a single attempt
    pub job_timeout: Duration,
    pub mode: CaptureMode,
    pub format: ImageFormat,
    pub popup_selectors: Vec<String>,
}

impl CapturePlan {
    pub fn from_settings(settings: &CaptureSettings, popup_selectors: Vec<String>) -> Self {
        Self {
            batch_size: settings.batch_size,
            max_workers: settings.max_workers,
            delay: settings.delay,
            job_timeout: settings.job_timeout,
            mode: settings.mode,
            format: settings.format,
            popup_selectors,
        }
    }
}

/// Everything a run produced
#[derive(Debug, Default)]
pub struct CaptureRun {
    /// One result per submitted job, in completion order
    pub results: Vec<CaptureResult>,
    /// Number of jobs in each dispatched batch
    pub batch_sizes: Vec<usize>,
    pub cancelled: bool,
}

impl CaptureRun {
    pub fn count(&self, status: CaptureStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

/// Images of one attempt, encoded but not yet written
struct Shots {
    full_page: Option<Vec<u8>>,
    content: Option<(Vec<u8>, String)>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs capture jobs against a rendering backend
pub struct CaptureOrchestrator {
    backend: Arc<dyn RenderBackend>,
    detector: Arc<ContentDetector>,
    layout: OutputLayout,
    cancel: CancellationToken,
}

impl CaptureOrchestrator {
    pub fn new(
        backend: Arc<dyn RenderBackend>,
        detector: ContentDetector,
        layout: OutputLayout,
    ) -> Self {
        Self {
            backend,
            detector: Arc::new(detector),
            layout,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops dispatching unstarted jobs when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Captures every job
    ///
    /// Jobs are processed in batches of `plan.batch_size`, each drained by at
    /// most `plan.max_workers` workers. Failures never abort the run; after a
    /// cancellation every job not yet started is recorded as skipped.
    pub async fn run(&self, jobs: Vec<CaptureJob>, plan: &CapturePlan) -> CaptureRun {
        let batch_size = plan.batch_size.max(1);
        let total = jobs.len();
        let mut run = CaptureRun::default();
        let mut pending: VecDeque<CaptureJob> = jobs.into();

        info!(
            "Capturing {} page(s) in batches of {} with {} worker(s)",
            total, batch_size, plan.max_workers
        );

        while !pending.is_empty() {
            if self.cancel.is_cancelled() {
                break;
            }

            let take = batch_size.min(pending.len());
            let batch: VecDeque<CaptureJob> = pending.drain(..take).collect();
            let number = run.batch_sizes.len() + 1;
            run.batch_sizes.push(batch.len());
            info!("Batch {}: {} job(s)", number, batch.len());

            let results = self.run_batch(batch, plan).await;
            let failed = results.iter().filter(|r| r.status == CaptureStatus::Failed).count();
            info!("Batch {} finished: {} done, {} failed", number, results.len(), failed);
            run.results.extend(results);
        }

        if self.cancel.is_cancelled() {
            run.cancelled = true;
            if !pending.is_empty() {
                warn!("Run cancelled; skipping {} unstarted job(s)", pending.len());
            }
            run.results.extend(pending.into_iter().map(|job| {
                CaptureResult::skipped(&job.id, job.url.as_str(), &job.group, "cancelled")
            }));
        }

        run
    }

    async fn run_batch(&self, batch: VecDeque<CaptureJob>, plan: &CapturePlan) -> Vec<CaptureResult> {
        let workers = plan.max_workers.max(1).min(batch.len());
        let queue = Mutex::new(batch);
        let results = Mutex::new(Vec::new());

        join_all((0..workers).map(|index| self.worker(index, &queue, &results, plan))).await;

        let mut results = results.into_inner().unwrap_or_else(PoisonError::into_inner);
        let unstarted = queue.into_inner().unwrap_or_else(PoisonError::into_inner);
        results.extend(unstarted.into_iter().map(|job| {
            CaptureResult::skipped(&job.id, job.url.as_str(), &job.group, "cancelled")
        }));
        results
    }

    async fn worker(
        &self,
        index: usize,
        queue: &Mutex<VecDeque<CaptureJob>>,
        results: &Mutex<Vec<CaptureResult>>,
        plan: &CapturePlan,
    ) {
        let mut context: Option<Box<dyn RenderContext>> = None;
        let mut first = true;

        loop {
            if !first && !plan.delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(plan.delay) => {}
                    _ = self.cancel.cancelled() => break,
                }
            }
            first = false;

            if self.cancel.is_cancelled() {
                break;
            }
            let Some(job) = lock(queue).pop_front() else {
                break;
            };

            debug!("Worker {} capturing {} ({})", index, job.id, job.url);
            let result = self.process(&job, &mut context, plan).await;
            lock(results).push(result);
        }

        if let Some(mut ctx) = context {
            if let Err(e) = ctx.close().await {
                debug!("Worker {} failed to close its context: {}", index, e);
            }
        }
    }

    /// Runs one job to its single result
    async fn process(
        &self,
        job: &CaptureJob,
        context: &mut Option<Box<dyn RenderContext>>,
        plan: &CapturePlan,
    ) -> CaptureResult {
        let started = Instant::now();
        let mut last_error = String::new();
        let mut attempts = 0;

        for attempt in 1..=MAX_ATTEMPTS {
            attempts = attempt;
            if attempt > 1 {
                warn!("Retrying {} with a fresh render context", job.url);
            }

            if context.is_none() {
                match self.backend.new_context().await {
                    Ok(ctx) => *context = Some(ctx),
                    Err(e) => {
                        warn!("Failed to create a render context for {}: {}", job.url, e);
                        last_error = e.to_string();
                        continue;
                    }
                }
            }
            let Some(ctx) = context.as_mut() else {
                continue;
            };

            let outcome =
                tokio::time::timeout(plan.job_timeout, self.attempt(ctx.as_mut(), job, plan)).await;
            let error = match outcome {
                Ok(Ok(shots)) => {
                    info!("Captured {} in {:.2}s", job.url, started.elapsed().as_secs_f64());
                    return CaptureResult::succeeded(job, shots, attempt, started.elapsed());
                }
                Ok(Err(e)) => e,
                Err(_) => NewsprintError::Timeout {
                    url: job.url.to_string(),
                },
            };

            // A failed attempt leaves nothing behind for the retry to reuse
            self.layout.remove_job_files(job, plan.format).await;
            if let Some(mut ctx) = context.take() {
                if let Err(e) = ctx.close().await {
                    debug!("Failed to close render context: {}", e);
                }
            }

            warn!("Attempt {} for {} failed: {}", attempt, job.url, error);
            last_error = error.to_string();
            if !error.is_retryable() {
                break;
            }
        }

        error!("Capture of {} failed: {}", job.url, last_error);
        CaptureResult::failed(job, last_error, attempts, started.elapsed())
    }

    /// Locates the content region of a rendered document
    fn detect_region(&self, html: &str, job: &CaptureJob) -> ContentRegion {
        let document = Html::parse_document(html);
        self.detector.detect(&document, job.domain())
    }

    /// One attempt: load, dismiss popups, encode the requested images and
    /// write them
    async fn attempt(
        &self,
        ctx: &mut dyn RenderContext,
        job: &CaptureJob,
        plan: &CapturePlan,
    ) -> Result<SavedShots> {
        let html = ctx.load(&job.url).await?;

        match ctx.dismiss_popups(&plan.popup_selectors).await {
            Ok(0) => {}
            Ok(n) => debug!("Dismissed {} popup element(s) on {}", n, job.url),
            Err(e) => warn!("Popup dismissal failed on {}: {}", job.url, e),
        }

        let mut shots = Shots {
            full_page: None,
            content: None,
        };

        if plan.mode.wants_full_page() {
            shots.full_page = Some(ctx.capture(RenderTarget::FullPage, plan.format).await?);
        }

        if plan.mode.wants_content() {
            let region = self.detect_region(&html, job);
            let strategy = region.strategy.to_string();
            shots.content = Some(match &region.target {
                RegionTarget::Selector(css) => {
                    match ctx.capture(RenderTarget::Element(css), plan.format).await {
                        Ok(bytes) => (bytes, strategy),
                        Err(e) => {
                            warn!(
                                "Region '{}' of {} could not be captured ({}); using the full page",
                                css, job.url, e
                            );
                            let bytes = match &shots.full_page {
                                Some(bytes) => bytes.clone(),
                                None => ctx.capture(RenderTarget::FullPage, plan.format).await?,
                            };
                            (bytes, "fallback".to_string())
                        }
                    }
                }
                RegionTarget::FullPage => {
                    let bytes = match &shots.full_page {
                        Some(bytes) => bytes.clone(),
                        None => ctx.capture(RenderTarget::FullPage, plan.format).await?,
                    };
                    (bytes, strategy)
                }
            });
        }

        self.save(job, shots, plan.format).await
    }

    async fn save(&self, job: &CaptureJob, shots: Shots, format: ImageFormat) -> Result<SavedShots> {
        let mut saved = SavedShots::default();

        if let Some(bytes) = shots.full_page {
            let path = self.layout.path_for(job, ShotKind::FullPage, format);
            self.layout.write(&path, &bytes).await?;
            saved.full_page = Some(path);
        }
        if let Some((bytes, strategy)) = shots.content {
            let path = self.layout.path_for(job, ShotKind::Content, format);
            self.layout.write(&path, &bytes).await?;
            saved.content = Some(path);
            saved.region_strategy = Some(strategy);
        }

        Ok(saved)
    }
}
