//! Integration tests for the capture orchestrator
//!
//! A scripted render backend stands in for the browser so batching,
//! retries, timeouts and cancellation can be observed deterministically.

use async_trait::async_trait;
use newsprint::capture::{
    load_completed_ids, read_jobs, write_results, CaptureJob, CaptureMode, CaptureOrchestrator,
    CapturePlan, CaptureStatus, ImageFormat, OutputLayout, RenderBackend, RenderContext,
    RenderTarget,
};
use newsprint::config::ColumnMapping;
use newsprint::detect::ContentDetector;
use newsprint::{NewsprintError, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

const ARTICLE: &str = r#"<html><body>
    <nav><a href="/">Home</a></nav>
    <article>
        <p>The council approved the new budget after a long debate on Tuesday evening.</p>
        <p>Members discussed transport, schools and housing before the final vote.</p>
        <p>The mayor said the plan would be reviewed again at the end of the year.</p>
        <p>Residents can read the full document on the city website from Monday.</p>
        <p>Opposition members asked for more detail on the housing commitments.</p>
    </article>
</body></html>"#;

/// Observations shared by every context of a backend
#[derive(Default)]
struct Counters {
    contexts: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    loads: Mutex<HashMap<String, usize>>,
}

/// Behaviour is chosen by URL path:
/// - `/flaky...` fails its first load
/// - `/broken...` always fails
/// - `/hang...` never finishes loading
struct ScriptedBackend {
    counters: Arc<Counters>,
    load_time: Duration,
}

struct ScriptedContext {
    counters: Arc<Counters>,
    load_time: Duration,
}

impl ScriptedBackend {
    fn new(load_time: Duration) -> (Arc<Self>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let backend = Arc::new(Self {
            counters: Arc::clone(&counters),
            load_time,
        });
        (backend, counters)
    }
}

#[async_trait]
impl RenderBackend for ScriptedBackend {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        self.counters.contexts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedContext {
            counters: Arc::clone(&self.counters),
            load_time: self.load_time,
        }))
    }
}

fn render_error(url: &Url, message: &str) -> NewsprintError {
    NewsprintError::Render {
        url: url.to_string(),
        message: message.to_string(),
    }
}

#[async_trait]
impl RenderContext for ScriptedContext {
    async fn load(&mut self, url: &Url) -> Result<String> {
        let count = {
            let mut loads = self.counters.loads.lock().unwrap();
            let count = loads.entry(url.path().to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(now, Ordering::SeqCst);
        if url.path().starts_with("/hang") {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        tokio::time::sleep(self.load_time).await;
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);

        if url.path().starts_with("/broken") {
            return Err(render_error(url, "page crashed"));
        }
        if url.path().starts_with("/flaky") && count == 1 {
            return Err(render_error(url, "connection reset"));
        }
        Ok(ARTICLE.to_string())
    }

    async fn dismiss_popups(&mut self, selectors: &[String]) -> Result<usize> {
        Ok(selectors.len().min(1))
    }

    async fn capture(&mut self, target: RenderTarget<'_>, format: ImageFormat) -> Result<Vec<u8>> {
        Ok(match target {
            RenderTarget::FullPage => format!("full-page.{}", format.extension()).into_bytes(),
            RenderTarget::Element(css) => format!("element:{}", css).into_bytes(),
        })
    }
}

fn job(path: &str, group: &str) -> CaptureJob {
    let id = path.trim_start_matches('/').replace('/', "-");
    CaptureJob::new(
        id,
        Url::parse(&format!("https://{}{}", group, path)).unwrap(),
        group,
    )
}

fn plan(batch_size: usize, max_workers: usize) -> CapturePlan {
    CapturePlan {
        batch_size,
        max_workers,
        delay: Duration::ZERO,
        job_timeout: Duration::from_secs(5),
        mode: CaptureMode::Both,
        format: ImageFormat::Png,
        popup_selectors: vec![".popup".to_string()],
    }
}

fn orchestrator(backend: Arc<ScriptedBackend>, dir: &Path) -> CaptureOrchestrator {
    CaptureOrchestrator::new(backend, ContentDetector::default(), OutputLayout::new(dir))
}

/// Every regular file under `dir`
fn files_under(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files
}

#[tokio::test]
async fn test_batches_and_worker_bound() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, counters) = ScriptedBackend::new(Duration::from_millis(20));
    let orch = orchestrator(backend, dir.path());

    let jobs: Vec<_> = (0..5).map(|i| job(&format!("/story/{}", i), "a.example.com")).collect();
    let run = orch.run(jobs, &plan(2, 1)).await;

    assert_eq!(run.batch_sizes, vec![2, 2, 1]);
    assert_eq!(run.results.len(), 5);
    assert_eq!(run.count(CaptureStatus::Succeeded), 5);
    assert_eq!(counters.peak.load(Ordering::SeqCst), 1);

    let result = &run.results[0];
    let full = result.full_page_path.as_ref().unwrap();
    let content = result.content_path.as_ref().unwrap();
    assert!(full.starts_with(dir.path().join("a.example.com").join("fullpage")));
    assert!(content.starts_with(dir.path().join("a.example.com").join("content")));
    assert_eq!(std::fs::read(content).unwrap(), b"element:article");
    assert_eq!(result.region_strategy.as_deref(), Some("generic-pattern"));

    assert_eq!(files_under(dir.path()).len(), 10);
}

#[tokio::test]
async fn test_worker_pool_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, counters) = ScriptedBackend::new(Duration::from_millis(30));
    let orch = orchestrator(backend, dir.path());

    let jobs: Vec<_> = (0..8).map(|i| job(&format!("/story/{}", i), "g.example.com")).collect();
    let run = orch.run(jobs, &plan(8, 3)).await;

    assert_eq!(run.count(CaptureStatus::Succeeded), 8);
    let peak = counters.peak.load(Ordering::SeqCst);
    assert!(peak >= 2 && peak <= 3, "peak concurrency {}", peak);
    assert_eq!(counters.contexts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_failed_attempt_retried_with_fresh_context() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, counters) = ScriptedBackend::new(Duration::ZERO);
    let orch = orchestrator(backend, dir.path());

    let run = orch.run(vec![job("/flaky/1", "b.example.com")], &plan(1, 1)).await;

    let result = &run.results[0];
    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(result.attempts, 2);
    assert_eq!(counters.contexts.load(Ordering::SeqCst), 2);

    let files = files_under(dir.path());
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|f| !f.to_string_lossy().ends_with(".part")));
}

#[tokio::test]
async fn test_persistent_failure_recorded_once() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, _counters) = ScriptedBackend::new(Duration::ZERO);
    let orch = orchestrator(backend, dir.path());

    let jobs = vec![
        job("/broken/1", "c.example.com"),
        job("/story/1", "c.example.com"),
    ];
    let run = orch.run(jobs, &plan(2, 2)).await;

    assert_eq!(run.results.len(), 2);
    let failed: Vec<_> = run
        .results
        .iter()
        .filter(|r| r.status == CaptureStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].job_id, "broken-1");
    assert_eq!(failed[0].attempts, 2);
    assert!(failed[0].error.as_deref().unwrap().contains("page crashed"));
    assert!(failed[0].full_page_path.is_none());
    assert_eq!(run.count(CaptureStatus::Succeeded), 1);
}

#[tokio::test]
async fn test_job_timeout_is_a_job_failure() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, _counters) = ScriptedBackend::new(Duration::ZERO);
    let orch = orchestrator(backend, dir.path());

    let mut plan = plan(2, 2);
    plan.job_timeout = Duration::from_millis(100);
    let jobs = vec![job("/hang/1", "d.example.com"), job("/story/1", "d.example.com")];
    let run = orch.run(jobs, &plan).await;

    let hung = run.results.iter().find(|r| r.job_id == "hang-1").unwrap();
    assert_eq!(hung.status, CaptureStatus::Failed);
    assert!(hung.error.as_deref().unwrap().contains("timeout"));
    assert!(run
        .results
        .iter()
        .any(|r| r.job_id == "story-1" && r.is_success()));
}

#[tokio::test]
async fn test_cancellation_skips_unstarted_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, _counters) = ScriptedBackend::new(Duration::from_millis(50));
    let orch = orchestrator(backend, dir.path());

    let token = orch.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(70)).await;
        token.cancel();
    });

    let jobs: Vec<_> = (0..6).map(|i| job(&format!("/story/{}", i), "e.example.com")).collect();
    let run = orch.run(jobs, &plan(2, 1)).await;

    assert!(run.cancelled);
    assert_eq!(run.results.len(), 6);
    let ids: HashSet<_> = run.results.iter().map(|r| r.job_id.clone()).collect();
    assert_eq!(ids.len(), 6);
    assert!(run.count(CaptureStatus::Succeeded) >= 1);
    let skipped: Vec<_> = run
        .results
        .iter()
        .filter(|r| r.status == CaptureStatus::Skipped)
        .collect();
    assert!(!skipped.is_empty());
    assert!(skipped.iter().all(|r| r.error.as_deref() == Some("cancelled")));
}

#[tokio::test]
async fn test_tabular_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, _counters) = ScriptedBackend::new(Duration::ZERO);
    let orch = orchestrator(backend, &dir.path().join("shots"));

    let input = "\
address,key,source
https://f.example.com/story/1,one,f
https://f.example.com/broken/2,two,f
mailto:editor@example.com,three,f
";
    let columns = ColumnMapping {
        url: "address".to_string(),
        id: "key".to_string(),
        group: "source".to_string(),
    };
    let tabular = read_jobs(input.as_bytes(), &columns).unwrap();
    assert_eq!(tabular.jobs.len(), 2);
    assert_eq!(tabular.skipped.len(), 1);

    let mut run = orch.run(tabular.jobs, &plan(10, 2)).await;
    run.results.extend(tabular.skipped);

    let results_file = dir.path().join("results.csv");
    write_results(&results_file, &run.results).unwrap();

    let completed = load_completed_ids(&results_file).unwrap();
    assert_eq!(completed, HashSet::from(["one".to_string()]));

    let mut reader = csv::Reader::from_path(&results_file).unwrap();
    assert_eq!(reader.records().count(), 3);
}
