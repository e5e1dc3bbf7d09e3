//! Capture Orchestrator
//!
//! Renders batches of article URLs to images. Each job loads its page
//! through a [`RenderContext`], dismisses popups, locates the article body
//! with the [`crate::detect::ContentDetector`] when the mode asks for it,
//! and writes `<output>/<group>/<fullpage|content>/<id>.<ext>`.

#[cfg(feature = "chromium")]
mod chromium;
mod job;
mod layout;
mod orchestrator;
mod render;
mod result;
mod tabular;

#[cfg(feature = "chromium")]
pub use chromium::ChromiumBackend;
pub use job::{CaptureJob, CaptureMode, ImageFormat};
pub use layout::{OutputLayout, ShotKind};
pub use orchestrator::{CaptureOrchestrator, CapturePlan, CaptureRun};
pub use render::{RenderBackend, RenderContext, RenderTarget};
pub use result::{CaptureResult, CaptureStatus, ResultRow, SavedShots};
pub use tabular::{
    default_job_id, interleave_by_group, load_completed_ids, read_jobs, read_jobs_from_path,
    sanitize_label, write_results, TabularInput,
};
