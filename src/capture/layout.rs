use crate::capture::{sanitize_label, CaptureJob, ImageFormat};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Kind of image a job writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShotKind {
    FullPage,
    Content,
}

impl ShotKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::FullPage => "fullpage",
            Self::Content => "content",
        }
    }
}

/// Output tree: `<root>/<group>/<fullpage|content>/<id>.<ext>`
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, job: &CaptureJob, kind: ShotKind, format: ImageFormat) -> PathBuf {
        self.root
            .join(sanitize_label(&job.group))
            .join(kind.dir_name())
            .join(format!("{}.{}", sanitize_label(&job.id), format.extension()))
    }

    fn partial_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".part");
        path.with_file_name(name)
    }

    /// Writes `bytes` to `path`; readers never observe a half-written file
    pub async fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let partial = Self::partial_path(path);
        fs::write(&partial, bytes).await?;
        fs::rename(&partial, path).await
    }

    /// Removes every file a job may have produced, including leftovers of an
    /// interrupted write
    pub async fn remove_job_files(&self, job: &CaptureJob, format: ImageFormat) {
        for kind in [ShotKind::FullPage, ShotKind::Content] {
            let path = self.path_for(job, kind, format);
            for candidate in [Self::partial_path(&path), path] {
                match fs::remove_file(&candidate).await {
                    Ok(()) => tracing::debug!("Removed {}", candidate.display()),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => tracing::warn!("Failed to remove {}: {}", candidate.display(), e),
                }
            }
        }
    }
}
