//! Capture configuration: worker pool sizing, tabular columns, popup
//! selectors and detector thresholds.

use crate::capture::{CaptureMode, ImageFormat};
use crate::detect::{DensityConfig, DetectorConfig};
use crate::{ConfigError, ValidationReport};
use scraper::Selector;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Capture configuration document as written on disk
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptureDocument {
    #[serde(default)]
    pub capture: CaptureSection,
    #[serde(default)]
    pub columns: ColumnMapping,
    #[serde(default)]
    pub popups: PopupSection,
    #[serde(default)]
    pub detector: DetectorSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureSection {
    pub output_dir: String,
    pub results_file: Option<String>,
    pub batch_size: i64,
    pub max_workers: i64,
    pub delay_ms: u64,
    pub job_timeout_secs: u64,
    pub mode: String,
    pub format: String,
    pub interleave_groups: bool,
    pub skip_completed: bool,
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            output_dir: "captures".to_string(),
            results_file: None,
            batch_size: 10,
            max_workers: 3,
            delay_ms: 2000,
            job_timeout_secs: 60,
            mode: "both".to_string(),
            format: "png".to_string(),
            interleave_groups: true,
            skip_completed: false,
        }
    }
}

/// Column names of the tabular capture input
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub url: String,
    pub id: String,
    pub group: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            url: "url".to_string(),
            id: "id".to_string(),
            group: "group".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PopupSection {
    pub selectors: Vec<String>,
}

impl Default for PopupSection {
    fn default() -> Self {
        Self {
            selectors: default_popup_selectors(),
        }
    }
}

/// Selectors for cookie banners, newsletter prompts and modal overlays
pub fn default_popup_selectors() -> Vec<String> {
    [
        ".popup",
        ".modal",
        ".cookie-banner",
        ".cookie-consent",
        ".gdpr",
        ".consent",
        ".newsletter-popup",
        "#newsletter-popup",
        ".subscribe-popup",
        ".popup-newsletter",
        ".overlay",
        ".modal-backdrop",
        ".popup-overlay",
        "[class*=\"popup\"]",
        "[id*=\"popup\"]",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Detector overrides; unset fields keep the built-in thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorSection {
    pub generic_min_text: Option<usize>,
    pub density_min_text: Option<usize>,
    pub min_paragraphs: Option<usize>,
    pub paragraph_weight: Option<f64>,
    pub score_floor: Option<f64>,
    pub generic_selectors: Option<Vec<String>>,
    /// Keep the built-in domain table and merge `domains` over it
    pub builtin_domains: bool,
    pub domains: BTreeMap<String, Vec<String>>,
}

impl Default for DetectorSection {
    fn default() -> Self {
        Self {
            generic_min_text: None,
            density_min_text: None,
            min_paragraphs: None,
            paragraph_weight: None,
            score_floor: None,
            generic_selectors: None,
            builtin_domains: true,
            domains: BTreeMap::new(),
        }
    }
}

/// Validated capture configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub settings: CaptureSettings,
    pub columns: ColumnMapping,
    pub popup_selectors: Vec<String>,
    pub detector: DetectorConfig,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        // The default document always validates
        match validate_capture(CaptureDocument::default()) {
            Ok(config) => config,
            Err(_) => Self {
                settings: CaptureSettings::default(),
                columns: ColumnMapping::default(),
                popup_selectors: default_popup_selectors(),
                detector: DetectorConfig::default(),
            },
        }
    }
}

/// Pool sizing and output settings of a capture run
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub output_dir: PathBuf,
    pub results_file: PathBuf,
    pub batch_size: usize,
    pub max_workers: usize,
    pub delay: Duration,
    pub job_timeout: Duration,
    pub mode: CaptureMode,
    pub format: ImageFormat,
    pub interleave_groups: bool,
    pub skip_completed: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("captures"),
            results_file: PathBuf::from("captures").join("results.csv"),
            batch_size: 10,
            max_workers: 3,
            delay: Duration::from_millis(2000),
            job_timeout: Duration::from_secs(60),
            mode: CaptureMode::Both,
            format: ImageFormat::Png,
            interleave_groups: true,
            skip_completed: false,
        }
    }
}

fn check_selectors(selectors: &[String], field: &str, report: &mut ValidationReport) {
    for (index, css) in selectors.iter().enumerate() {
        if let Err(e) = Selector::parse(css) {
            report.push(
                format!("{}[{}]", field, index),
                format!("invalid selector '{}': {}", css, e),
            );
        }
    }
}

/// Validates a capture document, collecting every offending field
pub fn validate_capture(doc: CaptureDocument) -> Result<CaptureConfig, ConfigError> {
    let mut report = ValidationReport::new();
    let section = &doc.capture;

    if section.output_dir.trim().is_empty() {
        report.push("capture.output_dir", "cannot be empty");
    }
    if section.batch_size < 1 {
        report.push(
            "capture.batch_size",
            format!("must be at least 1, got {}", section.batch_size),
        );
    }
    if section.max_workers < 1 || section.max_workers > 64 {
        report.push(
            "capture.max_workers",
            format!("must be between 1 and 64, got {}", section.max_workers),
        );
    }
    if section.job_timeout_secs == 0 {
        report.push("capture.job_timeout_secs", "must be greater than 0");
    }

    let mode = section
        .mode
        .parse::<CaptureMode>()
        .map_err(|e| report.push("capture.mode", e))
        .ok();
    let format = section
        .format
        .parse::<ImageFormat>()
        .map_err(|e| report.push("capture.format", e))
        .ok();

    for (field, value) in [
        ("columns.url", &doc.columns.url),
        ("columns.id", &doc.columns.id),
        ("columns.group", &doc.columns.group),
    ] {
        if value.trim().is_empty() {
            report.push(field, "column name cannot be empty");
        }
    }

    check_selectors(&doc.popups.selectors, "popups.selectors", &mut report);

    let detector = build_detector_config(&doc.detector, &mut report);

    report.into_result()?;

    let output_dir = PathBuf::from(section.output_dir.trim());
    let results_file = section
        .results_file
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| output_dir.join("results.csv"));

    Ok(CaptureConfig {
        settings: CaptureSettings {
            output_dir,
            results_file,
            batch_size: section.batch_size as usize,
            max_workers: section.max_workers as usize,
            delay: Duration::from_millis(section.delay_ms),
            job_timeout: Duration::from_secs(section.job_timeout_secs),
            mode: mode.unwrap_or_default(),
            format: format.unwrap_or_default(),
            interleave_groups: section.interleave_groups,
            skip_completed: section.skip_completed,
        },
        columns: doc.columns,
        popup_selectors: doc.popups.selectors,
        detector,
    })
}

fn build_detector_config(section: &DetectorSection, report: &mut ValidationReport) -> DetectorConfig {
    let mut config = DetectorConfig::default();
    if !section.builtin_domains {
        config.domain_selectors.clear();
    }

    for (domain, selectors) in &section.domains {
        check_selectors(selectors, &format!("detector.domains.{}", domain), report);
        config
            .domain_selectors
            .insert(domain.to_lowercase(), selectors.clone());
    }

    if let Some(generic) = &section.generic_selectors {
        check_selectors(generic, "detector.generic_selectors", report);
        config.generic_selectors = generic.clone();
    }

    if let Some(n) = section.generic_min_text {
        config.generic_min_text = n;
    }

    let density: &mut DensityConfig = &mut config.density;
    if let Some(n) = section.density_min_text {
        density.min_text_length = n;
    }
    if let Some(n) = section.min_paragraphs {
        density.min_paragraphs = n;
    }
    if let Some(w) = section.paragraph_weight {
        if !w.is_finite() || w < 0.0 {
            report.push(
                "detector.paragraph_weight",
                format!("must be a non-negative number, got {}", w),
            );
        }
        density.paragraph_weight = w;
    }
    if let Some(f) = section.score_floor {
        if !f.is_finite() || f < 0.0 {
            report.push(
                "detector.score_floor",
                format!("must be a non-negative number, got {}", f),
            );
        }
        density.score_floor = f;
    }

    config
}
