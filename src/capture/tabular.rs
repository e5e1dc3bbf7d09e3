//! Tabular capture input and results index (CSV)

use crate::capture::result::ResultRow;
use crate::capture::{CaptureJob, CaptureResult};
use crate::config::ColumnMapping;
use crate::{ConfigError, Result, ValidationReport};
use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use url::Url;

/// Jobs read from a table, plus results for rows that cannot become jobs
#[derive(Debug, Default)]
pub struct TabularInput {
    pub jobs: Vec<CaptureJob>,
    pub skipped: Vec<CaptureResult>,
}

/// Replaces every character outside `[A-Za-z0-9_.-]` with `_`
pub fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// Identifier for a row without one: the first 12 hex chars of SHA-256(url)
pub fn default_job_id(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(digest)[..12].to_string()
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name))
}

/// Reads capture jobs from CSV
///
/// The URL column is required; the identifier and grouping columns fall back
/// to [`default_job_id`] and the URL host. Rows whose URL is missing or not
/// http(s), rows repeating an earlier identifier, and rows whose sanitized
/// group and identifier would reuse another job's output files become
/// skipped results.
///
/// # Arguments
///
/// * `reader` - CSV source with a header row
/// * `columns` - Names of the URL, identifier and grouping columns
pub fn read_jobs<R: Read>(reader: R, columns: &ColumnMapping) -> Result<TabularInput> {
    let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv.headers()?.clone();

    let Some(url_col) = column_index(&headers, &columns.url) else {
        let mut report = ValidationReport::new();
        report.push(
            "columns.url",
            format!("column '{}' not found in the input header", columns.url),
        );
        return Err(ConfigError::Invalid(report).into());
    };
    let id_col = column_index(&headers, &columns.id);
    let group_col = column_index(&headers, &columns.group);

    let mut input = TabularInput::default();
    let mut seen_ids = HashSet::new();
    let mut output_owners: HashMap<(String, String), String> = HashMap::new();

    for (row, record) in csv.records().enumerate() {
        let record = record?;
        let cell = |index: Option<usize>| {
            index
                .and_then(|i| record.get(i))
                .map(str::trim)
                .unwrap_or_default()
                .to_string()
        };

        let raw_url = cell(Some(url_col));
        let mut id = cell(id_col);
        if id.is_empty() {
            id = default_job_id(&raw_url);
        }
        let group = cell(group_col);

        let url = match Url::parse(&raw_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => url,
            _ => {
                tracing::warn!("Row {}: skipping unsupported URL '{}'", row + 1, raw_url);
                input.skipped.push(CaptureResult::skipped(
                    &id,
                    &raw_url,
                    &group,
                    format!("unsupported URL '{}'", raw_url),
                ));
                continue;
            }
        };

        let group = if group.is_empty() {
            url.host_str().unwrap_or_default().to_string()
        } else {
            group
        };

        if !seen_ids.insert(id.clone()) {
            input.skipped.push(CaptureResult::skipped(
                &id,
                url.as_str(),
                &group,
                format!("duplicate identifier '{}'", id),
            ));
            continue;
        }

        let output_key = (sanitize_label(&group), sanitize_label(&id));
        if let Some(owner) = output_owners.get(&output_key) {
            input.skipped.push(CaptureResult::skipped(
                &id,
                url.as_str(),
                &group,
                format!("output files of '{}' would overwrite those of '{}'", id, owner),
            ));
            continue;
        }
        output_owners.insert(output_key, id.clone());

        input.jobs.push(CaptureJob::new(id, url, group));
    }

    Ok(input)
}

/// Reads capture jobs from a CSV file
pub fn read_jobs_from_path(path: &Path, columns: &ColumnMapping) -> Result<TabularInput> {
    let file = File::open(path)?;
    read_jobs(file, columns)
}

/// Writes the results index, one row per job
pub fn write_results(path: &Path, results: &[CaptureResult]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for result in results {
        writer.serialize(ResultRow::from(result))?;
    }
    writer.flush()?;
    Ok(())
}

/// Identifiers recorded as successful in an earlier results index
///
/// A missing file means nothing has been captured yet.
pub fn load_completed_ids(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut completed = HashSet::new();
    for row in reader.deserialize::<ResultRow>() {
        let row = row?;
        if row.success {
            completed.insert(row.id);
        }
    }
    Ok(completed)
}

/// Orders jobs round-robin by group so consecutive jobs hit different origins
///
/// Groups are visited in order of first appearance; order within a group is
/// preserved.
pub fn interleave_by_group(jobs: Vec<CaptureJob>) -> Vec<CaptureJob> {
    let total = jobs.len();
    let mut groups: IndexMap<String, VecDeque<CaptureJob>> = IndexMap::new();
    for job in jobs {
        groups.entry(job.group.clone()).or_default().push_back(job);
    }

    let mut ordered = Vec::with_capacity(total);
    while ordered.len() < total {
        for queue in groups.values_mut() {
            if let Some(job) = queue.pop_front() {
                ordered.push(job);
            }
        }
    }
    ordered
}
