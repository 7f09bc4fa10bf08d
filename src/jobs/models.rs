//! Job records, result rows and export filters for bulk processing.

use crate::core::error::AppError;
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One submitted row, keyed by the caller's column headers in their original order.
pub type InputRow = IndexMap<String, String>;

/// What a bulk job does with each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Verify,
    Find,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Verify => "verify",
            JobKind::Find => "find",
        }
    }

    /// Columns a submission of this kind must carry, in lower case.
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            JobKind::Verify => &["email"],
            JobKind::Find => &["firstname", "lastname", "domain"],
        }
    }

    pub(crate) fn starting_log(&self) -> &'static str {
        match self {
            JobKind::Verify => "Starting bulk verification...",
            JobKind::Find => "Starting bulk email finding...",
        }
    }

    pub(crate) fn completed_log(&self, total_rows: usize) -> String {
        match self {
            JobKind::Verify => format!("Completed verification of {} emails", total_rows),
            JobKind::Find => format!("Completed finding emails for {} records", total_rows),
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "verify" => Ok(JobKind::Verify),
            "find" => Ok(JobKind::Find),
            other => Err(AppError::Config(format!("Unknown job kind '{}'", other))),
        }
    }
}

/// `Processing` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Processing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The input row's fields followed by the appended outcome fields.
///
/// Fields keep insertion order. Setting an existing key replaces its value in
/// place, so an input column named `status` is overwritten by the outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRow {
    fields: Vec<(String, String)>,
}

impl ResultRow {
    pub fn from_input(row: &InputRow) -> Self {
        Self {
            fields: row.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of the appended `status` field.
    pub fn status(&self) -> Option<&str> {
        self.get("status")
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A bulk job. Written only by the runner executing it.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    pub source_filename: Option<String>,
    pub total_rows: usize,
    pub current_row: usize,
    pub progress: u8,
    pub status: JobStatus,
    pub log: String,
    pub results: Vec<ResultRow>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(
        id: impl Into<String>,
        kind: JobKind,
        total_rows: usize,
        source_filename: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            source_filename,
            total_rows,
            current_row: 0,
            progress: 0,
            status: JobStatus::Processing,
            log: kind.starting_log().to_string(),
            results: Vec::new(),
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Appends the result for the next row and advances progress.
    /// Ignored once the job is terminal.
    pub fn record_row(&mut self, row: ResultRow, log: String) {
        if self.status.is_terminal() {
            return;
        }
        self.results.push(row);
        self.current_row = self.results.len();
        let percent = if self.total_rows == 0 {
            100
        } else {
            (self.current_row * 100 / self.total_rows).min(100) as u8
        };
        self.progress = self.progress.max(percent);
        self.log = log;
    }

    pub fn complete(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Completed;
        self.log = self.kind.completed_log(self.total_rows);
        self.finished_at = Some(Utc::now());
    }

    /// Marks the job failed. Rows already recorded stay in `results`.
    pub fn fail(&mut self, error: &str) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Error;
        self.log = format!("Error: {}", error);
        self.finished_at = Some(Utc::now());
    }

    pub fn snapshot(&self) -> JobProgress {
        JobProgress {
            job_id: self.id.clone(),
            progress: self.progress,
            current_row: self.current_row,
            total_rows: self.total_rows,
            status: self.status,
            log: self.log.clone(),
        }
    }
}

/// Read-only progress view of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobProgress {
    pub job_id: String,
    pub progress: u8,
    pub current_row: usize,
    pub total_rows: usize,
    pub status: JobStatus,
    pub log: String,
}

/// Returned by a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReceipt {
    pub job_id: String,
    pub total_rows: usize,
}

/// Export filter over a job's result rows, matched on the `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultFilter {
    #[default]
    All,
    Valid,
    Risky,
    Invalid,
    Found,
    NotFound,
}

impl ResultFilter {
    fn status_tag(&self) -> Option<&'static str> {
        match self {
            ResultFilter::All => None,
            ResultFilter::Valid => Some("valid"),
            ResultFilter::Risky => Some("risky"),
            ResultFilter::Invalid => Some("invalid"),
            ResultFilter::Found => Some("found"),
            ResultFilter::NotFound => Some("not_found"),
        }
    }

    fn applies_to(&self, kind: JobKind) -> bool {
        match self {
            ResultFilter::All => false,
            ResultFilter::Valid | ResultFilter::Risky | ResultFilter::Invalid => {
                kind == JobKind::Verify
            }
            ResultFilter::Found | ResultFilter::NotFound => kind == JobKind::Find,
        }
    }

    /// A filter that does not apply to `kind` keeps every row.
    pub fn matches(&self, kind: JobKind, row: &ResultRow) -> bool {
        if !self.applies_to(kind) {
            return true;
        }
        row.status() == self.status_tag()
    }
}

impl FromStr for ResultFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(ResultFilter::All),
            "valid" => Ok(ResultFilter::Valid),
            "risky" => Ok(ResultFilter::Risky),
            "invalid" => Ok(ResultFilter::Invalid),
            "found" => Ok(ResultFilter::Found),
            "not_found" => Ok(ResultFilter::NotFound),
            other => Err(AppError::Config(format!("Unknown result filter '{}'", other))),
        }
    }
}
