//! Types for format conversion operations.

use crate::catalog::BookFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Request to convert one source document into a target format.
///
/// Immutable once constructed; a job consumes it and produces either an
/// output path or a typed failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConversionRequest {
    /// Source document, or a ZIP archive containing one.
    pub source: PathBuf,
    pub source_format: BookFormat,
    pub target_format: BookFormat,
    /// Directory the output file is placed in.
    pub dest_dir: PathBuf,
}

impl ConversionRequest {
    pub fn new(
        source: impl Into<PathBuf>,
        source_format: BookFormat,
        target_format: BookFormat,
        dest_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source: source.into(),
            source_format,
            target_format,
            dest_dir: dest_dir.into(),
        }
    }

    /// Whether the source is an archive that must be extracted first.
    pub fn is_archived_source(&self) -> bool {
        self.source
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
    }

    /// Expected output path for the document actually handed to the
    /// converter (the bare source, or the extracted archive member).
    pub fn output_path_for(&self, invoked_source: &Path) -> PathBuf {
        let stem = invoked_source
            .file_stem()
            .unwrap_or_else(|| invoked_source.as_os_str());
        self.dest_dir
            .join(stem)
            .with_extension(self.target_format.as_str())
    }
}

/// Phase of a conversion job.
///
/// `Pending -> Locating -> (Extracting) -> Invoking -> Completed | Failed`,
/// with `Cancelled` reachable from any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Locating,
    Extracting,
    Invoking,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// Whether the job has reached a terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

/// Observable status of a tracked conversion job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JobStatus {
    pub job_id: u64,
    pub source: PathBuf,
    pub target_format: BookFormat,
    pub state: JobState,
    /// Failure description when `state` is `Failed`.
    #[serde(default)]
    pub error: Option<String>,
    /// Output file when `state` is `Completed`.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl JobStatus {
    pub fn pending(job_id: u64, request: &ConversionRequest) -> Self {
        Self {
            job_id,
            source: request.source.clone(),
            target_format: request.target_format,
            state: JobState::Pending,
            error: None,
            output: None,
        }
    }
}
