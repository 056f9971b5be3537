//! Conversion job orchestration.
//!
//! Owns the converter locator, the per-job cancellation tokens, the status
//! map, and the cap on concurrently running converter subprocesses.

use crate::cancel::CancellationToken;
use crate::catalog::BookFormat;
use crate::config::ConversionConfig;
use crate::convert::job::run_job;
use crate::convert::locator::ConverterLocator;
use crate::convert::types::{ConversionRequest, JobState, JobStatus};
use crate::Result;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{error, info};

/// Status map for tracked jobs.
pub(crate) struct JobTracker {
    jobs: Mutex<HashMap<u64, JobStatus>>,
}

impl JobTracker {
    fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn insert(&self, status: JobStatus) {
        let mut jobs = self.jobs.lock().expect("job tracker lock poisoned");
        jobs.insert(status.job_id, status);
    }

    pub(crate) fn set_state(&self, job_id: u64, state: JobState) {
        let mut jobs = self.jobs.lock().expect("job tracker lock poisoned");
        if let Some(status) = jobs.get_mut(&job_id) {
            status.state = state;
        }
    }

    fn complete(&self, job_id: u64, output: PathBuf) {
        let mut jobs = self.jobs.lock().expect("job tracker lock poisoned");
        if let Some(status) = jobs.get_mut(&job_id) {
            status.state = JobState::Completed;
            status.output = Some(output);
        }
    }

    fn fail(&self, job_id: u64, message: String) {
        let mut jobs = self.jobs.lock().expect("job tracker lock poisoned");
        if let Some(status) = jobs.get_mut(&job_id) {
            status.state = JobState::Failed;
            status.error = Some(message);
        }
    }

    fn get(&self, job_id: u64) -> Option<JobStatus> {
        let jobs = self.jobs.lock().expect("job tracker lock poisoned");
        jobs.get(&job_id).cloned()
    }

    fn list_all(&self) -> Vec<JobStatus> {
        let jobs = self.jobs.lock().expect("job tracker lock poisoned");
        let mut all: Vec<JobStatus> = jobs.values().cloned().collect();
        all.sort_by_key(|status| status.job_id);
        all
    }
}

/// Orchestrates conversion jobs against the external converter.
pub struct ConversionManager {
    locator: Arc<ConverterLocator>,
    scratch_root: PathBuf,
    base_timeout: Duration,
    /// Caps concurrently running converter subprocesses.
    limiter: Semaphore,
    tracker: JobTracker,
    cancel_tokens: Mutex<HashMap<u64, CancellationToken>>,
    id_counter: AtomicU64,
}

impl ConversionManager {
    /// Create a manager whose jobs put their scratch directories under
    /// `scratch_root`.
    pub fn new(locator: Arc<ConverterLocator>, scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            locator,
            scratch_root: scratch_root.into(),
            base_timeout: ConversionConfig::BASE_TIMEOUT,
            limiter: Semaphore::new(ConversionConfig::MAX_CONCURRENT),
            tracker: JobTracker::new(),
            cancel_tokens: Mutex::new(HashMap::new()),
            id_counter: AtomicU64::new(0),
        }
    }

    /// Override the base subprocess timeout.
    pub fn with_base_timeout(mut self, timeout: Duration) -> Self {
        self.base_timeout = timeout;
        self
    }

    /// Whether a converter executable is currently resolvable.
    pub fn converter_available(&self) -> bool {
        self.locator.locate().is_some()
    }

    /// Run one conversion to completion.
    ///
    /// Blocks (asynchronously) until a subprocess slot is free, then until
    /// the job reaches a terminal state. The returned job is also visible in
    /// [`jobs`](Self::jobs) for introspection and cancellation.
    pub async fn convert(&self, request: ConversionRequest) -> Result<PathBuf> {
        let job_id = self.id_counter.fetch_add(1, Ordering::Relaxed) + 1;
        self.tracker.insert(JobStatus::pending(job_id, &request));

        let cancel_token = CancellationToken::new();
        {
            let mut tokens = self.cancel_tokens.lock().expect("cancel_tokens lock poisoned");
            tokens.insert(job_id, cancel_token.clone());
        }

        let permit = self.limiter.acquire().await.expect("limiter never closed");

        info!(
            "Starting conversion job {}: {} -> {}",
            job_id,
            request.source.display(),
            request.target_format
        );

        let result = run_job(
            job_id,
            &request,
            &self.locator,
            &cancel_token,
            &self.scratch_root,
            self.base_timeout,
            &self.tracker,
        )
        .await;
        drop(permit);

        match &result {
            Ok(path) => self.tracker.complete(job_id, path.clone()),
            Err(crate::BiblioError::ConversionCancelled) => {
                self.tracker.set_state(job_id, JobState::Cancelled)
            }
            Err(e) => {
                error!("Conversion job {} failed: {}", job_id, e);
                self.tracker.fail(job_id, e.to_string());
            }
        }

        let mut tokens = self.cancel_tokens.lock().expect("cancel_tokens lock poisoned");
        tokens.remove(&job_id);

        result
    }

    /// Convert one source into several targets, sequentially.
    ///
    /// Targets equal to the source format are skipped. Each target gets its
    /// own job and its own typed outcome; one failure does not abort the
    /// rest.
    pub async fn convert_to_targets(
        &self,
        source: &Path,
        source_format: BookFormat,
        dest_dir: &Path,
        targets: &[BookFormat],
    ) -> BTreeMap<BookFormat, Result<PathBuf>> {
        let mut outcomes = BTreeMap::new();
        for &target in targets {
            if target == source_format {
                continue;
            }
            let request =
                ConversionRequest::new(source, source_format, target, dest_dir);
            outcomes.insert(target, self.convert(request).await);
        }
        outcomes
    }

    /// Request cancellation of a running job. Returns `false` if the job is
    /// unknown or already terminal.
    pub fn cancel(&self, job_id: u64) -> bool {
        let tokens = self.cancel_tokens.lock().expect("cancel_tokens lock poisoned");
        match tokens.get(&job_id) {
            Some(token) => {
                token.cancel();
                info!("Requested cancellation of conversion job {}", job_id);
                true
            }
            None => false,
        }
    }

    /// Status of one job.
    pub fn status(&self, job_id: u64) -> Option<JobStatus> {
        self.tracker.get(job_id)
    }

    /// All tracked jobs, oldest first.
    pub fn jobs(&self) -> Vec<JobStatus> {
        self.tracker.list_all()
    }
}
