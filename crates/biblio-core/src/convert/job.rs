//! Execution of a single conversion job.
//!
//! Turns a `ConversionRequest` into an output file by invoking the external
//! converter as a subprocess: locate -> (extract) -> invoke -> verify. The
//! per-job scratch directory is a `TempDir` guard, so extraction artifacts
//! are removed on every exit path, including timeout and cancellation.

use crate::cancel::CancellationToken;
use crate::config::ConversionConfig;
use crate::convert::extract::extract_source_document;
use crate::convert::locator::ConverterLocator;
use crate::convert::manager::JobTracker;
use crate::convert::types::{ConversionRequest, JobState};
use crate::{BiblioError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Run one conversion end to end.
///
/// Typed failures: `ConverterUnavailable` before any subprocess is spawned;
/// `CorruptArchive`/`NoMatchingMember`/`SourceUnreadable` for source
/// problems; `ConversionFailed` (carrying captured stderr) for a non-zero
/// exit or a missing/empty output; `ConversionTimedOut` and
/// `ConversionCancelled` after force-killing the subprocess.
pub(crate) async fn run_job(
    job_id: u64,
    request: &ConversionRequest,
    locator: &ConverterLocator,
    cancel_token: &CancellationToken,
    scratch_root: &Path,
    base_timeout: Duration,
    tracker: &JobTracker,
) -> Result<PathBuf> {
    tracker.set_state(job_id, JobState::Locating);
    cancel_token.check()?;

    let converter = locator
        .locate()
        .ok_or(BiblioError::ConverterUnavailable)?;

    if !request.source.exists() {
        return Err(BiblioError::SourceUnreadable {
            message: format!("source file missing: {}", request.source.display()),
        });
    }

    // Holds the scratch directory alive until the job returns; dropping it
    // removes the extraction artifacts no matter how we exit.
    let mut scratch_guard: Option<TempDir> = None;

    let invoked_source = if request.is_archived_source() {
        tracker.set_state(job_id, JobState::Extracting);
        cancel_token.check()?;

        std::fs::create_dir_all(scratch_root)
            .map_err(|e| BiblioError::io_with_path(e, scratch_root))?;
        let scratch = tempfile::Builder::new()
            .prefix("convert-")
            .tempdir_in(scratch_root)
            .map_err(|e| BiblioError::io_with_path(e, scratch_root))?;

        let extracted = extract_source_document(&request.source, scratch.path())?;
        scratch_guard = Some(scratch);
        extracted
    } else {
        request.source.clone()
    };

    tracker.set_state(job_id, JobState::Invoking);
    cancel_token.check()?;

    let source_size = std::fs::metadata(&invoked_source).ok().map(|m| m.len());
    let timeout = conversion_timeout(base_timeout, source_size);

    let output_path = request.output_path_for(&invoked_source);
    std::fs::create_dir_all(&request.dest_dir)
        .map_err(|e| BiblioError::io_with_path(e, &request.dest_dir))?;

    debug!(
        "Job {}: {} {} -> {}",
        job_id,
        converter.display(),
        invoked_source.display(),
        output_path.display()
    );

    let mut child = Command::new(&converter)
        .arg(&invoked_source)
        .arg(&output_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| BiblioError::ConversionFailed {
            message: format!("failed to spawn converter: {e}"),
        })?;

    // Drain stderr concurrently so a chatty converter can't fill the pipe.
    let mut stderr = child.stderr.take().expect("stderr was piped");
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr.read_to_end(&mut buf).await.ok();
        String::from_utf8_lossy(&buf).into_owned()
    });

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    let mut cancel_poll = tokio::time::interval(ConversionConfig::CANCEL_POLL_INTERVAL);

    let status = loop {
        tokio::select! {
            status = child.wait() => {
                break status.map_err(|e| BiblioError::ConversionFailed {
                    message: format!("converter process error: {e}"),
                })?;
            }
            _ = &mut deadline => {
                child.kill().await.ok();
                warn!("Job {}: converter exceeded {:?}, killed", job_id, timeout);
                return Err(BiblioError::ConversionTimedOut(timeout));
            }
            _ = cancel_poll.tick() => {
                if cancel_token.is_cancelled() {
                    child.kill().await.ok();
                    info!("Job {}: cancelled, converter killed", job_id);
                    return Err(BiblioError::ConversionCancelled);
                }
            }
        }
    };

    let stderr_text = stderr_task.await.unwrap_or_default();

    if !status.success() {
        warn!("Job {}: converter stderr: {}", job_id, stderr_text.trim());
        return Err(BiblioError::ConversionFailed {
            message: format!(
                "converter exited with status {}: {}",
                status.code().unwrap_or(-1),
                stderr_text.trim()
            ),
        });
    }

    let output_size = std::fs::metadata(&output_path).map(|m| m.len()).unwrap_or(0);
    if output_size == 0 {
        warn!(
            "Job {}: converter exited cleanly but output is missing or empty: {}",
            job_id,
            output_path.display()
        );
        return Err(BiblioError::ConversionFailed {
            message: format!(
                "converter produced no output at {}",
                output_path.display()
            ),
        });
    }

    drop(scratch_guard);
    info!("Job {}: produced {}", job_id, output_path.display());
    Ok(output_path)
}

/// Effective subprocess timeout: the configured base plus an allowance
/// scaled by the source size, when known.
fn conversion_timeout(base: Duration, source_size: Option<u64>) -> Duration {
    match source_size {
        Some(len) => {
            let mib = (len / (1024 * 1024)).min(u64::from(u32::MAX)) as u32;
            base + ConversionConfig::TIMEOUT_PER_MIB * mib
        }
        None => base,
    }
}
