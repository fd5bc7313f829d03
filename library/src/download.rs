// This file's job is the verified-download pipeline: stream each file of a
// plan into the staging directory, verify it against its expected digest,
// and report progress. Staging is all-or-nothing: one file's terminal
// failure discards the whole staging directory, so everything that survives
// this phase has already been verified.

use std::fmt::{Display, Formatter};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::checker::UpdatePlan;
use crate::config::UpdateConfig;
use crate::hash;
use crate::network::{file_download_url, manifest_base_url};

/// How many times one file is attempted before its failure aborts the plan.
/// Covers both transport errors and digest mismatches.
const DOWNLOAD_ATTEMPTS: u32 = 3;

/// Streaming copy chunk size.
const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Progress is emitted at file boundaries and at most once per this many
/// bytes within a single large file, never per chunk.
const PROGRESS_EMIT_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    NetworkInterrupted(String),
    /// Digest still wrong after all attempts. Carries the relative path.
    IntegrityFailure(String),
    DiskFull,
    Cancelled,
}

impl std::error::Error for DownloadError {}

impl Display for DownloadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadError::NetworkInterrupted(msg) => write!(f, "Download interrupted: {msg}"),
            DownloadError::IntegrityFailure(path) => {
                write!(f, "Digest mismatch after retries: {path}")
            }
            DownloadError::DiskFull => write!(f, "Disk full while staging download"),
            DownloadError::Cancelled => write!(f, "Download cancelled"),
        }
    }
}

/// Ephemeral, per-download-session progress. Byte counts are cumulative
/// across the whole plan, not per-file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    pub current_file_name: String,
    pub file_index: usize,
    pub file_count: usize,
    pub bytes_downloaded: u64,
    pub total_bytes: u64,
}

/// Cooperative cancellation flag, checked between files and per chunk within
/// a file. Cloneable so the UI thread can hold one end.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// ERROR_DISK_FULL on windows, ENOSPC everywhere else.
#[cfg(windows)]
const DISK_FULL_OS_ERROR: i32 = 112;
#[cfg(not(windows))]
const DISK_FULL_OS_ERROR: i32 = 28;

fn map_io_error(error: std::io::Error) -> DownloadError {
    // Other local write failures are reported as an interrupted transfer
    // since they abort the stream the same way.
    if error.raw_os_error() == Some(DISK_FULL_OS_ERROR) {
        DownloadError::DiskFull
    } else {
        DownloadError::NetworkInterrupted(error.to_string())
    }
}

/// Downloads every file in `plan` into `staging_dir`, in plan order.
/// On any error (including cancellation) the staging directory is removed
/// before returning, so a failed plan leaves nothing behind.
pub fn download_plan(
    plan: &UpdatePlan,
    config: &UpdateConfig,
    staging_dir: &Path,
    cancel: &CancellationToken,
    on_progress: &mut dyn FnMut(&DownloadProgress),
) -> Result<(), DownloadError> {
    let result = download_plan_inner(plan, config, staging_dir, cancel, on_progress);
    if result.is_err() {
        discard_staging(staging_dir);
    }
    result
}

fn download_plan_inner(
    plan: &UpdatePlan,
    config: &UpdateConfig,
    staging_dir: &Path,
    cancel: &CancellationToken,
    on_progress: &mut dyn FnMut(&DownloadProgress),
) -> Result<(), DownloadError> {
    let base_url = manifest_base_url(&config.manifest_url)
        .map_err(|e| DownloadError::NetworkInterrupted(e.to_string()))?;
    let file_count = plan.files_to_download.len();
    let total_bytes = plan.total_download_size;
    let mut completed_bytes: u64 = 0;

    for (index, entry) in plan.files_to_download.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let url = file_download_url(&base_url, &plan.new_version, &config.variant, &entry.relative_path)
            .map_err(|e| DownloadError::NetworkInterrupted(e.to_string()))?;
        let staged_path = staging_dir.join(&entry.relative_path);

        let mut progress = DownloadProgress {
            current_file_name: entry.relative_path.clone(),
            file_index: index + 1,
            file_count,
            bytes_downloaded: completed_bytes,
            total_bytes,
        };
        on_progress(&progress);

        fetch_and_verify(
            config,
            &url,
            &staged_path,
            &entry.relative_path,
            &entry.digest,
            cancel,
            &mut |file_bytes| {
                progress.bytes_downloaded = completed_bytes + file_bytes;
                on_progress(&progress);
            },
        )?;

        completed_bytes += entry.size;
        progress.bytes_downloaded = completed_bytes;
        on_progress(&progress);
        soundloom_info!(
            "Staged {} ({}/{})",
            entry.relative_path,
            index + 1,
            file_count
        );
    }
    Ok(())
}

/// Downloads one file with bounded retries. Each attempt streams the body to
/// `<staged_path>.part`, renames on completion, then verifies the digest.
/// Cancellation and disk-full are terminal; everything else retries.
fn fetch_and_verify(
    config: &UpdateConfig,
    url: &str,
    staged_path: &Path,
    relative_path: &str,
    expected_digest: &str,
    cancel: &CancellationToken,
    on_file_bytes: &mut dyn FnMut(u64),
) -> Result<(), DownloadError> {
    let mut last_error =
        DownloadError::NetworkInterrupted("no download attempts were made".to_string());
    for attempt in 1..=DOWNLOAD_ATTEMPTS {
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        match stream_to_path(config, url, staged_path, cancel, on_file_bytes) {
            Ok(()) => match hash::verify_file(staged_path, expected_digest) {
                Ok(true) => return Ok(()),
                Ok(false) => {
                    soundloom_warn!(
                        "Digest mismatch for {} (attempt {}/{})",
                        relative_path,
                        attempt,
                        DOWNLOAD_ATTEMPTS
                    );
                    let _ = fs::remove_file(staged_path);
                    last_error = DownloadError::IntegrityFailure(relative_path.to_string());
                }
                Err(e) => {
                    let _ = fs::remove_file(staged_path);
                    last_error = DownloadError::NetworkInterrupted(e.to_string());
                }
            },
            Err(DownloadError::Cancelled) => return Err(DownloadError::Cancelled),
            Err(DownloadError::DiskFull) => return Err(DownloadError::DiskFull),
            Err(e) => {
                soundloom_warn!(
                    "Download failed for {} (attempt {}/{}): {}",
                    relative_path,
                    attempt,
                    DOWNLOAD_ATTEMPTS,
                    e
                );
                last_error = e;
            }
        }
    }
    Err(last_error)
}

/// Streams one response body to `path`, writing to a `.part` sibling and
/// renaming once the stream completes, so a crash or cancel never leaves a
/// half-written file at the final path.
fn stream_to_path(
    config: &UpdateConfig,
    url: &str,
    path: &Path,
    cancel: &CancellationToken,
    on_file_bytes: &mut dyn FnMut(u64),
) -> Result<(), DownloadError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(map_io_error)?;
    }
    let part_path = part_path_for(path);

    let mut body = (config.network_hooks.download_stream_fn)(url)
        .map_err(|e| DownloadError::NetworkInterrupted(e.to_string()))?;

    let write_result = (|| -> Result<(), DownloadError> {
        let mut file = fs::File::create(&part_path).map_err(map_io_error)?;
        let mut buffer = [0u8; COPY_CHUNK_SIZE];
        let mut written: u64 = 0;
        let mut last_emitted: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }
            let n = body
                .read(&mut buffer)
                .map_err(|e| DownloadError::NetworkInterrupted(e.to_string()))?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n]).map_err(map_io_error)?;
            written += n as u64;
            if written - last_emitted >= PROGRESS_EMIT_BYTES {
                last_emitted = written;
                on_file_bytes(written);
            }
        }
        file.flush().map_err(map_io_error)?;
        Ok(())
    })();

    if let Err(e) = write_result {
        let _ = fs::remove_file(&part_path);
        return Err(e);
    }
    fs::rename(&part_path, path).map_err(map_io_error)?;
    Ok(())
}

fn part_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Removes whatever a failed or cancelled plan left in staging.
pub fn discard_staging(staging_dir: &Path) {
    if staging_dir.exists() {
        if let Err(e) = fs::remove_dir_all(staging_dir) {
            soundloom_warn!("Failed to discard staging dir {:?}: {}", staging_dir, e);
        }
    }
}
