// This file's job is to turn "what the server offers" and "what is on disk"
// into a concrete, ordered plan of files to add, update, and remove.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::cache::InstalledState;
use crate::config::UpdateConfig;
use crate::manifest::{parse_version_lenient, FileEntry, Manifest, VariantInfo};
use crate::network::NetworkFailure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    NetworkUnavailable,
    ServerError(u16),
    MalformedManifest(String),
    VariantUnavailable(String),
}

impl std::error::Error for CheckError {}

impl Display for CheckError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckError::NetworkUnavailable => write!(f, "Network unavailable"),
            CheckError::ServerError(code) => write!(f, "Server error: {code}"),
            CheckError::MalformedManifest(msg) => write!(f, "Malformed manifest: {msg}"),
            CheckError::VariantUnavailable(variant) => {
                write!(f, "Variant not offered by manifest: {variant}")
            }
        }
    }
}

/// The computed diff between the manifest and the installed state. Transient;
/// produced fresh by each check.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpdatePlan {
    pub new_version: String,
    /// Ordered: critical files first, manifest order within each class, so a
    /// cancelled download leaves the most essential files already staged.
    pub files_to_download: Vec<FileEntry>,
    /// Installed paths no longer present in the manifest.
    pub files_to_delete: Vec<String>,
    pub total_download_size: u64,
    /// True if any file to download is critical.
    pub requires_restart: bool,
    /// True when the installed version predates the manifest's
    /// `minimum_version`: incremental update logic is not supported from
    /// there, so the plan covers every variant file. Surfaced to the UI as
    /// "full reinstall".
    pub full_reinstall: bool,
    pub changelog_summary: String,
    pub changelog_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    UpToDate,
    UpdateAvailable(UpdatePlan),
}

/// Fetches the manifest and diffs it against `state`.
pub fn check_for_updates(
    config: &UpdateConfig,
    state: &InstalledState,
) -> Result<CheckOutcome, CheckError> {
    let body = (config.network_hooks.manifest_fetch_fn)(&config.manifest_url)
        .map_err(map_fetch_error)?;
    let manifest =
        Manifest::from_json(&body).map_err(|e| CheckError::MalformedManifest(e.to_string()))?;
    check_against_manifest(&manifest, &config.variant, state)
}

fn map_fetch_error(error: anyhow::Error) -> CheckError {
    match error.downcast_ref::<NetworkFailure>() {
        Some(NetworkFailure::Unreachable(_)) => CheckError::NetworkUnavailable,
        Some(NetworkFailure::Status(code)) => CheckError::ServerError(*code),
        None => CheckError::NetworkUnavailable,
    }
}

/// The pure half of the check, split out so tests can drive it without a
/// server. Never mutates `state`.
pub fn check_against_manifest(
    manifest: &Manifest,
    variant: &str,
    state: &InstalledState,
) -> Result<CheckOutcome, CheckError> {
    let variant_info = manifest
        .variants
        .get(variant)
        .ok_or_else(|| CheckError::VariantUnavailable(variant.to_string()))?;

    let latest = parse_version_lenient(&manifest.latest_version);
    let installed = parse_version_lenient(&state.current_version);
    if latest <= installed {
        return Ok(CheckOutcome::UpToDate);
    }

    // A fresh install has no recorded version and simply gets the full plan;
    // the reinstall gate only applies to installs old enough to predate the
    // incremental-update logic.
    let full_reinstall = !state.current_version.is_empty()
        && installed < parse_version_lenient(&manifest.minimum_version);

    Ok(CheckOutcome::UpdateAvailable(compute_plan(
        manifest,
        variant_info,
        state,
        full_reinstall,
    )))
}

fn file_needs_update(entry: &FileEntry, state: &InstalledState) -> bool {
    match state.files.get(&entry.relative_path) {
        None => true,
        Some(installed) => {
            !installed.digest.eq_ignore_ascii_case(&entry.digest)
                || installed.version != entry.version
        }
    }
}

fn compute_plan(
    manifest: &Manifest,
    variant_info: &VariantInfo,
    state: &InstalledState,
    full_reinstall: bool,
) -> UpdatePlan {
    let mut critical = Vec::new();
    let mut non_critical = Vec::new();
    for entry in variant_info.files.values() {
        if full_reinstall || file_needs_update(entry, state) {
            if entry.critical {
                critical.push(entry.clone());
            } else {
                non_critical.push(entry.clone());
            }
        }
    }
    let mut files_to_download = critical;
    files_to_download.append(&mut non_critical);

    let files_to_delete: Vec<String> = state
        .files
        .keys()
        .filter(|path| !variant_info.files.contains_key(*path))
        .cloned()
        .collect();

    let total_download_size = files_to_download.iter().map(|f| f.size).sum();
    let requires_restart = files_to_download.iter().any(|f| f.critical);

    UpdatePlan {
        new_version: manifest.latest_version.clone(),
        files_to_download,
        files_to_delete,
        total_download_size,
        requires_restart,
        full_reinstall,
        changelog_summary: manifest.changelog_summary.clone(),
        changelog_url: manifest.changelog_url.clone(),
    }
}
