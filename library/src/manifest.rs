// This file's job is to model the remote release manifest: the JSON document
// enumerating every file of every build variant of the latest release.
// The manifest is produced by the release packaging tooling; we only consume
// it here.

use std::collections::BTreeMap;

use semver::Version;
use serde::{Deserialize, Serialize};

/// One file the update system knows about.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileEntry {
    /// Forward-slash-normalized path, relative to the install directory.
    /// Unique within one variant's file set.
    pub relative_path: String,
    /// Size in bytes of the file's contents.
    pub size: u64,
    /// Hex-encoded sha256 of the file's contents. Compared
    /// case-insensitively.
    pub digest: String,
    /// Version tag of the file's last change (semver-like).
    pub version: String,
    /// True if the running process holds this file open (the executable, a
    /// loaded plugin). Critical files can only be swapped across a restart.
    #[serde(default)]
    pub critical: bool,
}

/// One build flavor (e.g. "gpu" vs. "standard") with its own file set.
///
/// Files are keyed by `relative_path`. A `BTreeMap` keeps iteration order
/// deterministic, which keeps plan computation deterministic.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VariantInfo {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub files: BTreeMap<String, FileEntry>,
}

/// The remote description of what "up to date" means.
///
/// Unknown extra fields are ignored for forward compatibility; optional
/// fields default to empty.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Manifest {
    #[serde(default)]
    pub app_name: String,
    pub latest_version: String,
    /// Oldest installed version still eligible for incremental update.
    /// Installs older than this are flagged for full reinstall.
    #[serde(default)]
    pub minimum_version: String,
    /// Unix timestamp (seconds) of the release.
    #[serde(default)]
    pub release_date: u64,
    #[serde(default)]
    pub changelog_summary: String,
    #[serde(default)]
    pub changelog_url: String,
    #[serde(default)]
    pub variants: BTreeMap<String, VariantInfo>,
}

impl Manifest {
    /// Parses a manifest from its JSON body and validates its invariants.
    pub fn from_json(body: &str) -> anyhow::Result<Manifest> {
        let manifest: Manifest = serde_json::from_str(body)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Enforces the structural invariants we rely on downstream:
    /// - every relative path is traversal-safe,
    /// - map keys match their entry's `relative_path`,
    /// - no file claims a version newer than `latest_version`.
    fn validate(&self) -> anyhow::Result<()> {
        let latest = parse_version_lenient(&self.latest_version);
        for (variant_name, variant) in &self.variants {
            for (key, entry) in &variant.files {
                if key != &entry.relative_path {
                    anyhow::bail!(
                        "file key {:?} does not match relative_path {:?} in variant {:?}",
                        key,
                        entry.relative_path,
                        variant_name
                    );
                }
                if !is_safe_relative_path(&entry.relative_path) {
                    anyhow::bail!(
                        "unsafe relative path {:?} in variant {:?}",
                        entry.relative_path,
                        variant_name
                    );
                }
                if parse_version_lenient(&entry.version) > latest {
                    anyhow::bail!(
                        "file {:?} claims version {:?} newer than latest_version {:?}",
                        entry.relative_path,
                        entry.version,
                        self.latest_version
                    );
                }
            }
        }
        Ok(())
    }
}

/// True if `path` is a forward-slash relative path that stays inside the
/// install directory: no leading slash, no drive letters or backslashes, no
/// `.`/`..` segments, no empty segments.
pub fn is_safe_relative_path(path: &str) -> bool {
    if path.is_empty() || path.starts_with('/') || path.contains('\\') || path.contains(':') {
        return false;
    }
    path.split('/').all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}

/// Parses a version string, tolerating the empty string and junk by treating
/// them as 0.0.0 (a fresh install has no recorded version yet and must
/// compare older than everything).
pub fn parse_version_lenient(version: &str) -> Version {
    Version::parse(version.trim()).unwrap_or_else(|_| Version::new(0, 0, 0))
}
