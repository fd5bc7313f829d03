// This file's job is to move verified staged files into the live install
// directory. Non-critical files are hot-swapped immediately; critical files
// (the executable, loaded plugins) are left staged behind a durable marker
// that is consumed as the very first action on the next launch, before the
// app re-opens its locked resources.

use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::cache::{disk_io, InstalledStateStore};
use crate::checker::UpdatePlan;
use crate::config::UpdateConfig;
use crate::hash;

/// Where the pending-update marker is stored, inside `storage_dir`.
const PENDING_UPDATE_FILE_NAME: &str = "pending_update.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// The copy into the install directory failed (permissions, file in
    /// use). Logged and skipped; the next check cycle re-detects the file.
    CopyFailed(String, String),
    /// A file the plan expected is missing from the staging directory.
    StagingIncomplete(String),
    /// The pending-update marker could not be persisted. Plan-level: without
    /// it the critical files would never land.
    MarkerWriteFailed(String),
}

impl std::error::Error for ApplyError {}

impl Display for ApplyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyError::CopyFailed(path, reason) => write!(f, "Copy failed for {path}: {reason}"),
            ApplyError::StagingIncomplete(path) => {
                write!(f, "Staged file missing for {path}")
            }
            ApplyError::MarkerWriteFailed(reason) => {
                write!(f, "Failed to write pending update marker: {reason}")
            }
        }
    }
}

/// One critical file recorded in the pending-update marker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PendingFile {
    pub relative_path: String,
    /// Absolute path of the verified staged copy.
    pub staged_path: PathBuf,
    pub version: String,
    pub digest: String,
}

/// The durable "apply these files as the very first action on next launch"
/// record. Survives process exit by design; file-based rather than IPC.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PendingUpdate {
    pub new_version: String,
    pub files: Vec<PendingFile>,
    /// Deletions that could not be performed while the app was running.
    pub deferred_deletes: Vec<String>,
    /// Whether the immediate apply pass completed without per-file failures.
    /// When false, `current_version` stays put even after the deferred files
    /// land, so the next check re-detects whatever failed.
    pub bump_version: bool,
}

pub fn pending_update_path(config: &UpdateConfig) -> PathBuf {
    config.storage_dir.join(PENDING_UPDATE_FILE_NAME)
}

pub fn load_pending_update(config: &UpdateConfig) -> Option<PendingUpdate> {
    disk_io::read(&pending_update_path(config)).ok()
}

/// What one apply pass did. Per-file failures are reported, not fatal.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: Vec<String>,
    pub deleted: Vec<String>,
    pub failed: Vec<ApplyError>,
    /// Critical files left staged behind the marker.
    pub deferred: Vec<String>,
}

impl ApplyReport {
    pub fn fully_applied(&self) -> bool {
        self.failed.is_empty() && self.deferred.is_empty()
    }
}

/// Applies a fully staged, fully verified plan.
///
/// Non-critical files and deletions are handled immediately; critical files
/// are recorded in the pending-update marker. Per file, the copy happens
/// before the installed-state record is updated, so a crash in between is
/// self-healing: the next check simply re-detects the file.
pub fn apply_updates(
    plan: &UpdatePlan,
    staging_dir: &Path,
    config: &UpdateConfig,
    store: &InstalledStateStore,
) -> Result<ApplyReport, ApplyError> {
    let mut report = ApplyReport::default();
    let mut pending_files = Vec::new();

    for entry in &plan.files_to_download {
        let staged_path = staging_dir.join(&entry.relative_path);
        if !staged_path.exists() {
            soundloom_error!("Staged file missing: {}", entry.relative_path);
            report
                .failed
                .push(ApplyError::StagingIncomplete(entry.relative_path.clone()));
            continue;
        }
        if entry.critical {
            pending_files.push(PendingFile {
                relative_path: entry.relative_path.clone(),
                staged_path,
                version: entry.version.clone(),
                digest: entry.digest.clone(),
            });
            report.deferred.push(entry.relative_path.clone());
            continue;
        }
        match place_file(&staged_path, &entry.relative_path, config) {
            Ok(()) => {
                report.applied.push(entry.relative_path.clone());
                store
                    .record_file_installed(&entry.relative_path, &entry.version, &entry.digest)
                    .unwrap_or_else(|e| {
                        soundloom_warn!("Failed to record {}: {}", entry.relative_path, e)
                    });
            }
            Err(e) => {
                soundloom_warn!("Skipping {}: {}", entry.relative_path, e);
                report.failed.push(e);
            }
        }
    }

    // Deletions: attempt immediately; a path the OS refuses to remove while
    // the app runs is deferred with the critical files.
    let mut deferred_deletes = Vec::new();
    for relative_path in &plan.files_to_delete {
        match delete_installed_file(relative_path, config, store) {
            Ok(()) => report.deleted.push(relative_path.clone()),
            Err(e) => {
                soundloom_warn!("Deferring deletion of {}: {}", relative_path, e);
                deferred_deletes.push(relative_path.clone());
            }
        }
    }

    if !pending_files.is_empty() || !deferred_deletes.is_empty() {
        let pending = PendingUpdate {
            new_version: plan.new_version.clone(),
            files: pending_files,
            deferred_deletes,
            bump_version: report.failed.is_empty(),
        };
        disk_io::write(&pending, &pending_update_path(config))
            .map_err(|e| ApplyError::MarkerWriteFailed(e.to_string()))?;
        soundloom_info!(
            "Pending update marker written: {} file(s) apply on next launch",
            pending.files.len()
        );
    } else if report.failed.is_empty() {
        // Everything landed; the install is now at the new version.
        store
            .set_current_version(&plan.new_version)
            .unwrap_or_else(|e| soundloom_warn!("Failed to record new version: {}", e));
    }

    Ok(report)
}

fn place_file(
    staged_path: &Path,
    relative_path: &str,
    config: &UpdateConfig,
) -> Result<(), ApplyError> {
    let install_path = config.install_dir.join(relative_path);
    if let Some(parent) = install_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| ApplyError::CopyFailed(relative_path.to_string(), e.to_string()))?;
    }
    // Copy, not move: staged files may still be needed by the marker path,
    // and re-running the apply after a crash must keep working.
    fs::copy(staged_path, &install_path)
        .map_err(|e| ApplyError::CopyFailed(relative_path.to_string(), e.to_string()))?;
    Ok(())
}

fn delete_installed_file(
    relative_path: &str,
    config: &UpdateConfig,
    store: &InstalledStateStore,
) -> anyhow::Result<()> {
    let install_path = config.install_dir.join(relative_path);
    match fs::remove_file(&install_path) {
        Ok(()) => {}
        // Already gone is as good as deleted.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("remove {install_path:?}")),
    }
    store.record_file_removed(relative_path)?;
    Ok(())
}

/// Consumes the pending-update marker. Must run as the very first launch
/// action, before the app opens the resources the marker's files replace.
///
/// Returns true if a marker was found and consumed. Tolerates the relaunch
/// helper having already moved some files: a missing staged copy whose
/// destination verifies against the recorded digest is simply recorded.
pub fn finalize_pending_update(
    config: &UpdateConfig,
    store: &InstalledStateStore,
) -> anyhow::Result<bool> {
    let marker_path = pending_update_path(config);
    let pending: PendingUpdate = match disk_io::read(&marker_path) {
        Ok(pending) => pending,
        Err(_) => return Ok(false),
    };
    soundloom_info!(
        "Consuming pending update marker ({} file(s))",
        pending.files.len()
    );

    let mut all_landed = true;
    for file in &pending.files {
        let install_path = config.install_dir.join(&file.relative_path);
        if file.staged_path.exists() {
            if let Some(parent) = install_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&file.staged_path, &install_path)
                .with_context(|| format!("apply pending file {}", file.relative_path))?;
        } else if !matches!(hash::verify_file(&install_path, &file.digest), Ok(true)) {
            // Neither staged nor already in place: leave the record stale so
            // the next check re-downloads this file.
            soundloom_error!(
                "Pending file {} is neither staged nor applied",
                file.relative_path
            );
            all_landed = false;
            continue;
        }
        store.record_file_installed(&file.relative_path, &file.version, &file.digest)?;
    }

    for relative_path in &pending.deferred_deletes {
        if let Err(e) = delete_installed_file(relative_path, config, store) {
            soundloom_warn!("Deferred deletion of {} failed: {}", relative_path, e);
        }
    }

    if all_landed && pending.bump_version {
        store.set_current_version(&pending.new_version)?;
    }
    fs::remove_file(&marker_path).with_context(|| format!("remove marker {marker_path:?}"))?;
    crate::download::discard_staging(&config.staging_dir());
    Ok(true)
}

/// Writes the short-lived helper that performs the restart-coordinated swap:
/// wait for the app process to exit, move the staged critical files into
/// place, relaunch. The marker itself is left for `finalize_pending_update`
/// to consume (it records the installed files and clears the marker).
pub fn write_relaunch_helper(
    config: &UpdateConfig,
    pending: &PendingUpdate,
    executable: &Path,
    parent_pid: u32,
) -> anyhow::Result<PathBuf> {
    let script_path = config.storage_dir.join(relaunch_helper_name());
    let script = render_relaunch_script(config, pending, executable, parent_pid);
    fs::write(&script_path, script)
        .with_context(|| format!("write relaunch helper {script_path:?}"))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755))?;
    }
    Ok(script_path)
}

/// Spawns the relaunch helper detached; the caller is expected to exit the
/// process promptly afterwards.
pub fn spawn_relaunch_helper(script_path: &Path) -> anyhow::Result<()> {
    #[cfg(unix)]
    let mut command = {
        let mut c = std::process::Command::new("sh");
        c.arg(script_path);
        c
    };
    #[cfg(windows)]
    let mut command = {
        let mut c = std::process::Command::new("cmd");
        c.arg("/C").arg(script_path);
        c
    };
    command
        .spawn()
        .with_context(|| format!("spawn relaunch helper {script_path:?}"))?;
    Ok(())
}

fn relaunch_helper_name() -> &'static str {
    #[cfg(windows)]
    {
        "soundloom_relaunch.bat"
    }
    #[cfg(not(windows))]
    {
        "soundloom_relaunch.sh"
    }
}

#[cfg(not(windows))]
fn render_relaunch_script(
    config: &UpdateConfig,
    pending: &PendingUpdate,
    executable: &Path,
    parent_pid: u32,
) -> String {
    fn sh_quote(path: &Path) -> String {
        format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
    }
    let mut script = String::from("#!/bin/sh\n# Soundloom update helper.\n");
    script.push_str(&format!(
        "while kill -0 {parent_pid} 2>/dev/null; do sleep 1; done\n"
    ));
    for file in &pending.files {
        let dest = config.install_dir.join(&file.relative_path);
        if let Some(parent) = dest.parent() {
            script.push_str(&format!("mkdir -p {}\n", sh_quote(parent)));
        }
        script.push_str(&format!(
            "mv -f {} {}\n",
            sh_quote(&file.staged_path),
            sh_quote(&dest)
        ));
    }
    for relative_path in &pending.deferred_deletes {
        let dest = config.install_dir.join(relative_path);
        script.push_str(&format!("rm -f {}\n", sh_quote(&dest)));
    }
    script.push_str(&format!("exec {}\n", sh_quote(executable)));
    script
}

#[cfg(windows)]
fn render_relaunch_script(
    config: &UpdateConfig,
    pending: &PendingUpdate,
    executable: &Path,
    parent_pid: u32,
) -> String {
    let mut script = String::from("@echo off\r\nrem Soundloom update helper.\r\n:wait\r\n");
    script.push_str(&format!(
        "tasklist /FI \"PID eq {parent_pid}\" | find \"{parent_pid}\" >nul && (timeout /t 1 /nobreak >nul & goto wait)\r\n"
    ));
    for file in &pending.files {
        let dest = config.install_dir.join(&file.relative_path);
        script.push_str(&format!(
            "move /Y \"{}\" \"{}\"\r\n",
            file.staged_path.display(),
            dest.display()
        ));
    }
    for relative_path in &pending.deferred_deletes {
        let dest = config.install_dir.join(relative_path);
        script.push_str(&format!("del /F /Q \"{}\"\r\n", dest.display()));
    }
    script.push_str(&format!("start \"\" \"{}\"\r\n", executable.display()));
    script
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempdir::TempDir;

    use crate::cache::InstalledStateStore;
    use crate::checker::UpdatePlan;
    use crate::config::UpdateConfig;
    use crate::manifest::FileEntry;

    use super::{apply_updates, finalize_pending_update, load_pending_update, ApplyError};

    fn sha256_hex(data: &[u8]) -> String {
        use sha2::{Digest, Sha256};
        hex::encode(Sha256::digest(data))
    }

    struct Fixture {
        _temp_dir: TempDir,
        config: UpdateConfig,
        store: InstalledStateStore,
        staging: std::path::PathBuf,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new("apply_test").unwrap();
        let config = UpdateConfig::new(
            temp_dir.path().join("install"),
            temp_dir.path().join("storage"),
            "https://updates.soundloom.app/releases/manifest.json",
            "standard",
        );
        let staging = config.staging_dir();
        std::fs::create_dir_all(&config.install_dir).unwrap();
        std::fs::create_dir_all(&staging).unwrap();
        let store = InstalledStateStore::load_or_new_on_error(&config.storage_dir, "standard");
        Fixture {
            _temp_dir: temp_dir,
            config,
            store,
            staging,
        }
    }

    fn stage_file(staging: &Path, relative_path: &str, data: &[u8]) {
        let path = staging.join(relative_path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    fn entry(path: &str, data: &[u8], critical: bool) -> FileEntry {
        FileEntry {
            relative_path: path.to_string(),
            size: data.len() as u64,
            digest: sha256_hex(data),
            version: "1.1.0".to_string(),
            critical,
        }
    }

    fn plan_for(files: Vec<FileEntry>, deletes: Vec<&str>) -> UpdatePlan {
        let total = files.iter().map(|f| f.size).sum();
        let requires_restart = files.iter().any(|f| f.critical);
        UpdatePlan {
            new_version: "1.1.0".to_string(),
            files_to_download: files,
            files_to_delete: deletes.into_iter().map(String::from).collect(),
            total_download_size: total,
            requires_restart,
            full_reinstall: false,
            changelog_summary: String::new(),
            changelog_url: String::new(),
        }
    }

    #[test]
    fn immediate_apply_places_files_and_records_state() {
        let f = fixture();
        stage_file(&f.staging, "presets/warm.slpreset", b"preset data");
        let plan = plan_for(vec![entry("presets/warm.slpreset", b"preset data", false)], vec![]);

        let report = apply_updates(&plan, &f.staging, &f.config, &f.store).unwrap();

        assert!(report.fully_applied());
        assert_eq!(
            std::fs::read(f.config.install_dir.join("presets/warm.slpreset")).unwrap(),
            b"preset data"
        );
        let state = f.store.snapshot();
        assert_eq!(state.current_version, "1.1.0");
        assert_eq!(
            state.files["presets/warm.slpreset"].digest,
            sha256_hex(b"preset data")
        );
        assert!(load_pending_update(&f.config).is_none());
    }

    #[test]
    fn apply_is_idempotent() {
        let f = fixture();
        stage_file(&f.staging, "a.dat", b"data");
        let plan = plan_for(vec![entry("a.dat", b"data", false)], vec![]);

        apply_updates(&plan, &f.staging, &f.config, &f.store).unwrap();
        let first = f.store.snapshot();
        apply_updates(&plan, &f.staging, &f.config, &f.store).unwrap();
        let second = f.store.snapshot();

        assert_eq!(first.current_version, second.current_version);
        assert_eq!(first.files.keys().collect::<Vec<_>>(), second.files.keys().collect::<Vec<_>>());
        assert_eq!(
            std::fs::read(f.config.install_dir.join("a.dat")).unwrap(),
            b"data"
        );
    }

    #[test]
    fn critical_files_are_deferred_behind_a_marker() {
        let f = fixture();
        stage_file(&f.staging, "bin/soundloom", b"new binary");
        stage_file(&f.staging, "b.dat", b"new data");
        let plan = plan_for(
            vec![
                entry("bin/soundloom", b"new binary", true),
                entry("b.dat", b"new data", false),
            ],
            vec![],
        );

        let report = apply_updates(&plan, &f.staging, &f.config, &f.store).unwrap();

        // Non-critical benefit lands immediately.
        assert_eq!(report.applied, vec!["b.dat".to_string()]);
        assert_eq!(report.deferred, vec!["bin/soundloom".to_string()]);
        assert!(!f.config.install_dir.join("bin/soundloom").exists());
        // Version not bumped until the critical file lands.
        assert_eq!(f.store.snapshot().current_version, "");

        let pending = load_pending_update(&f.config).unwrap();
        assert_eq!(pending.new_version, "1.1.0");
        assert_eq!(pending.files.len(), 1);
        assert!(pending.files[0].staged_path.exists());
    }

    #[test]
    fn finalize_consumes_the_marker_before_next_launch() {
        let f = fixture();
        stage_file(&f.staging, "bin/soundloom", b"new binary");
        let plan = plan_for(vec![entry("bin/soundloom", b"new binary", true)], vec![]);
        apply_updates(&plan, &f.staging, &f.config, &f.store).unwrap();

        let consumed = finalize_pending_update(&f.config, &f.store).unwrap();

        assert!(consumed);
        assert_eq!(
            std::fs::read(f.config.install_dir.join("bin/soundloom")).unwrap(),
            b"new binary"
        );
        let state = f.store.snapshot();
        assert_eq!(state.current_version, "1.1.0");
        assert!(state.files.contains_key("bin/soundloom"));
        assert!(load_pending_update(&f.config).is_none());
        // Second call is a no-op.
        assert!(!finalize_pending_update(&f.config, &f.store).unwrap());
    }

    #[test]
    fn finalize_tolerates_helper_having_moved_the_file() {
        let f = fixture();
        stage_file(&f.staging, "bin/soundloom", b"new binary");
        let plan = plan_for(vec![entry("bin/soundloom", b"new binary", true)], vec![]);
        apply_updates(&plan, &f.staging, &f.config, &f.store).unwrap();

        // Simulate the relaunch helper: move staged file into place, leave
        // the marker behind.
        let pending = load_pending_update(&f.config).unwrap();
        let dest = f.config.install_dir.join("bin/soundloom");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::rename(&pending.files[0].staged_path, &dest).unwrap();

        assert!(finalize_pending_update(&f.config, &f.store).unwrap());
        let state = f.store.snapshot();
        assert_eq!(state.current_version, "1.1.0");
        assert!(state.files.contains_key("bin/soundloom"));
    }

    #[test]
    fn missing_staged_file_fails_only_that_file() {
        let f = fixture();
        stage_file(&f.staging, "present.dat", b"here");
        let plan = plan_for(
            vec![
                entry("missing.dat", b"gone", false),
                entry("present.dat", b"here", false),
            ],
            vec![],
        );

        let report = apply_updates(&plan, &f.staging, &f.config, &f.store).unwrap();

        assert_eq!(report.applied, vec!["present.dat".to_string()]);
        assert_eq!(
            report.failed,
            vec![ApplyError::StagingIncomplete("missing.dat".to_string())]
        );
        // Partial apply does not bump the version; next check re-detects.
        assert_eq!(f.store.snapshot().current_version, "");
    }

    #[test]
    fn failed_file_is_redetected_after_the_restart_path() {
        let f = fixture();
        stage_file(&f.staging, "bin/soundloom", b"new binary");
        // The preset never reaches staging, so its apply fails.
        let plan = plan_for(
            vec![
                entry("bin/soundloom", b"new binary", true),
                entry("presets/init.slpreset", b"preset data", false),
            ],
            vec![],
        );

        let report = apply_updates(&plan, &f.staging, &f.config, &f.store).unwrap();
        assert_eq!(
            report.failed,
            vec![ApplyError::StagingIncomplete(
                "presets/init.slpreset".to_string()
            )]
        );
        assert!(finalize_pending_update(&f.config, &f.store).unwrap());

        // The critical file landed, but the version must not advance past
        // the failed file, or the next check would short-circuit to
        // up-to-date and the preset would be lost for good.
        let state = f.store.snapshot();
        assert!(state.files.contains_key("bin/soundloom"));
        assert_eq!(state.current_version, "");

        let mut files = std::collections::BTreeMap::new();
        for e in &plan.files_to_download {
            files.insert(e.relative_path.clone(), e.clone());
        }
        let mut variants = std::collections::BTreeMap::new();
        variants.insert(
            "standard".to_string(),
            crate::manifest::VariantInfo {
                display_name: "Standard".to_string(),
                files,
            },
        );
        let manifest = crate::manifest::Manifest {
            app_name: "Soundloom".to_string(),
            latest_version: "1.1.0".to_string(),
            minimum_version: String::new(),
            release_date: 0,
            changelog_summary: String::new(),
            changelog_url: String::new(),
            variants,
        };
        match crate::checker::check_against_manifest(&manifest, "standard", &state).unwrap() {
            crate::checker::CheckOutcome::UpdateAvailable(next) => {
                let paths: Vec<&str> = next
                    .files_to_download
                    .iter()
                    .map(|f| f.relative_path.as_str())
                    .collect();
                assert_eq!(paths, vec!["presets/init.slpreset"]);
            }
            crate::checker::CheckOutcome::UpToDate => {
                panic!("failed file was never re-detected")
            }
        }
    }

    #[test]
    fn deletions_remove_files_and_state_entries() {
        let f = fixture();
        std::fs::write(f.config.install_dir.join("old.dat"), b"old").unwrap();
        f.store
            .record_file_installed("old.dat", "1.0.0", "aa")
            .unwrap();
        let plan = plan_for(vec![], vec!["old.dat"]);

        let report = apply_updates(&plan, &f.staging, &f.config, &f.store).unwrap();

        assert_eq!(report.deleted, vec!["old.dat".to_string()]);
        assert!(!f.config.install_dir.join("old.dat").exists());
        assert!(!f.store.snapshot().files.contains_key("old.dat"));
    }

    #[test]
    fn deleting_an_already_missing_file_succeeds() {
        let f = fixture();
        f.store
            .record_file_installed("gone.dat", "1.0.0", "aa")
            .unwrap();
        let plan = plan_for(vec![], vec!["gone.dat"]);
        let report = apply_updates(&plan, &f.staging, &f.config, &f.store).unwrap();
        assert_eq!(report.deleted, vec!["gone.dat".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn relaunch_script_waits_moves_and_relaunches() {
        let f = fixture();
        stage_file(&f.staging, "bin/soundloom", b"new binary");
        let plan = plan_for(vec![entry("bin/soundloom", b"new binary", true)], vec![]);
        apply_updates(&plan, &f.staging, &f.config, &f.store).unwrap();
        let pending = load_pending_update(&f.config).unwrap();

        let script_path = super::write_relaunch_helper(
            &f.config,
            &pending,
            Path::new("/opt/soundloom/bin/soundloom"),
            4242,
        )
        .unwrap();

        let script = std::fs::read_to_string(&script_path).unwrap();
        assert!(script.contains("kill -0 4242"));
        assert!(script.contains("mv -f"));
        assert!(script.ends_with("exec '/opt/soundloom/bin/soundloom'\n"));
        // The helper must not remove the marker; finalize consumes it.
        assert!(!script.contains("pending_update.json"));
    }

    #[test]
    fn marker_round_trips_through_disk() {
        let f = fixture();
        let pending = super::PendingUpdate {
            new_version: "2.0.0".to_string(),
            files: vec![super::PendingFile {
                relative_path: "bin/soundloom".to_string(),
                staged_path: f.staging.join("bin/soundloom"),
                version: "2.0.0".to_string(),
                digest: "aa".to_string(),
            }],
            deferred_deletes: vec!["old_plugin.so".to_string()],
            bump_version: true,
        };
        crate::cache::disk_io::write(&pending, &super::pending_update_path(&f.config)).unwrap();
        let loaded = load_pending_update(&f.config).unwrap();
        assert_eq!(loaded, pending);
    }
}
