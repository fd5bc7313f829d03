// This file is the top-level orchestrator: the state machine that sequences
// check -> (user confirmation) -> download -> apply -> (restart or done),
// owns the user's update preferences, and exposes the callback surface the
// UI layer consumes. No component below this one shows UI.

use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[cfg(test)]
use mockall::automock;

use crate::apply::{self, ApplyError, ApplyReport};
use crate::cache::InstalledStateStore;
use crate::checker::{self, CheckError, CheckOutcome, UpdatePlan};
use crate::config::UpdateConfig;
use crate::download::{self, CancellationToken, DownloadError, DownloadProgress};
use crate::logging::init_logging;
use crate::time;

/// Startup auto-checks run at most this often.
const AUTO_CHECK_INTERVAL_SECONDS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// A check or download/apply cycle is already running.
    UpdateAlreadyInProgress,
    InvalidState(String),
    FailedToSaveState,
    Check(CheckError),
    Download(DownloadError),
    Apply(ApplyError),
}

impl std::error::Error for UpdateError {}

impl Display for UpdateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateError::UpdateAlreadyInProgress => write!(f, "Update already in progress"),
            UpdateError::InvalidState(msg) => write!(f, "Invalid state: {msg}"),
            UpdateError::FailedToSaveState => write!(f, "Failed to save state"),
            UpdateError::Check(e) => write!(f, "Check failed: {e}"),
            UpdateError::Download(e) => write!(f, "Download failed: {e}"),
            UpdateError::Apply(e) => write!(f, "Apply failed: {e}"),
        }
    }
}

/// The orchestrator's externally observable states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Idle,
    Checking,
    AwaitingConfirmation,
    Downloading,
    Applying,
    AwaitingRestart,
}

/// Events the (out-of-scope) UI layer subscribes to. All methods default to
/// no-ops so hosts only implement what they render.
#[cfg_attr(test, automock)]
pub trait UpdateCallbacks: Send + Sync {
    /// A plan is ready and awaits the user's decision.
    fn on_update_available(&self, _plan: &UpdatePlan) {}
    fn on_download_progress(&self, _progress: &DownloadProgress) {}
    fn on_download_complete(&self, _success: bool, _error: Option<DownloadError>) {}
    /// `success` is false if any file failed to apply; `requires_restart` is
    /// true when critical files are parked behind the pending marker.
    fn on_apply_complete(&self, _success: bool, _requires_restart: bool) {}
}

/// A callbacks implementation for hosts that poll state instead.
#[derive(Debug, Default)]
pub struct NoopCallbacks;
impl UpdateCallbacks for NoopCallbacks {}

struct ManagerInner {
    config: UpdateConfig,
    store: InstalledStateStore,
    callbacks: Box<dyn UpdateCallbacks>,
    /// Current state plus the plan waiting on user confirmation. Never held
    /// across blocking I/O.
    state: Mutex<StateCell>,
    /// Re-entrancy guard for the check and download/apply entry points. We
    /// try_lock instead of lock so a second trigger errors out immediately
    /// rather than queueing behind a running cycle.
    pipeline_lock: Mutex<()>,
}

struct StateCell {
    state: ManagerState,
    pending_plan: Option<UpdatePlan>,
    cancel: CancellationToken,
}

#[derive(Clone)]
pub struct UpdateManager {
    inner: Arc<ManagerInner>,
}

impl UpdateManager {
    pub fn new(config: UpdateConfig, callbacks: Box<dyn UpdateCallbacks>) -> Self {
        init_logging();
        let store = InstalledStateStore::load_or_new_on_error(&config.storage_dir, &config.variant);
        Self {
            inner: Arc::new(ManagerInner {
                config,
                store,
                callbacks,
                state: Mutex::new(StateCell {
                    state: ManagerState::Idle,
                    pending_plan: None,
                    cancel: CancellationToken::new(),
                }),
                pipeline_lock: Mutex::new(()),
            }),
        }
    }

    pub fn state(&self) -> ManagerState {
        self.cell().state
    }

    fn cell(&self) -> std::sync::MutexGuard<'_, StateCell> {
        self.inner.state.lock().expect("manager state lock")
    }

    fn set_state(&self, state: ManagerState) {
        self.cell().state = state;
    }

    /// Must run as the very first action on launch, before the host opens
    /// the resources a pending update replaces. Returns true if a pending
    /// update was finalized.
    pub fn finalize_pending_update(&self) -> anyhow::Result<bool> {
        apply::finalize_pending_update(&self.inner.config, &self.inner.store)
    }

    // Preferences -----------------------------------------------------------

    pub fn auto_check_enabled(&self) -> bool {
        self.inner.store.auto_check_enabled()
    }

    pub fn set_auto_check_enabled(&self, enabled: bool) -> Result<(), UpdateError> {
        self.inner
            .store
            .set_auto_check_enabled(enabled)
            .map_err(|_| UpdateError::FailedToSaveState)
    }

    /// Remembers that the user dismissed `version`; it will not be offered
    /// again. Clears the prompt if that version is the one awaiting
    /// confirmation.
    pub fn skip_version(&self, version: &str) -> Result<(), UpdateError> {
        self.inner
            .store
            .set_skipped_version(Some(version.to_string()))
            .map_err(|_| UpdateError::FailedToSaveState)?;
        let mut cell = self.cell();
        if cell.state == ManagerState::AwaitingConfirmation
            && cell
                .pending_plan
                .as_ref()
                .is_some_and(|plan| plan.new_version == version)
        {
            cell.pending_plan = None;
            cell.state = ManagerState::Idle;
        }
        Ok(())
    }

    /// "Remind me later": drop the prompt without persisting anything.
    pub fn dismiss_update(&self) {
        let mut cell = self.cell();
        if cell.state == ManagerState::AwaitingConfirmation {
            cell.pending_plan = None;
            cell.state = ManagerState::Idle;
        }
    }

    // Checking --------------------------------------------------------------

    /// Whether a startup auto-check should run now.
    fn startup_check_due(&self) -> bool {
        self.inner.store.auto_check_enabled()
            && time::unix_timestamp().saturating_sub(self.inner.store.last_check_timestamp())
                >= AUTO_CHECK_INTERVAL_SECONDS
    }

    /// Startup entry point: respects the auto-check preference and the
    /// once-per-24h throttle. Returns Ok(None) when no check was due.
    pub fn check_on_startup(&self) -> Result<Option<CheckOutcome>, UpdateError> {
        if !self.startup_check_due() {
            soundloom_debug!("Startup check not due, skipping");
            return Ok(None);
        }
        self.check_for_updates_manual().map(Some)
    }

    /// Manual entry point: always checks (no throttle), but still refuses to
    /// run while a download or apply is in flight.
    pub fn check_for_updates_manual(&self) -> Result<CheckOutcome, UpdateError> {
        let _busy = self
            .inner
            .pipeline_lock
            .try_lock()
            .map_err(|_| UpdateError::UpdateAlreadyInProgress)?;
        {
            let cell = self.cell();
            if cell.state != ManagerState::Idle && cell.state != ManagerState::AwaitingConfirmation
            {
                return Err(UpdateError::InvalidState(format!(
                    "cannot check while {:?}",
                    cell.state
                )));
            }
        }
        self.set_state(ManagerState::Checking);

        let snapshot = self.inner.store.snapshot();
        let result = checker::check_for_updates(&self.inner.config, &snapshot);
        self.inner
            .store
            .record_check_now()
            .unwrap_or_else(|e| soundloom_warn!("Failed to record check time: {}", e));

        match result {
            Ok(CheckOutcome::UpToDate) => {
                soundloom_info!("Already up to date ({})", snapshot.current_version);
                self.set_state(ManagerState::Idle);
                Ok(CheckOutcome::UpToDate)
            }
            Ok(CheckOutcome::UpdateAvailable(plan)) => {
                if snapshot.skipped_version.as_deref() == Some(plan.new_version.as_str()) {
                    // The user already dismissed this version; stay quiet.
                    soundloom_info!("Version {} was skipped by the user", plan.new_version);
                    self.set_state(ManagerState::Idle);
                    return Ok(CheckOutcome::UpToDate);
                }
                soundloom_info!(
                    "Update available: {} ({} file(s), {} bytes)",
                    plan.new_version,
                    plan.files_to_download.len(),
                    plan.total_download_size
                );
                {
                    let mut cell = self.cell();
                    cell.pending_plan = Some(plan.clone());
                    cell.state = ManagerState::AwaitingConfirmation;
                }
                self.inner.callbacks.on_update_available(&plan);
                Ok(CheckOutcome::UpdateAvailable(plan))
            }
            Err(e) => {
                soundloom_error!("Update check failed: {}", e);
                self.set_state(ManagerState::Idle);
                Err(UpdateError::Check(e))
            }
        }
    }

    // Downloading and applying ----------------------------------------------

    /// User accepted the pending plan: download, verify, apply. Blocking;
    /// callers that must not block use `start_update_thread`.
    pub fn begin_download_and_apply(&self) -> Result<ApplyReport, UpdateError> {
        let _busy = self
            .inner
            .pipeline_lock
            .try_lock()
            .map_err(|_| UpdateError::UpdateAlreadyInProgress)?;

        let (plan, cancel) = {
            let mut cell = self.cell();
            if cell.state != ManagerState::AwaitingConfirmation {
                return Err(UpdateError::InvalidState(
                    "no update awaiting confirmation".to_string(),
                ));
            }
            let plan = cell.pending_plan.take().ok_or_else(|| {
                UpdateError::InvalidState("no pending plan".to_string())
            })?;
            cell.state = ManagerState::Downloading;
            cell.cancel = CancellationToken::new();
            (plan, cell.cancel.clone())
        };

        let staging_dir = self.inner.config.staging_dir();
        // The staging directory is owned by this one cycle; start clean.
        download::discard_staging(&staging_dir);

        let callbacks = &self.inner.callbacks;
        let download_result = download::download_plan(
            &plan,
            &self.inner.config,
            &staging_dir,
            &cancel,
            &mut |progress| callbacks.on_download_progress(progress),
        );
        if let Err(e) = download_result {
            soundloom_error!("Download failed: {}", e);
            self.set_state(ManagerState::Idle);
            self.inner
                .callbacks
                .on_download_complete(false, Some(e.clone()));
            return Err(UpdateError::Download(e));
        }
        self.inner.callbacks.on_download_complete(true, None);

        self.set_state(ManagerState::Applying);
        let report = match apply::apply_updates(
            &plan,
            &staging_dir,
            &self.inner.config,
            &self.inner.store,
        ) {
            Ok(report) => report,
            Err(e) => {
                soundloom_error!("Apply failed: {}", e);
                self.set_state(ManagerState::Idle);
                self.inner.callbacks.on_apply_complete(false, false);
                return Err(UpdateError::Apply(e));
            }
        };

        let requires_restart = !report.deferred.is_empty();
        if requires_restart {
            // Staged critical files stay behind for the marker/helper.
            self.set_state(ManagerState::AwaitingRestart);
        } else {
            download::discard_staging(&staging_dir);
            self.set_state(ManagerState::Idle);
        }
        self.inner
            .callbacks
            .on_apply_complete(report.failed.is_empty(), requires_restart);
        soundloom_info!(
            "Update applied: {} file(s), {} failed, restart required: {}",
            report.applied.len(),
            report.failed.len(),
            requires_restart
        );
        Ok(report)
    }

    /// Runs `begin_download_and_apply` on a background worker thread so the
    /// UI thread never blocks on network or disk I/O.
    pub fn start_update_thread(&self) {
        let manager = self.clone();
        std::thread::spawn(move || {
            if let Err(e) = manager.begin_download_and_apply() {
                soundloom_error!("Update thread finished with error: {}", e);
            }
        });
    }

    /// Requests cooperative cancellation of the in-flight download. The
    /// downloader notices at the next chunk boundary and discards staging.
    pub fn cancel_download(&self) {
        self.cell().cancel.cancel();
    }

    // Restart coordination ---------------------------------------------------

    /// User confirmed the restart: write and spawn the relaunch helper, then
    /// report the executable is clear to exit. The caller performs the
    /// actual process exit.
    pub fn confirm_restart(&self) -> Result<PathBuf, UpdateError> {
        {
            let cell = self.cell();
            if cell.state != ManagerState::AwaitingRestart {
                return Err(UpdateError::InvalidState(
                    "no restart is pending".to_string(),
                ));
            }
        }
        let pending = apply::load_pending_update(&self.inner.config).ok_or_else(|| {
            UpdateError::InvalidState("pending update marker is missing".to_string())
        })?;
        let executable = std::env::current_exe()
            .map_err(|e| UpdateError::InvalidState(format!("cannot resolve executable: {e}")))?;
        let script = apply::write_relaunch_helper(
            &self.inner.config,
            &pending,
            &executable,
            std::process::id(),
        )
        .map_err(|e| UpdateError::InvalidState(e.to_string()))?;
        apply::spawn_relaunch_helper(&script)
            .map_err(|e| UpdateError::InvalidState(e.to_string()))?;
        Ok(script)
    }

    /// User chose "later": back to Idle. The marker remains; the critical
    /// files are applied on the eventual next launch regardless.
    pub fn defer_restart(&self) {
        let mut cell = self.cell();
        if cell.state == ManagerState::AwaitingRestart {
            cell.state = ManagerState::Idle;
        }
    }
}
