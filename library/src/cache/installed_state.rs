// This file deals with the local record of what is actually on disk: which
// file versions are installed, the current app version, and the user's
// update preferences. It is the single source of truth the checker diffs
// against.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::disk_io;
use crate::time;

/// Where the installed state is stored on disk.
const STATE_FILE_NAME: &str = "installed_state.json";

/// One installed file as recorded after a successful apply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InstalledFileInfo {
    pub version: String,
    pub digest: String,
    pub installed_at: u64,
}

fn default_auto_check() -> bool {
    true
}

/// The snapshot handed to readers. Cloned out from under the store's lock so
/// the checker never aliases a map the applier is mutating.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstalledState {
    #[serde(default)]
    pub current_version: String,
    #[serde(default)]
    pub variant: String,
    #[serde(default)]
    pub files: BTreeMap<String, InstalledFileInfo>,
    #[serde(default)]
    pub last_check_timestamp: u64,
    /// Version the user explicitly dismissed; do not re-prompt for it.
    #[serde(default)]
    pub skipped_version: Option<String>,
    #[serde(default = "default_auto_check")]
    pub auto_check_enabled: bool,
}

impl InstalledState {
    fn new(variant: &str) -> Self {
        Self {
            current_version: String::new(),
            variant: variant.to_string(),
            files: BTreeMap::new(),
            last_check_timestamp: 0,
            skipped_version: None,
            auto_check_enabled: true,
        }
    }
}

/// Owns the persisted `InstalledState`. Mutations happen through the methods
/// below, each of which persists before returning. The internal lock makes
/// reads from the checker's background thread safe against the applier's
/// writes.
#[derive(Debug)]
pub struct InstalledStateStore {
    /// Where this writes to disk. Not serialized; it can change between runs.
    state_dir: PathBuf,
    state: Mutex<InstalledState>,
}

impl InstalledStateStore {
    /// Loads the state from `state_dir`, falling back to an empty default if
    /// the file is absent or corrupt. Absence is the normal first-run case;
    /// corruption just means the next check produces a full plan.
    pub fn load_or_new_on_error(state_dir: &Path, variant: &str) -> Self {
        let path = state_dir.join(STATE_FILE_NAME);
        let state = match disk_io::read::<InstalledState, _>(&path) {
            Ok(state) => {
                if state.variant == variant {
                    state
                } else {
                    // Variant switched (e.g. standard -> gpu). The recorded
                    // files no longer describe the new variant's file set.
                    soundloom_warn!(
                        "Installed state is for variant {:?}, expected {:?}; starting fresh",
                        state.variant,
                        variant
                    );
                    InstalledState::new(variant)
                }
            }
            Err(e) => {
                soundloom_info!("No usable installed state ({}), starting fresh", e);
                InstalledState::new(variant)
            }
        };
        Self {
            state_dir: state_dir.to_path_buf(),
            state: Mutex::new(state),
        }
    }

    fn state_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE_NAME)
    }

    /// Returns an owned copy of the current state.
    pub fn snapshot(&self) -> InstalledState {
        self.state.lock().expect("installed state lock").clone()
    }

    /// Runs `f` against the locked state, then persists. Failure to persist
    /// is surfaced so the applier can report it; the in-memory mutation
    /// stands either way (the next check self-heals from disk truth).
    fn mutate<F>(&self, f: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut InstalledState),
    {
        let mut state = self.state.lock().expect("installed state lock");
        f(&mut state);
        disk_io::write(&*state, &self.state_path())
    }

    /// Records one successfully placed file. Called by the applier after the
    /// copy has landed, never before.
    pub fn record_file_installed(
        &self,
        relative_path: &str,
        version: &str,
        digest: &str,
    ) -> anyhow::Result<()> {
        self.mutate(|state| {
            state.files.insert(
                relative_path.to_string(),
                InstalledFileInfo {
                    version: version.to_string(),
                    digest: digest.to_string(),
                    installed_at: time::unix_timestamp(),
                },
            );
        })
    }

    /// Forgets a file that has been deleted from the install directory.
    pub fn record_file_removed(&self, relative_path: &str) -> anyhow::Result<()> {
        self.mutate(|state| {
            state.files.remove(relative_path);
        })
    }

    pub fn current_version(&self) -> String {
        self.state
            .lock()
            .expect("installed state lock")
            .current_version
            .clone()
    }

    pub fn set_current_version(&self, version: &str) -> anyhow::Result<()> {
        self.mutate(|state| {
            state.current_version = version.to_string();
        })
    }

    pub fn skipped_version(&self) -> Option<String> {
        self.state
            .lock()
            .expect("installed state lock")
            .skipped_version
            .clone()
    }

    pub fn set_skipped_version(&self, version: Option<String>) -> anyhow::Result<()> {
        self.mutate(|state| {
            state.skipped_version = version;
        })
    }

    pub fn auto_check_enabled(&self) -> bool {
        self.state
            .lock()
            .expect("installed state lock")
            .auto_check_enabled
    }

    pub fn set_auto_check_enabled(&self, enabled: bool) -> anyhow::Result<()> {
        self.mutate(|state| {
            state.auto_check_enabled = enabled;
        })
    }

    pub fn last_check_timestamp(&self) -> u64 {
        self.state
            .lock()
            .expect("installed state lock")
            .last_check_timestamp
    }

    pub fn record_check_now(&self) -> anyhow::Result<()> {
        self.mutate(|state| {
            state.last_check_timestamp = time::unix_timestamp();
        })
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::InstalledStateStore;

    #[test]
    fn first_run_yields_empty_default() {
        let temp_dir = TempDir::new("state_test").unwrap();
        let store = InstalledStateStore::load_or_new_on_error(temp_dir.path(), "standard");
        let state = store.snapshot();
        assert_eq!(state.current_version, "");
        assert_eq!(state.variant, "standard");
        assert!(state.files.is_empty());
        assert!(state.auto_check_enabled);
        assert_eq!(state.skipped_version, None);
    }

    #[test]
    fn mutations_survive_a_reload() {
        let temp_dir = TempDir::new("state_test").unwrap();
        let store = InstalledStateStore::load_or_new_on_error(temp_dir.path(), "standard");
        store
            .record_file_installed("presets/init.slpreset", "1.1.0", "abcd")
            .unwrap();
        store.set_current_version("1.1.0").unwrap();
        store
            .set_skipped_version(Some("1.2.0".to_string()))
            .unwrap();
        store.set_auto_check_enabled(false).unwrap();

        let reloaded = InstalledStateStore::load_or_new_on_error(temp_dir.path(), "standard");
        let state = reloaded.snapshot();
        assert_eq!(state.current_version, "1.1.0");
        assert_eq!(state.files["presets/init.slpreset"].digest, "abcd");
        assert_eq!(state.skipped_version, Some("1.2.0".to_string()));
        assert!(!state.auto_check_enabled);
    }

    #[test]
    fn corrupt_state_file_is_not_fatal() {
        let temp_dir = TempDir::new("state_test").unwrap();
        std::fs::write(temp_dir.path().join("installed_state.json"), "{not json").unwrap();
        let store = InstalledStateStore::load_or_new_on_error(temp_dir.path(), "standard");
        assert!(store.snapshot().files.is_empty());
    }

    #[test]
    fn variant_switch_discards_recorded_files() {
        let temp_dir = TempDir::new("state_test").unwrap();
        let store = InstalledStateStore::load_or_new_on_error(temp_dir.path(), "standard");
        store
            .record_file_installed("bin/soundloom", "1.0.0", "aa")
            .unwrap();

        let switched = InstalledStateStore::load_or_new_on_error(temp_dir.path(), "gpu");
        assert!(switched.snapshot().files.is_empty());
        assert_eq!(switched.snapshot().variant, "gpu");
    }

    #[test]
    fn record_file_removed_drops_the_entry() {
        let temp_dir = TempDir::new("state_test").unwrap();
        let store = InstalledStateStore::load_or_new_on_error(temp_dir.path(), "standard");
        store
            .record_file_installed("old.dat", "1.0.0", "aa")
            .unwrap();
        store.record_file_removed("old.dat").unwrap();
        assert!(store.snapshot().files.is_empty());
    }
}
