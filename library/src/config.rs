// The updater's configuration. One explicit struct, constructed by the host
// app and owned by the `UpdateManager`; every other component receives what
// it needs as parameters rather than reaching into global state.

use std::path::PathBuf;

use crate::network::NetworkHooks;

#[derive(Debug, Clone)]
pub struct UpdateConfig {
    /// The live installation directory files are applied into.
    pub install_dir: PathBuf,
    /// Where the installed-state record and the pending-update marker live.
    /// Must survive restarts; never inside `install_dir`.
    pub storage_dir: PathBuf,
    /// Where in-flight downloads are staged. One cycle owns it at a time.
    pub download_dir: PathBuf,
    /// Well-known URL of the release manifest document.
    pub manifest_url: String,
    /// Which build flavor this client runs (e.g. "standard", "gpu").
    pub variant: String,
    pub network_hooks: NetworkHooks,
}

impl UpdateConfig {
    pub fn new(
        install_dir: PathBuf,
        storage_dir: PathBuf,
        manifest_url: &str,
        variant: &str,
    ) -> Self {
        let download_dir = storage_dir.join("downloads");
        Self {
            install_dir,
            storage_dir,
            download_dir,
            manifest_url: manifest_url.to_string(),
            variant: variant.to_string(),
            network_hooks: NetworkHooks::default(),
        }
    }

    /// The staging directory for the one in-flight download/apply cycle.
    pub fn staging_dir(&self) -> PathBuf {
        self.download_dir.join("staging")
    }
}
