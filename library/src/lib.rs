// This is a required file for rust libraries which declares what files are
// part of the library and what interfaces are public from the library.

#[macro_use]
mod logging_macros;

// Declare the other .rs files/modules, but keep them private; the public
// surface is re-exported below.
mod apply;
mod cache;
mod checker;
mod config;
mod download;
mod hash;
mod logging;
mod manager;
mod manifest;
mod network;
mod time;

pub use self::apply::{ApplyError, ApplyReport, PendingFile, PendingUpdate};
pub use self::cache::{InstalledFileInfo, InstalledState, InstalledStateStore};
pub use self::checker::{CheckError, CheckOutcome, UpdatePlan};
pub use self::config::UpdateConfig;
pub use self::download::{CancellationToken, DownloadError, DownloadProgress};
pub use self::hash::{compute_digest, file_digest, verify_file, HashError};
pub use self::manager::{
    ManagerState, NoopCallbacks, UpdateCallbacks, UpdateError, UpdateManager,
};
pub use self::manifest::{FileEntry, Manifest, VariantInfo};
pub use self::network::NetworkHooks;

#[cfg(test)]
extern crate tempdir;
