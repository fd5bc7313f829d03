// Persistence for the updater: the installed-state record and the JSON
// read/write helpers it is built on.

pub mod disk_io;
mod installed_state;

pub use installed_state::{InstalledFileInfo, InstalledState, InstalledStateStore};
