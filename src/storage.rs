pub mod directory;
mod snapshot;

pub use directory::{CATALOG_FILE, CONFIG_FILE, Directory, FlushError, LoadError, load_config};
pub use snapshot::{Snapshot, SnapshotError};
