//! Layout of the local storage root.
//!
//! ```text
//! {root}/bronze/{temperature|fires}/{year}/{file}   fetched partitions
//! {root}/gold/                                      derived outputs
//! ```

use std::path::{Path, PathBuf};

use climate_common::Partition;

/// Suffix of files still being written.
pub const PARTIAL_SUFFIX: &str = ".partial";

pub const BRONZE_DIR: &str = "bronze";
pub const GOLD_DIR: &str = "gold";

/// Partition file path relative to the storage root, `/`-separated.
///
/// This is the form stored in the ledger.
pub fn partition_location(partition: &Partition, file_name: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        BRONZE_DIR,
        partition.kind.bronze_dir(),
        partition.year,
        file_name
    )
}

/// Resolve a ledger location against the storage root.
pub fn resolve(root: &Path, location: &str) -> PathBuf {
    location
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |path, part| path.join(part))
}

/// Sibling path used while a file is being written.
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

pub fn gold_dir(root: &Path) -> PathBuf {
    root.join(GOLD_DIR)
}

/// Object key for a file under the storage root, or `None` if the file is
/// outside it.
pub fn object_key(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let key = relative.to_string_lossy().replace('\\', "/");
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}
