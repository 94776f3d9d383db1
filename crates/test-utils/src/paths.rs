//! Scratch storage roots and file helpers.

use std::path::{Path, PathBuf};

/// Returns the workspace root directory.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Path of the sample pipeline config shipped with the repository.
pub fn sample_config_path() -> PathBuf {
    workspace_root().join("config").join("pipeline.yaml")
}

/// Creates a temporary storage root.
///
/// The directory is automatically cleaned up when the returned `TempDir` is dropped.
pub fn temp_storage_root() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("climate_pipeline_")
        .tempdir()
        .expect("Failed to create temporary storage root")
}

/// Write `contents` at a `/`-separated path under `root`, creating parents.
pub fn write_file(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = relative
        .split('/')
        .fold(root.to_path_buf(), |path, part| path.join(part));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directories");
    }
    std::fs::write(&path, contents).expect("Failed to write test file");
    path
}
