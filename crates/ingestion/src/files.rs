//! Atomic partition file writes.

use std::path::Path;

use tokio::fs;
use tracing::debug;

use storage::paths::partial_path;

use crate::error::Result;

/// Write `data` to `path` through a `.partial` sibling and a rename, so the
/// final path only ever holds a complete file.
pub async fn write_atomic(path: &Path, data: &[u8]) -> Result<u64> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let temp = partial_path(path);
    fs::write(&temp, data).await?;
    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e.into());
    }

    let size = fs::metadata(path).await?.len();
    debug!(path = %path.display(), size, "Wrote partition file");
    Ok(size)
}
