//! Upload-if-absent mirror of the storage root to object storage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use object_store::{aws::AmazonS3Builder, path::Path as ObjectPath, ObjectMeta, ObjectStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use walkdir::{DirEntry, WalkDir};

use climate_common::{PipelineError, PipelineResult};

use crate::paths::{object_key, PARTIAL_SUFFIX};

/// Connection settings for the archive bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Bucket name; `S3_BUCKET_NAME` when unset.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Region; `AWS_DEFAULT_REGION` when unset.
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores; `S3_ENDPOINT` when unset.
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Counts from one mirror pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveReport {
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ArchiveReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Result of probing the archive for one key.
#[derive(Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    Present,
    Absent,
    Failed(String),
}

/// Map a HEAD result to an outcome. Only `NotFound` means absent.
pub fn classify_probe(result: Result<ObjectMeta, object_store::Error>) -> ProbeOutcome {
    match result {
        Ok(_) => ProbeOutcome::Present,
        Err(object_store::Error::NotFound { .. }) => ProbeOutcome::Absent,
        Err(e) => ProbeOutcome::Failed(e.to_string()),
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

fn is_partial(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.ends_with(PARTIAL_SUFFIX))
        .unwrap_or(false)
}

pub struct ArchiveMirror {
    store: Arc<dyn ObjectStore>,
    root: PathBuf,
}

impl ArchiveMirror {
    pub fn new(store: Arc<dyn ObjectStore>, root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            root: root.into(),
        }
    }

    /// S3 mirror using the standard AWS environment plus any explicit settings.
    pub fn s3(config: &ArchiveConfig, root: impl Into<PathBuf>) -> PipelineResult<Self> {
        let mut builder = AmazonS3Builder::from_env();

        let bucket = config
            .bucket
            .clone()
            .or_else(|| std::env::var("S3_BUCKET_NAME").ok())
            .ok_or_else(|| PipelineError::Config("S3_BUCKET_NAME is not set".to_string()))?;
        builder = builder.with_bucket_name(bucket);

        if let Some(region) = config
            .region
            .clone()
            .or_else(|| std::env::var("AWS_DEFAULT_REGION").ok())
        {
            builder = builder.with_region(region);
        }

        if let Some(endpoint) = config
            .endpoint
            .clone()
            .or_else(|| std::env::var("S3_ENDPOINT").ok())
        {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| PipelineError::Storage(format!("Failed to create S3 client: {}", e)))?;

        Ok(Self::new(Arc::new(store), root))
    }

    /// Files eligible for upload, in a stable order.
    fn candidates(&self, report: &mut ArchiveReport) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e));

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() && !is_partial(&entry) => {
                    files.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Failed to walk storage root");
                    report.failed += 1;
                }
            }
        }
        files
    }

    /// Upload every file under the root whose key is not in the archive yet.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn sync(&self) -> ArchiveReport {
        let mut report = ArchiveReport::default();

        for file in self.candidates(&mut report) {
            let Some(key) = object_key(&self.root, &file) else {
                continue;
            };
            let location = ObjectPath::from(key.as_str());

            match classify_probe(self.store.head(&location).await) {
                ProbeOutcome::Present => {
                    debug!(key = %key, "Already archived");
                    report.skipped += 1;
                }
                ProbeOutcome::Absent => match self.upload(&file, &location).await {
                    Ok(size) => {
                        info!(key = %key, size, "Archived file");
                        counter!("archive_uploads_total").increment(1);
                        report.uploaded += 1;
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "Upload failed");
                        report.failed += 1;
                    }
                },
                ProbeOutcome::Failed(e) => {
                    warn!(key = %key, error = %e, "Archive probe failed, not uploading");
                    report.failed += 1;
                }
            }
        }

        info!(
            uploaded = report.uploaded,
            skipped = report.skipped,
            failed = report.failed,
            "Archive sync complete"
        );
        report
    }

    async fn upload(&self, file: &Path, location: &ObjectPath) -> PipelineResult<usize> {
        let data = Bytes::from(tokio::fs::read(file).await?);
        let size = data.len();
        self.store
            .put(location, data.into())
            .await
            .map_err(|e| PipelineError::Storage(format!("Failed to write {}: {}", location, e)))?;
        Ok(size)
    }
}
