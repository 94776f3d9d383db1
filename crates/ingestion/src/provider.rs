//! Upstream data providers and response classification.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, instrument};

use climate_common::{DatasetKind, Partition, PipelineError, PipelineResult, SourceConfig};

use crate::fires::DATE_COLUMN;
use crate::temperature::YEAR_COLUMN;

/// Env var consulted when a source needs a key but names none.
pub const DEFAULT_API_KEY_ENV: &str = "NASA_API_KEY";

/// Raw HTTP response for one partition.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ProviderResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(200, body)
    }
}

/// A usable response body.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Header plus at least one data line.
    Data(Bytes),
    /// Header only: the provider has no rows for this partition.
    ConfirmedEmpty(Bytes),
}

impl FetchOutcome {
    pub fn body(&self) -> &Bytes {
        match self {
            FetchOutcome::Data(body) | FetchOutcome::ConfirmedEmpty(body) => body,
        }
    }
}

/// Source of partition payloads.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Request one partition. Transport failures are `PipelineError::Provider`
    /// with no status.
    async fn fetch(&self, partition: &Partition) -> PipelineResult<ProviderResponse>;
}

/// Column every header line of a dataset's files carries.
pub fn header_column(kind: DatasetKind) -> &'static str {
    match kind {
        DatasetKind::Temperature => YEAR_COLUMN,
        DatasetKind::Fire => DATE_COLUMN,
    }
}

fn is_header_line(line: &str, column: &str) -> bool {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());
    match reader.records().next() {
        Some(Ok(record)) => record.iter().any(|field| field.eq_ignore_ascii_case(column)),
        _ => false,
    }
}

/// Decide what a response means.
///
/// Status is checked first, then error markers (FIRMS reports a bad key with a
/// 200), then the number of non-blank lines. A lone line is only an empty
/// partition when it is a header naming `header_column`; any other single
/// line is a provider message and malformed.
pub fn classify_response(
    response: ProviderResponse,
    error_markers: &[String],
    header_column: &str,
) -> PipelineResult<FetchOutcome> {
    let ProviderResponse { status, body } = response;
    let text = String::from_utf8_lossy(&body);

    if status != 200 {
        let snippet: String = text.trim().chars().take(200).collect();
        return Err(match status {
            401 | 403 => PipelineError::Unauthorized(format!("HTTP {}: {}", status, snippet)),
            _ => PipelineError::Provider {
                status: Some(status),
                message: snippet,
            },
        });
    }

    if let Some(marker) = error_markers.iter().find(|m| text.contains(m.as_str())) {
        return Err(PipelineError::Unauthorized(format!(
            "provider responded with '{}'",
            marker
        )));
    }

    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let first = lines.next();
    let more = lines.next().is_some();
    match (first, more) {
        (None, _) => Err(PipelineError::MalformedResponse(
            "response body is empty".to_string(),
        )),
        (Some(line), false) if is_header_line(line, header_column) => {
            Ok(FetchOutcome::ConfirmedEmpty(body))
        }
        (Some(line), false) => {
            let snippet: String = line.trim().chars().take(200).collect();
            Err(PipelineError::MalformedResponse(format!(
                "single line without a '{}' header: {}",
                header_column, snippet
            )))
        }
        (Some(_), true) => Ok(FetchOutcome::Data(body)),
    }
}

/// Provider that GETs the source's rendered endpoint.
pub struct HttpProvider {
    client: Client,
    source: SourceConfig,
    map_key: Option<String>,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("kind", &self.source.kind)
            .field("map_key", &self.map_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpProvider {
    /// Build a provider, reading the key from the environment when the
    /// endpoint needs one. A missing key fails here, before any request.
    pub fn new(source: SourceConfig) -> PipelineResult<Self> {
        let map_key = if source.needs_map_key() {
            let var = source
                .api_key_env
                .clone()
                .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string());
            let key = std::env::var(&var)
                .ok()
                .filter(|k| !k.trim().is_empty())
                .ok_or(PipelineError::MissingCredential(var))?;
            Some(key)
        } else {
            None
        };

        Self::with_key(source, map_key)
    }

    /// Build a provider with an explicit key.
    pub fn with_key(source: SourceConfig, map_key: Option<String>) -> PipelineResult<Self> {
        if source.needs_map_key() && map_key.is_none() {
            return Err(PipelineError::MissingCredential(format!(
                "{} endpoint needs a map key",
                source.kind
            )));
        }

        let client = Client::builder()
            .timeout(source.request_timeout())
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| PipelineError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            source,
            map_key,
        })
    }
}

#[async_trait]
impl Provider for HttpProvider {
    #[instrument(skip(self), fields(partition = %partition))]
    async fn fetch(&self, partition: &Partition) -> PipelineResult<ProviderResponse> {
        let url = self.source.endpoint(partition, self.map_key.as_deref());
        debug!("Requesting partition");

        let transport = |e: reqwest::Error| PipelineError::Provider {
            status: None,
            message: e.without_url().to_string(),
        };

        let response = self.client.get(&url).send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(transport)?;

        debug!(status, size = body.len(), "Provider responded");
        Ok(ProviderResponse { status, body })
    }
}
