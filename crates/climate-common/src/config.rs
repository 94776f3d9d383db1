//! Per-source fetch configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::partition::{DatasetKind, Partition, YearRange};

/// Error strings FIRMS returns with a 200 status when the map key is bad.
pub const DEFAULT_ERROR_MARKERS: &[&str] = &["Map Key not found", "Invalid MAP_KEY"];

/// Longest accepted spacing between requests to one provider (one day).
pub const MAX_REQUEST_INTERVAL_SECS: f64 = 86_400.0;

/// How one upstream dataset is fetched and where its partitions land.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: DatasetKind,

    /// Years to keep in sync. `None` means only the current year, which is
    /// how the temperature series (a single undated resource) is keyed.
    #[serde(default)]
    pub years: Option<YearRange>,

    /// URL with optional `{map_key}`, `{year}` and `{date}` placeholders.
    pub endpoint_template: String,

    /// File name under `bronze/<kind>/<year>/`, same placeholders as the URL.
    pub file_name_template: String,

    /// Month and day sampled for each year, `MM-DD`.
    #[serde(default = "default_sample_day")]
    pub sample_day: String,

    /// Minimum spacing between consecutive requests to this provider.
    #[serde(default = "default_request_interval")]
    pub request_interval_secs: f64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Environment variable holding the provider key, if one is needed.
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Record header-only responses as terminal instead of retrying them.
    #[serde(default = "default_accept_confirmed_empty")]
    pub accept_confirmed_empty: bool,

    #[serde(default = "default_error_markers")]
    pub error_markers: Vec<String>,
}

fn default_sample_day() -> String {
    "08-01".to_string()
}

fn default_request_interval() -> f64 {
    2.0
}

fn default_request_timeout() -> u64 {
    120
}

fn default_accept_confirmed_empty() -> bool {
    true
}

fn default_error_markers() -> Vec<String> {
    DEFAULT_ERROR_MARKERS.iter().map(|m| m.to_string()).collect()
}

impl SourceConfig {
    /// Check invariants serde cannot express.
    pub fn validate(&self) -> PipelineResult<()> {
        if !(0.0..=MAX_REQUEST_INTERVAL_SECS).contains(&self.request_interval_secs) {
            return Err(PipelineError::Config(format!(
                "{}: request_interval_secs must be between 0 and {}",
                self.kind, MAX_REQUEST_INTERVAL_SECS
            )));
        }
        if self.file_name_template.contains('/') || self.file_name_template.contains('\\') {
            return Err(PipelineError::Config(format!(
                "{}: file_name_template must be a bare file name",
                self.kind
            )));
        }
        let (month, day) = self.sample_day.split_once('-').ok_or_else(|| {
            PipelineError::Config(format!("{}: sample_day must be MM-DD", self.kind))
        })?;
        let valid = matches!(month.parse::<u32>(), Ok(1..=12))
            && matches!(day.parse::<u32>(), Ok(1..=31));
        if !valid {
            return Err(PipelineError::Config(format!(
                "{}: invalid sample_day '{}'",
                self.kind, self.sample_day
            )));
        }
        Ok(())
    }

    /// Years to plan for, resolving the current-year default.
    pub fn year_range(&self, current_year: i32) -> YearRange {
        self.years.unwrap_or_else(|| YearRange::single(current_year))
    }

    pub fn request_interval(&self) -> Duration {
        let secs = self.request_interval_secs.clamp(0.0, MAX_REQUEST_INTERVAL_SECS);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Sampled date for a year, e.g. `2004-08-01`.
    pub fn sample_date(&self, year: i32) -> String {
        format!("{}-{}", year, self.sample_day)
    }

    /// Partition file name with placeholders filled in.
    pub fn file_name(&self, partition: &Partition) -> String {
        self.render(&self.file_name_template, partition, None)
    }

    /// Request URL with placeholders filled in.
    pub fn endpoint(&self, partition: &Partition, map_key: Option<&str>) -> String {
        self.render(&self.endpoint_template, partition, map_key)
    }

    pub fn needs_map_key(&self) -> bool {
        self.endpoint_template.contains("{map_key}")
    }

    fn render(&self, template: &str, partition: &Partition, map_key: Option<&str>) -> String {
        let mut out = template
            .replace("{year}", &partition.year.to_string())
            .replace("{date}", &self.sample_date(partition.year));
        if let Some(key) = map_key {
            out = out.replace("{map_key}", key);
        }
        out
    }
}
