//! Scripted provider and ledger doubles shared by the ingestion tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;

use climate_common::{
    DatasetKind, FetchRecord, Partition, PipelineError, PipelineResult, SourceConfig,
};
use ingestion::{Provider, ProviderResponse};
use storage::FetchLedger;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond(u16, String),
    /// Connection-level failure, no status.
    Transport,
}

impl Reply {
    pub fn ok(body: &str) -> Self {
        Reply::Respond(200, body.to_string())
    }
}

/// Provider that replays queued replies per year and records every call.
///
/// Years without a queued reply get a one-detection FIRMS file.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<HashMap<i32, VecDeque<Reply>>>,
    calls: Mutex<Vec<(Partition, Instant)>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, year: i32, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(year)
            .or_default()
            .extend(replies);
        self
    }

    pub fn requested_years(&self) -> Vec<i32> {
        self.calls.lock().unwrap().iter().map(|(p, _)| p.year).collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn fetch(&self, partition: &Partition) -> PipelineResult<ProviderResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((*partition, Instant::now()));

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&partition.year)
            .and_then(|queue| queue.pop_front());

        match reply {
            Some(Reply::Respond(status, body)) => Ok(ProviderResponse::new(status, body)),
            Some(Reply::Transport) => Err(PipelineError::Provider {
                status: None,
                message: "connection reset".to_string(),
            }),
            None => Ok(ProviderResponse::ok(test_utils::firms_csv(
                &format!("{}-08-01", partition.year),
                &[10.0],
            ))),
        }
    }
}

/// Map-backed ledger whose probes can be made to fail.
#[derive(Default)]
pub struct MapLedger {
    records: Mutex<BTreeMap<Partition, FetchRecord>>,
    fail_probes: AtomicBool,
}

impl MapLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_probes(&self) {
        self.fail_probes.store(true, Ordering::SeqCst);
    }

    pub fn years(&self, kind: DatasetKind) -> Vec<i32> {
        self.records
            .lock()
            .unwrap()
            .keys()
            .filter(|p| p.kind == kind)
            .map(|p| p.year)
            .collect()
    }
}

#[async_trait]
impl FetchLedger for MapLedger {
    async fn has(&self, partition: &Partition) -> PipelineResult<bool> {
        if self.fail_probes.load(Ordering::SeqCst) {
            return Err(PipelineError::Ledger("database is locked".to_string()));
        }
        Ok(self.records.lock().unwrap().contains_key(partition))
    }

    async fn record(&self, record: &FetchRecord) -> PipelineResult<bool> {
        if record.size_bytes == 0 {
            return Err(PipelineError::Ledger("empty partition".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&record.partition) {
            return Ok(false);
        }
        records.insert(record.partition, record.clone());
        Ok(true)
    }

    async fn list(&self, kind: DatasetKind) -> PipelineResult<Vec<FetchRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.partition.kind == kind)
            .cloned()
            .collect())
    }

    async fn latest(&self, kind: DatasetKind) -> PipelineResult<Option<FetchRecord>> {
        Ok(self.list(kind).await?.pop())
    }

    async fn forget(&self, partition: &Partition) -> PipelineResult<bool> {
        Ok(self.records.lock().unwrap().remove(partition).is_some())
    }
}

pub fn fire_source() -> SourceConfig {
    SourceConfig {
        kind: DatasetKind::Fire,
        years: None,
        endpoint_template: "https://firms.example/api/area/csv/{map_key}/MODIS_SP/world/1/{date}"
            .to_string(),
        file_name_template: "fires_world_{date}.csv".to_string(),
        sample_day: "08-01".to_string(),
        request_interval_secs: 0.0,
        request_timeout_secs: 5,
        api_key_env: None,
        accept_confirmed_empty: true,
        error_markers: climate_common::config::DEFAULT_ERROR_MARKERS
            .iter()
            .map(|m| m.to_string())
            .collect(),
    }
}

pub fn temperature_source() -> SourceConfig {
    SourceConfig {
        kind: DatasetKind::Temperature,
        years: None,
        endpoint_template: "https://data.giss.example/gistemp/tabledata_v4/GLB.Ts+dSST.csv"
            .to_string(),
        file_name_template: "GLB.Ts+dSST.csv".to_string(),
        sample_day: "08-01".to_string(),
        request_interval_secs: 0.0,
        request_timeout_secs: 5,
        api_key_env: None,
        accept_confirmed_empty: false,
        error_markers: Vec::new(),
    }
}
