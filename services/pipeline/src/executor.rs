//! In-process stage graph.
//!
//! Both fetch stages run concurrently; load, transform and visualize follow in
//! strict sequence once both fetches have succeeded. A stage that fails with a
//! retryable error is tried again after a fixed delay.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use climate_common::{PipelineError, PipelineResult};

/// One node of the pipeline graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    FetchTemperature,
    FetchFires,
    Load,
    Transform,
    Visualize,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::FetchTemperature,
        Stage::FetchFires,
        Stage::Load,
        Stage::Transform,
        Stage::Visualize,
    ];

    /// Stages that run after the fan-in, in order.
    pub const SEQUENCE: [Stage; 3] = [Stage::Load, Stage::Transform, Stage::Visualize];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::FetchTemperature => "fetch-temperature",
            Stage::FetchFires => "fetch-fires",
            Stage::Load => "load",
            Stage::Transform => "transform",
            Stage::Visualize => "visualize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| PipelineError::Config(format!("unknown stage '{}'", s)))
    }
}

/// Runs the body of a single stage.
#[async_trait]
pub trait StageRunner: Send + Sync {
    /// Run `stage` once, returning a one-line summary of what it did.
    async fn run_stage(&self, stage: Stage, cancel: &CancellationToken) -> PipelineResult<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Debug)]
pub enum StageStatus {
    Succeeded(String),
    Failed(PipelineError),
    /// Not run because an upstream stage failed.
    Skipped,
}

#[derive(Debug)]
pub struct StageReport {
    pub stage: Stage,
    pub attempts: u32,
    pub status: StageStatus,
}

impl StageReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, StageStatus::Succeeded(_))
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match &self.status {
            StageStatus::Failed(e) => Some(e),
            _ => None,
        }
    }

    fn skipped(stage: Stage) -> Self {
        Self {
            stage,
            attempts: 0,
            status: StageStatus::Skipped,
        }
    }
}

/// Outcome of a graph run, one entry per stage in graph order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub stages: Vec<StageReport>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.stages.iter().all(StageReport::succeeded)
    }

    pub fn get(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    pub fn failures(&self) -> impl Iterator<Item = &StageReport> {
        self.stages.iter().filter(|r| r.error().is_some())
    }
}

pub struct Executor {
    runner: Arc<dyn StageRunner>,
    policy: RetryPolicy,
}

impl Executor {
    pub fn new(runner: Arc<dyn StageRunner>, policy: RetryPolicy) -> Self {
        Self { runner, policy }
    }

    /// Run one stage under the retry policy.
    ///
    /// A running attempt is never interrupted; cancellation only cuts the
    /// wait between attempts.
    #[instrument(skip(self, cancel), fields(stage = %stage))]
    pub async fn run_stage(&self, stage: Stage, cancel: &CancellationToken) -> StageReport {
        let mut attempts = 0;
        loop {
            attempts += 1;
            info!(attempt = attempts, "Starting stage");

            let error = match self.runner.run_stage(stage, cancel).await {
                Ok(summary) => {
                    info!(attempt = attempts, summary = %summary, "Stage succeeded");
                    counter!("stage_runs_total", "stage" => stage.as_str(), "status" => "succeeded")
                        .increment(1);
                    return StageReport {
                        stage,
                        attempts,
                        status: StageStatus::Succeeded(summary),
                    };
                }
                Err(e) => e,
            };

            if error.is_fatal() || attempts > self.policy.retries {
                error!(attempt = attempts, error = %error, "Stage failed");
                counter!("stage_runs_total", "stage" => stage.as_str(), "status" => "failed")
                    .increment(1);
                return StageReport {
                    stage,
                    attempts,
                    status: StageStatus::Failed(error),
                };
            }

            warn!(
                attempt = attempts,
                error = %error,
                delay_secs = self.policy.delay.as_secs(),
                "Stage failed, retrying"
            );
            tokio::select! {
                _ = cancel.cancelled() => {
                    return StageReport {
                        stage,
                        attempts,
                        status: StageStatus::Failed(PipelineError::Cancelled),
                    };
                }
                _ = tokio::time::sleep(self.policy.delay) => {}
            }
        }
    }

    /// Run the full graph: both fetches, then load, transform and visualize.
    ///
    /// Cancellation is checked before each sequential stage; the first stage
    /// not started fails as cancelled and the rest are skipped.
    pub async fn run_graph(&self, cancel: &CancellationToken) -> RunReport {
        let (temperature, fires) = tokio::join!(
            self.run_stage(Stage::FetchTemperature, cancel),
            self.run_stage(Stage::FetchFires, cancel),
        );

        let mut upstream_ok = temperature.succeeded() && fires.succeeded();
        let mut report = RunReport {
            stages: vec![temperature, fires],
        };

        for stage in Stage::SEQUENCE {
            if !upstream_ok {
                warn!(stage = %stage, "Upstream stage failed, skipping");
                report.stages.push(StageReport::skipped(stage));
                continue;
            }
            if cancel.is_cancelled() {
                warn!(stage = %stage, "Run cancelled before stage");
                report.stages.push(StageReport {
                    stage,
                    attempts: 0,
                    status: StageStatus::Failed(PipelineError::Cancelled),
                });
                upstream_ok = false;
                continue;
            }
            let stage_report = self.run_stage(stage, cancel).await;
            upstream_ok = stage_report.succeeded();
            report.stages.push(stage_report);
        }

        info!(success = report.is_success(), "Pipeline run finished");
        report
    }
}
