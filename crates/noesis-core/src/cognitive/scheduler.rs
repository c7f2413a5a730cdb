//! Daily decay scheduler.
//!
//! Uses tokio-cron-scheduler to run
//! [`KnowledgeGraph::run_daily_decay`](crate::graph::KnowledgeGraph::run_daily_decay) once
//! a day and persist the resulting node state.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{debug, error, info};

use crate::error::NoesisResult;
use crate::graph::SharedGraph;
use crate::store::CognitiveStore;

/// Configuration for the decay scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecaySchedulerConfig {
    /// Six-field cron expression, evaluated in UTC (default: 04:00 daily).
    pub cron: String,
    /// Whether to run decay immediately on start (default: false).
    pub run_on_start: bool,
}

impl Default for DecaySchedulerConfig {
    fn default() -> Self {
        Self {
            cron: "0 0 4 * * *".to_string(),
            run_on_start: false,
        }
    }
}

impl DecaySchedulerConfig {
    /// Create config with a custom cron expression.
    pub fn with_cron(cron: impl Into<String>) -> Self {
        Self {
            cron: cron.into(),
            ..Default::default()
        }
    }

    /// Enable running decay immediately on start.
    pub fn with_run_on_start(mut self) -> Self {
        self.run_on_start = true;
        self
    }
}

/// Scheduler for the daily weight decay pass.
///
/// # Example
///
/// ```ignore
/// use noesis_core::cognitive::{DecayScheduler, DecaySchedulerConfig};
///
/// let scheduler = DecayScheduler::new(graph, store, DecaySchedulerConfig::default()).await?;
/// scheduler.start().await?;
/// ```
pub struct DecayScheduler {
    scheduler: JobScheduler,
    graph: SharedGraph,
    store: Arc<CognitiveStore>,
    config: DecaySchedulerConfig,
}

impl DecayScheduler {
    /// Create a new DecayScheduler.
    ///
    /// Note: Call `start()` to begin periodic execution.
    pub async fn new(
        graph: SharedGraph,
        store: Arc<CognitiveStore>,
        config: DecaySchedulerConfig,
    ) -> Result<Self, JobSchedulerError> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            graph,
            store,
            config,
        })
    }

    pub fn config(&self) -> &DecaySchedulerConfig {
        &self.config
    }

    /// Start the scheduler.
    pub async fn start(&self) -> Result<(), JobSchedulerError> {
        let graph = self.graph.clone();
        let store = self.store.clone();

        let job = Job::new_async(self.config.cron.as_str(), move |_uuid, _lock| {
            let graph = graph.clone();
            let store = store.clone();
            Box::pin(async move {
                debug!("Starting scheduled decay");
                match decay_and_persist(&graph, &store).await {
                    Ok(Some(decayed)) => info!(decayed, "Scheduled decay complete"),
                    Ok(None) => debug!("Decay already ran today"),
                    Err(e) => error!(error = %e, "Scheduled decay failed"),
                }
            })
        })?;

        self.scheduler.add(job).await?;

        if self.config.run_on_start {
            debug!("Running initial decay on start");
            if let Err(e) = self.run_now().await {
                error!(error = %e, "Initial decay failed");
            }
        }

        self.scheduler.start().await?;

        info!(cron = %self.config.cron, "Decay scheduler started");

        Ok(())
    }

    /// Stop the scheduler gracefully.
    pub async fn shutdown(&mut self) -> Result<(), JobSchedulerError> {
        info!("Shutting down decay scheduler");
        self.scheduler.shutdown().await
    }

    /// Run decay outside the schedule. Returns `None` if it already ran
    /// today.
    pub async fn run_now(&self) -> NoesisResult<Option<usize>> {
        decay_and_persist(&self.graph, &self.store).await
    }
}

/// Decay every node under the graph lock, then persist the new state.
pub async fn decay_and_persist(
    graph: &SharedGraph,
    store: &CognitiveStore,
) -> NoesisResult<Option<usize>> {
    let mut graph = graph.lock().await;
    let Some(decayed) = graph.run_daily_decay(Utc::now()) else {
        return Ok(None);
    };
    let saved = store.save_all(&graph.snapshot())?;
    if let Some(day) = graph.last_decay_day() {
        store.set_last_decay_day(day)?;
    }
    debug!(decayed, saved, "Persisted decayed state");
    Ok(Some(decayed))
}
