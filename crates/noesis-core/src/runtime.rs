//! Cognitive runtime.
//!
//! Owns the shared graph, its state store and the decay scheduler, and
//! provides unified load, startup and graceful shutdown.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cognitive::DecayScheduler;
use crate::error::{NoesisError, NoesisResult};
use crate::graph::{KnowledgeGraph, SharedGraph};
use crate::store::CognitiveStore;

/// Graph, store and scheduler lifecycle.
///
/// # Example
///
/// ```ignore
/// use noesis_core::{CognitiveRuntime, KnowledgeGraph, NoesisConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = NoesisConfig::from_env();
///     let graph = KnowledgeGraph::new(config.clone());
///     let mut runtime = CognitiveRuntime::new(graph).await?;
///
///     runtime.start().await?;
///     // ... feed document events through runtime.graph() ...
///     runtime.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct CognitiveRuntime {
    graph: SharedGraph,
    store: Arc<CognitiveStore>,
    scheduler: DecayScheduler,
}

impl CognitiveRuntime {
    /// Create a runtime backed by the store at the graph's configured
    /// `store_path`, restoring persisted state into the graph.
    ///
    /// The scheduler is created but not started.
    pub async fn new(graph: KnowledgeGraph) -> NoesisResult<Self> {
        let path = graph.config().store_path.clone();
        debug!(path = %path.display(), "Creating file-backed cognitive store");
        let store = Arc::new(CognitiveStore::new(&path)?);
        Self::with_store(graph, store).await
    }

    /// Create a runtime over an existing store.
    pub async fn with_store(
        mut graph: KnowledgeGraph,
        store: Arc<CognitiveStore>,
    ) -> NoesisResult<Self> {
        let states = store.load_all()?;
        graph.restore(states);
        graph.set_last_decay_day(store.last_decay_day()?);

        let scheduler_config = graph.config().scheduler.clone();
        let graph = graph.shared();
        let scheduler = DecayScheduler::new(graph.clone(), store.clone(), scheduler_config)
            .await
            .map_err(|e| NoesisError::Scheduler(format!("Failed to create decay scheduler: {}", e)))?;

        Ok(Self {
            graph,
            store,
            scheduler,
        })
    }

    /// Start the decay scheduler.
    pub async fn start(&self) -> NoesisResult<()> {
        self.scheduler
            .start()
            .await
            .map_err(|e| NoesisError::Scheduler(format!("Failed to start decay scheduler: {}", e)))?;
        info!("Cognitive runtime started");
        Ok(())
    }

    /// Stop the scheduler and persist the current state.
    pub async fn shutdown(&mut self) -> NoesisResult<()> {
        debug!("Shutting down cognitive runtime");
        self.scheduler.shutdown().await.map_err(|e| {
            NoesisError::Scheduler(format!("Failed to shutdown decay scheduler: {}", e))
        })?;
        let saved = self.persist().await?;
        info!(saved, "Cognitive runtime stopped");
        Ok(())
    }

    /// Write every node's state to the store. Returns the number written.
    pub async fn persist(&self) -> NoesisResult<usize> {
        let graph = self.graph.lock().await;
        let saved = self.store.save_all(&graph.snapshot())?;
        if let Some(day) = graph.last_decay_day() {
            self.store.set_last_decay_day(day)?;
        }
        Ok(saved)
    }

    /// Run decay now instead of waiting for the schedule.
    pub async fn run_decay(&self) -> NoesisResult<Option<usize>> {
        self.scheduler.run_now().await
    }

    pub fn graph(&self) -> SharedGraph {
        self.graph.clone()
    }

    pub fn store(&self) -> Arc<CognitiveStore> {
        self.store.clone()
    }

    pub fn scheduler(&self) -> &DecayScheduler {
        &self.scheduler
    }
}
