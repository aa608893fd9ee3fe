//! # Orchestration
//!
//! The request path of the engine:
//!
//! - [`Orchestrator`]: cache lookup, concurrent collector fan-out under
//!   breakers and deadlines, aggregation, cache write and persistence
//! - [`ScoreAggregator`]: weighted merge of whichever categories succeeded
//! - [`BatchCoordinator`]: ordered, failure-isolated batches of requests
//! - [`EngineMetrics`]: request and collector counters

pub mod aggregator;
pub mod batch;
pub mod metrics;
pub mod orchestrator;

pub use aggregator::ScoreAggregator;
pub use batch::{BatchCoordinator, BatchItemError, BatchItemResult, BatchReport};
pub use metrics::{CollectorCallCounts, EngineMetrics, EngineMetricsSnapshot};
pub use orchestrator::{collectors_from_config, Orchestrator, OrchestratorBuilder};
