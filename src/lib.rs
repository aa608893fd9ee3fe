#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

//! # SiteScore Core
//!
//! Resilient aggregation engine for location analysis.
//!
//! ## Overview
//!
//! A location request is fanned out to a set of independent, slow and
//! occasionally broken data collectors. The engine bounds their concurrency
//! and latency, isolates their failures behind per-collector circuit breakers,
//! caches composite results by request fingerprint and recomputes a weighted
//! score over whichever collectors succeeded.
//!
//! ## Module Organization
//!
//! - [`models`] - Request, fingerprint, collector result and composite result types
//! - [`collectors`] - The `Collector` contract and the collector registry
//! - [`resilience`] - Circuit breakers and the per-collector breaker registry
//! - [`cache`] - Two-tier response cache (durable backend with volatile fallback)
//! - [`orchestration`] - Orchestrator, score aggregator and batch coordinator
//! - [`persistence`] - History and trend sink
//! - [`web`] - Axum HTTP surface
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Tracing subscriber setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sitescore_core::cache::ResponseCache;
//! use sitescore_core::collectors::CollectorRegistry;
//! use sitescore_core::config::SiteScoreConfig;
//! use sitescore_core::models::LocationQuery;
//! use sitescore_core::orchestration::Orchestrator;
//! use sitescore_core::resilience::CircuitBreakerManager;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SiteScoreConfig::default();
//! let orchestrator = Orchestrator::builder(config.clone())
//!     .collectors(CollectorRegistry::new())
//!     .circuit_breakers(Arc::new(CircuitBreakerManager::from_config(&config.circuit_breakers)))
//!     .cache(Arc::new(ResponseCache::volatile(&config.cache)))
//!     .build()?;
//!
//! let response = orchestrator
//!     .analyze_query(LocationQuery::new("1600 Amphitheatre Pkwy, Mountain View", 2.0))
//!     .await?;
//! println!("score = {}", response.result.overall_score);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod collectors;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod persistence;
pub mod resilience;
pub mod web;

pub use error::{AggregatorError, AggregatorResult};
pub use models::{AnalysisRequest, CompositeResult, LocationQuery, RequestFingerprint};
pub use orchestration::{BatchCoordinator, Orchestrator};
