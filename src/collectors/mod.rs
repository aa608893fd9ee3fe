//! # Collectors
//!
//! A collector turns a normalized [`AnalysisRequest`] into one category's
//! [`CollectorResult`]. Collectors are supplied by the embedding
//! application; the engine only depends on the [`Collector`] contract.
//!
//! ## Usage
//!
//! ```rust
//! use async_trait::async_trait;
//! use sitescore_core::collectors::{Collector, CollectorError, CollectorRegistry};
//! use sitescore_core::models::{AnalysisRequest, CollectorResult};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug)]
//! struct FixedScore;
//!
//! #[async_trait]
//! impl Collector for FixedScore {
//!     fn category(&self) -> &str {
//!         "demographics"
//!     }
//!
//!     async fn collect(
//!         &self,
//!         _request: &AnalysisRequest,
//!         _cancel: CancellationToken,
//!     ) -> Result<CollectorResult, CollectorError> {
//!         Ok(CollectorResult::new("demographics", 72.0))
//!     }
//! }
//!
//! let mut registry = CollectorRegistry::new();
//! registry.register(Arc::new(FixedScore)).unwrap();
//! assert_eq!(registry.categories(), vec!["demographics"]);
//! ```

pub mod http;

pub use http::HttpJsonCollector;

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{AggregatorError, AggregatorResult};
use crate::models::{AnalysisRequest, CollectorResult};

/// Errors a collector raises instead of returning a sentinel result
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollectorError {
    #[error("upstream request failed: {0}")]
    Upstream(String),
    #[error("upstream returned status {status}")]
    UpstreamStatus { status: u16 },
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),
    #[error("collection cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

/// Contract every data collector satisfies
///
/// Implementations must stop work promptly once `cancel` fires and must
/// report failures through `Err`, never by returning a made-up score.
#[async_trait]
pub trait Collector: Send + Sync + fmt::Debug {
    /// Category name; doubles as the collector's circuit breaker identity
    fn category(&self) -> &str;

    async fn collect(
        &self,
        request: &AnalysisRequest,
        cancel: CancellationToken,
    ) -> Result<CollectorResult, CollectorError>;
}

/// Set of collectors available to the orchestrator, one per category
#[derive(Debug, Default, Clone)]
pub struct CollectorRegistry {
    collectors: Vec<Arc<dyn Collector>>,
    categories: Vec<String>,
    index: HashMap<String, usize>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collector. Category names are unique.
    pub fn register(&mut self, collector: Arc<dyn Collector>) -> AggregatorResult<()> {
        let category = collector.category().trim().to_lowercase();
        if category.is_empty() {
            return Err(AggregatorError::Configuration(
                "collector category must not be empty".to_string(),
            ));
        }
        if self.index.contains_key(&category) {
            return Err(AggregatorError::Configuration(format!(
                "collector already registered for category '{category}'"
            )));
        }

        self.index.insert(category.clone(), self.collectors.len());
        self.categories.push(category.clone());
        self.collectors.push(collector);
        info!(category = %category, total_collectors = self.collectors.len(), "Registered collector");
        Ok(())
    }

    pub fn with_collector(mut self, collector: Arc<dyn Collector>) -> AggregatorResult<Self> {
        self.register(collector)?;
        Ok(self)
    }

    pub fn get(&self, category: &str) -> Option<Arc<dyn Collector>> {
        self.index
            .get(category)
            .map(|&i| Arc::clone(&self.collectors[i]))
    }

    /// Categories in registration order
    pub fn categories(&self) -> Vec<&str> {
        self.categories.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Collectors that should run for `request`, paired with their category
    ///
    /// Fails with `InvalidRequest` if the request names a category nobody
    /// collects.
    pub fn select(
        &self,
        request: &AnalysisRequest,
    ) -> AggregatorResult<Vec<(String, Arc<dyn Collector>)>> {
        if let Some(subset) = request.categories() {
            let unknown: Vec<&str> = subset
                .iter()
                .filter(|c| !self.index.contains_key(c.as_str()))
                .map(String::as_str)
                .collect();
            if !unknown.is_empty() {
                return Err(AggregatorError::invalid_request(format!(
                    "unknown categories: {}",
                    unknown.join(", ")
                )));
            }
        }

        Ok(self
            .categories
            .iter()
            .zip(&self.collectors)
            .filter(|(c, _)| request.includes_category(c))
            .map(|(c, collector)| (c.clone(), Arc::clone(collector)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Named(&'static str);

    #[async_trait]
    impl Collector for Named {
        fn category(&self) -> &str {
            self.0
        }

        async fn collect(
            &self,
            _request: &AnalysisRequest,
            _cancel: CancellationToken,
        ) -> Result<CollectorResult, CollectorError> {
            Ok(CollectorResult::new(self.0, 50.0))
        }
    }

    fn registry() -> CollectorRegistry {
        CollectorRegistry::new()
            .with_collector(Arc::new(Named("demographics")))
            .unwrap()
            .with_collector(Arc::new(Named("safety")))
            .unwrap()
            .with_collector(Arc::new(Named("economic")))
            .unwrap()
    }

    #[test]
    fn test_duplicate_category_rejected() {
        let mut registry = registry();
        let err = registry.register(Arc::new(Named("safety"))).unwrap_err();
        assert!(matches!(err, AggregatorError::Configuration(_)));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_categories_keep_registration_order() {
        assert_eq!(registry().categories(), vec!["demographics", "safety", "economic"]);
    }

    #[test]
    fn test_select_honours_subset() {
        let registry = registry();
        let all = AnalysisRequest::new("A", 1.0, None).unwrap();
        assert_eq!(registry.select(&all).unwrap().len(), 3);

        let subset =
            AnalysisRequest::new("A", 1.0, Some(vec!["economic".into(), "safety".into()])).unwrap();
        let selected: Vec<_> = registry
            .select(&subset)
            .unwrap()
            .into_iter()
            .map(|(c, _)| c)
            .collect();
        assert_eq!(selected, vec!["safety", "economic"]);

        let unknown = AnalysisRequest::new("A", 1.0, Some(vec!["weather".into()])).unwrap();
        assert!(matches!(
            registry.select(&unknown),
            Err(AggregatorError::InvalidRequest(_))
        ));
    }
}
