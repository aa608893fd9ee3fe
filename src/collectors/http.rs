//! Generic HTTP collector.
//!
//! Posts `{location, radius}` to a configured URL and expects
//! `{"score": f64, "metrics": {..}, "confidence": "high|medium|low"}` back.
//! Anything provider-specific lives behind that URL.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Collector, CollectorError};
use crate::config::HttpCollectorConfig;
use crate::models::{AnalysisRequest, CollectorResult, Confidence};

#[derive(Debug, Serialize)]
struct UpstreamRequest<'a> {
    location: &'a str,
    radius: f64,
}

#[derive(Debug, Deserialize)]
struct UpstreamResponse {
    score: f64,
    #[serde(default)]
    metrics: BTreeMap<String, f64>,
    #[serde(default)]
    confidence: Confidence,
}

#[derive(Debug, Clone)]
pub struct HttpJsonCollector {
    category: String,
    url: String,
    headers: Vec<(String, String)>,
    client: reqwest::Client,
}

impl HttpJsonCollector {
    pub fn new(category: impl Into<String>, url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            category: category.into(),
            url: url.into(),
            headers: Vec::new(),
            client,
        }
    }

    pub fn from_config(config: &HttpCollectorConfig, client: reqwest::Client) -> Self {
        let mut collector = Self::new(&config.category, &config.url, client);
        collector.headers = config
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        collector
    }

    async fn fetch(&self, request: &AnalysisRequest) -> Result<UpstreamResponse, CollectorError> {
        let mut builder = self.client.post(&self.url).json(&UpstreamRequest {
            location: request.display_location(),
            radius: request.radius(),
        });
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CollectorError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectorError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        response
            .json::<UpstreamResponse>()
            .await
            .map_err(|e| CollectorError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl Collector for HttpJsonCollector {
    fn category(&self) -> &str {
        &self.category
    }

    async fn collect(
        &self,
        request: &AnalysisRequest,
        cancel: CancellationToken,
    ) -> Result<CollectorResult, CollectorError> {
        let start = Instant::now();

        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(CollectorError::Cancelled),
            body = self.fetch(request) => body?,
        };

        if !body.score.is_finite() {
            return Err(CollectorError::InvalidResponse(format!(
                "non-finite score {}",
                body.score
            )));
        }

        debug!(
            category = %self.category,
            score = body.score,
            metrics = body.metrics.len(),
            "Upstream collector responded"
        );

        let mut result = CollectorResult::new(&self.category, body.score)
            .with_confidence(body.confidence)
            .with_elapsed(start.elapsed());
        result.metrics = body.metrics;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_response_defaults() {
        let body: UpstreamResponse = serde_json::from_str(r#"{"score": 61.5}"#).unwrap();
        assert_eq!(body.score, 61.5);
        assert!(body.metrics.is_empty());
        assert_eq!(body.confidence, Confidence::Medium);

        let body: UpstreamResponse = serde_json::from_str(
            r#"{"score": 80, "metrics": {"population": 12000}, "confidence": "high"}"#,
        )
        .unwrap();
        assert_eq!(body.metrics.get("population"), Some(&12000.0));
        assert_eq!(body.confidence, Confidence::High);
    }

    #[tokio::test]
    async fn test_cancelled_before_response() {
        let collector = HttpJsonCollector::new(
            "demographics",
            "http://127.0.0.1:9/unreachable",
            reqwest::Client::new(),
        );
        let request = AnalysisRequest::new("A", 1.0, None).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = collector.collect(&request, cancel).await;
        assert!(result.is_err());
    }
}
