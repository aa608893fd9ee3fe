//! In-process persistence sink.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use std::collections::HashSet;

use super::{
    trend_rows, AnalysisRecord, PersistenceResult, PersistenceSink, PersistenceStats,
    RequestMetadata, TrendPoint,
};
use crate::models::{normalize_location, CompositeResult};

#[derive(Debug, Default)]
struct Store {
    next_id: i64,
    records: Vec<AnalysisRecord>,
    trends: Vec<(i64, String, TrendPoint)>,
}

/// Keeps history in memory for the life of the process
#[derive(Debug, Default)]
pub struct InMemoryPersistenceSink {
    store: RwLock<Store>,
}

impl InMemoryPersistenceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.store.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn newest_first(records: &mut [AnalysisRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl PersistenceSink for InMemoryPersistenceSink {
    async fn save(
        &self,
        result: &CompositeResult,
        metadata: &RequestMetadata,
    ) -> PersistenceResult<i64> {
        let created_at = Utc::now();
        let mut store = self.store.write();
        store.next_id += 1;
        let id = store.next_id;

        store.records.push(AnalysisRecord {
            id,
            analysis_id: metadata.analysis_id,
            fingerprint: metadata.fingerprint.as_str().to_string(),
            location: result.location.clone(),
            display_location: metadata.display_location.clone(),
            radius: result.radius,
            overall_score: result.overall_score,
            partial: result.partial,
            elapsed_ms: metadata.elapsed_ms,
            result: result.clone(),
            created_at,
        });

        for (metric, score) in trend_rows(result) {
            store.trends.push((
                id,
                result.location.clone(),
                TrendPoint {
                    metric,
                    score,
                    recorded_at: created_at,
                },
            ));
        }

        Ok(id)
    }

    async fn get(&self, id: i64) -> PersistenceResult<Option<AnalysisRecord>> {
        Ok(self
            .store
            .read()
            .records
            .iter()
            .find(|record| record.id == id)
            .cloned())
    }

    async fn query_by_location(
        &self,
        location: &str,
        limit: usize,
    ) -> PersistenceResult<Vec<AnalysisRecord>> {
        let location = normalize_location(location);
        let mut records: Vec<AnalysisRecord> = self
            .store
            .read()
            .records
            .iter()
            .filter(|record| record.location == location)
            .cloned()
            .collect();
        newest_first(&mut records);
        records.truncate(limit);
        Ok(records)
    }

    async fn query_trend(
        &self,
        location: &str,
        metric: &str,
        since: DateTime<Utc>,
    ) -> PersistenceResult<Vec<TrendPoint>> {
        let location = normalize_location(location);
        let metric = metric.trim().to_lowercase();
        let mut points: Vec<TrendPoint> = self
            .store
            .read()
            .trends
            .iter()
            .filter(|(_, loc, point)| {
                *loc == location && point.metric == metric && point.recorded_at >= since
            })
            .map(|(_, _, point)| point.clone())
            .collect();
        points.sort_by_key(|point| point.recorded_at);
        Ok(points)
    }

    async fn recent(&self, limit: usize) -> PersistenceResult<Vec<AnalysisRecord>> {
        let mut records = self.store.read().records.clone();
        newest_first(&mut records);
        records.truncate(limit);
        Ok(records)
    }

    async fn statistics(&self) -> PersistenceResult<PersistenceStats> {
        let store = self.store.read();
        let total = store.records.len() as u64;
        let partial = store.records.iter().filter(|r| r.partial).count() as u64;
        let unique_locations = store
            .records
            .iter()
            .map(|r| r.location.as_str())
            .collect::<HashSet<_>>()
            .len() as u64;
        let average_score = (total > 0).then(|| {
            let sum: f64 = store.records.iter().map(|r| r.overall_score).sum();
            (sum / total as f64 * 100.0).round() / 100.0
        });

        Ok(PersistenceStats {
            total_analyses: total,
            complete_analyses: total - partial,
            partial_analyses: partial,
            unique_locations,
            average_score,
        })
    }

    async fn prune_older_than(&self, days: u32) -> PersistenceResult<u64> {
        let cutoff = Utc::now() - ChronoDuration::days(i64::from(days));
        let mut store = self.store.write();

        let before = store.records.len();
        store.records.retain(|record| record.created_at >= cutoff);
        store.trends.retain(|(_, _, point)| point.recorded_at >= cutoff);

        Ok((before - store.records.len()) as u64)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
