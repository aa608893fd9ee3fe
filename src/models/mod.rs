//! # Data Model
//!
//! Value types that flow through the engine. Everything here is immutable
//! once built.

pub mod collector_result;
pub mod composite;
pub mod fingerprint;
pub mod request;

pub use collector_result::{
    CategoryOutcome, CollectorOutcome, CollectorReport, CollectorResult, Confidence, OutcomeStatus,
};
pub use composite::{AnalysisResponse, CategoryScore, CompositeResult, Recommendation, ScoreConfidence};
pub use fingerprint::RequestFingerprint;
pub use request::{normalize_location, AnalysisRequest, LocationQuery};
