use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::request::AnalysisRequest;

/// Decimal places the radius is rounded to before hashing
pub const RADIUS_PRECISION: usize = 3;

/// Deterministic digest of a normalized [`AnalysisRequest`]
///
/// The only cache key the engine uses. Two requests that differ only in the
/// casing or whitespace of the location, or in radius noise below
/// [`RADIUS_PRECISION`] decimals, produce the same fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestFingerprint(String);

impl RequestFingerprint {
    pub fn from_request(request: &AnalysisRequest) -> Self {
        let categories = request
            .categories()
            .map(|set| set.iter().cloned().collect::<Vec<_>>().join(","))
            .unwrap_or_else(|| "*".to_string());

        let canonical = format!(
            "{}|{:.prec$}|{}",
            request.location(),
            request.radius(),
            categories,
            prec = RADIUS_PRECISION
        );

        let digest = Sha256::digest(canonical.as_bytes());
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RequestFingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
