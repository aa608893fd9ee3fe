//! Analysis request types.
//!
//! [`LocationQuery`] is the raw, caller-supplied shape. [`AnalysisRequest`]
//! is the validated, normalized value the engine works with; it can only be
//! built through [`AnalysisRequest::new`] and is never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::fingerprint::RequestFingerprint;
use crate::error::{AggregatorError, AggregatorResult};

pub const MAX_LOCATION_LENGTH: usize = 512;
pub const MAX_RADIUS: f64 = 100.0;

/// Caller-supplied request before validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationQuery {
    pub location: String,
    pub radius: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
}

impl LocationQuery {
    pub fn new(location: impl Into<String>, radius: f64) -> Self {
        Self {
            location: location.into(),
            radius,
            categories: None,
        }
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }
}

/// Validated and normalized analysis request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRequest {
    location: String,
    display_location: String,
    radius: f64,
    categories: Option<BTreeSet<String>>,
}

impl AnalysisRequest {
    /// Validate and normalize a request
    ///
    /// The location is trimmed, lowercased and has internal whitespace runs
    /// collapsed to a single space. The caller's spelling is kept separately
    /// for display and persistence.
    pub fn new(
        location: &str,
        radius: f64,
        categories: Option<Vec<String>>,
    ) -> AggregatorResult<Self> {
        let display_location = collapse_whitespace(location);
        if display_location.is_empty() {
            return Err(AggregatorError::invalid_request("location must not be empty"));
        }
        if display_location.chars().count() > MAX_LOCATION_LENGTH {
            return Err(AggregatorError::invalid_request(format!(
                "location must be at most {MAX_LOCATION_LENGTH} characters"
            )));
        }
        if !radius.is_finite() || radius <= 0.0 || radius > MAX_RADIUS {
            return Err(AggregatorError::invalid_request(format!(
                "radius must be greater than 0 and at most {MAX_RADIUS}, got {radius}"
            )));
        }

        let categories = match categories {
            None => None,
            Some(list) => {
                let mut set = BTreeSet::new();
                for category in list {
                    let name = category.trim().to_lowercase();
                    if name.is_empty() {
                        return Err(AggregatorError::invalid_request(
                            "category names must not be empty",
                        ));
                    }
                    set.insert(name);
                }
                if set.is_empty() {
                    return Err(AggregatorError::invalid_request(
                        "category subset must name at least one category",
                    ));
                }
                Some(set)
            }
        };

        Ok(Self {
            location: display_location.to_lowercase(),
            display_location,
            radius,
            categories,
        })
    }

    pub fn from_query(query: &LocationQuery) -> AggregatorResult<Self> {
        Self::new(&query.location, query.radius, query.categories.clone())
    }

    /// Canonical location used for fingerprinting and history lookups
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Location as the caller wrote it, whitespace-collapsed
    pub fn display_location(&self) -> &str {
        &self.display_location
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn categories(&self) -> Option<&BTreeSet<String>> {
        self.categories.as_ref()
    }

    /// Whether a collector of this category should run for this request
    pub fn includes_category(&self, category: &str) -> bool {
        self.categories
            .as_ref()
            .map_or(true, |set| set.contains(category))
    }

    pub fn fingerprint(&self) -> RequestFingerprint {
        RequestFingerprint::from_request(self)
    }
}

/// Canonical form of a location string used in keys and lookups
pub fn normalize_location(location: &str) -> String {
    collapse_whitespace(location).to_lowercase()
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_is_normalized() {
        let request = AnalysisRequest::new("  123  Main St,\tSpringfield ", 2.0, None).unwrap();
        assert_eq!(request.location(), "123 main st, springfield");
        assert_eq!(request.display_location(), "123 Main St, Springfield");
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        assert!(matches!(
            AnalysisRequest::new("   ", 2.0, None),
            Err(AggregatorError::InvalidRequest(_))
        ));
        assert!(AnalysisRequest::new("A", 0.0, None).is_err());
        assert!(AnalysisRequest::new("A", -1.0, None).is_err());
        assert!(AnalysisRequest::new("A", f64::NAN, None).is_err());
        assert!(AnalysisRequest::new("A", 101.0, None).is_err());
        assert!(AnalysisRequest::new(&"x".repeat(600), 1.0, None).is_err());
        assert!(AnalysisRequest::new("A", 1.0, Some(vec![])).is_err());
        assert!(AnalysisRequest::new("A", 1.0, Some(vec![" ".into()])).is_err());
    }

    #[test]
    fn test_category_subset_is_canonical() {
        let request = AnalysisRequest::new(
            "A",
            1.0,
            Some(vec!["Safety".into(), "demographics".into(), "safety".into()]),
        )
        .unwrap();
        let categories: Vec<_> = request.categories().unwrap().iter().cloned().collect();
        assert_eq!(categories, vec!["demographics", "safety"]);
        assert!(request.includes_category("safety"));
        assert!(!request.includes_category("economic"));
    }
}
