//!
//! Conversion of StatusCake data into InfluxDB points.
//!
use crate::statuscake::{Performances, Tests};
use std::collections::BTreeMap;

/// Measurement for the uptime snapshot
pub const UPTIME_MEASUREMENT: &str = "statuscake_uptime";

/// Measurement for check performance
pub const PERFORMANCE_MEASUREMENT: &str = "statuscake_performance";

/// A single time series point with one `value` field
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    /// Measurement name
    pub measurement: String,
    /// Field value
    pub value: f64,
    /// Tags
    pub tags: BTreeMap<String, String>,
    /// Timestamp in the precision of the write, `None` lets the server stamp it
    pub timestamp: Option<i64>,
}

impl Point {
    /// Create a point without tags or timestamp
    #[must_use]
    pub fn new(measurement: &str, value: f64) -> Self {
        Self {
            measurement: measurement.to_string(),
            value,
            tags: BTreeMap::new(),
            timestamp: None,
        }
    }

    /// Add or replace a tag
    #[must_use]
    pub fn tag<V: ToString>(mut self, key: &str, value: V) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    /// Set an explicit timestamp
    #[must_use]
    pub fn timestamp(self, timestamp: i64) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..self
        }
    }
}

/// One point per test with the uptime percentage, stamped by the server
#[must_use]
pub fn build_uptime_points(tests: &Tests) -> Vec<Point> {
    tests
        .values()
        .map(|test| {
            Point::new(UPTIME_MEASUREMENT, test.uptime)
                .tag("testID", test.test_id)
                .tag("testName", &test.website_name)
                .tag("testType", &test.test_type)
                .tag("paused", test.paused)
                .tag("status", &test.status)
        })
        .collect()
}

/// One point per performance sample, stamped with the sample time.
///
/// Samples of tests missing from `tests` are skipped.
#[must_use]
pub fn build_performance_points(tests: &Tests, performances: &Performances) -> Vec<Point> {
    performances
        .iter()
        .filter_map(|(id, samples)| tests.get(id).map(|test| (test, samples)))
        .flat_map(|(test, samples)| {
            samples.iter().map(move |sample| {
                Point::new(PERFORMANCE_MEASUREMENT, sample.performance)
                    .tag("testID", test.test_id)
                    .tag("testType", &test.test_type)
                    .tag("testName", &test.website_name)
                    .tag("location", &sample.location)
                    .tag("country", sample.country.as_deref().unwrap_or_default())
                    .timestamp(sample.time)
            })
        })
        .collect()
}
