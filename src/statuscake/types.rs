//!
//! Types returned from the StatusCake API.
//!
//! NOTE: The types here are not exhaustive to the APIs.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Test identifier
pub type TestId = u64;

/// All tests by ID
pub type Tests = BTreeMap<TestId, Test>;

/// Probe server code to ISO country code
pub type Locations = HashMap<String, String>;

/// Performance samples by test ID
pub type Performances = BTreeMap<TestId, Vec<PerformanceSample>>;

/// Kind of check a test performs
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum TestType {
    /// HTTP GET
    Http,
    /// HTTP HEAD
    Head,
    /// TCP connect
    Tcp,
    /// DNS lookup
    Dns,
    /// SMTP banner
    Smtp,
    /// SSH banner
    Ssh,
    /// ICMP ping
    Ping,
    /// Push (heartbeat) test
    Push,
    /// Anything we don't know about
    Other(String),
}

impl TestType {
    /// Name as used by the API
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Http => "HTTP",
            Self::Head => "HEAD",
            Self::Tcp => "TCP",
            Self::Dns => "DNS",
            Self::Smtp => "SMTP",
            Self::Ssh => "SSH",
            Self::Ping => "PING",
            Self::Push => "PUSH",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for TestType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "HTTP" => Self::Http,
            "HEAD" => Self::Head,
            "TCP" => Self::Tcp,
            "DNS" => Self::Dns,
            "SMTP" => Self::Smtp,
            "SSH" => Self::Ssh,
            "PING" => Self::Ping,
            "PUSH" => Self::Push,
            _ => Self::Other(s),
        }
    }
}

impl From<TestType> for String {
    fn from(t: TestType) -> Self {
        match t {
            TestType::Other(s) => s,
            t => t.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for TestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last known status of a test
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum TestStatus {
    /// Up
    Up,
    /// Down
    Down,
    /// Anything else, e.g. paused tests that never ran
    Other(String),
}

impl TestStatus {
    /// Name as used by the API
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Up => "Up",
            Self::Down => "Down",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for TestStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Up" => Self::Up,
            "Down" => Self::Down,
            _ => Self::Other(s),
        }
    }
}

impl From<TestStatus> for String {
    fn from(s: TestStatus) -> Self {
        match s {
            TestStatus::Other(s) => s,
            s => s.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned from /Tests
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Test {
    /// Test ID
    #[serde(rename = "TestID")]
    pub test_id: TestId,
    /// Name of the test
    #[serde(rename = "WebsiteName")]
    pub website_name: String,
    /// Test type
    #[serde(rename = "TestType")]
    pub test_type: TestType,
    /// Uptime percentage, zero when not reported
    #[serde(rename = "Uptime", default, deserialize_with = "null_as_default")]
    pub uptime: f64,
    /// Test is paused
    #[serde(rename = "Paused", default, deserialize_with = "null_as_default")]
    pub paused: bool,
    /// Current status
    #[serde(rename = "Status")]
    pub status: TestStatus,
}

/// Returned from /Locations/json
#[derive(Clone, Debug, Deserialize)]
pub struct Location {
    /// Probe server code
    pub servercode: String,
    /// ISO country code, may be empty
    #[serde(default)]
    pub countryiso: Option<String>,
}

/// Returned from /Tests/Checks
#[derive(Clone, Debug, Deserialize)]
pub struct Check {
    /// Probe server code
    #[serde(rename = "Location")]
    pub location: String,
    /// Unix timestamp in seconds
    #[serde(rename = "Time")]
    pub time: i64,
    /// Performance in milliseconds, missing for checks that didn't complete
    #[serde(rename = "Performance", default)]
    pub performance: Option<f64>,
}

/// A check enriched with the country of its probe
#[derive(Clone, Debug, PartialEq)]
pub struct PerformanceSample {
    /// Probe server code
    pub location: String,
    /// ISO country code of the probe, if known
    pub country: Option<String>,
    /// Performance in milliseconds
    pub performance: f64,
    /// Unix timestamp in seconds
    pub time: i64,
}

impl PerformanceSample {
    /// Enrich a check with the country of its probe location, `None` without a performance
    #[must_use]
    pub fn from_check(check: Check, locations: &Locations) -> Option<Self> {
        let performance = check.performance?;
        let country = locations
            .get(&check.location)
            .filter(|c| !c.is_empty())
            .cloned();
        Some(Self {
            location: check.location,
            country,
            performance,
            time: check.time,
        })
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
