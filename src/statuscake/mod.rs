//!
//! StatusCake API client.
//!
use crate::cache::Cache;
use crate::config::StatusCakeConfig;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing_futures::Instrument;

mod types;

pub use types::{
    Check, Location, Locations, PerformanceSample, Performances, Test, TestId, TestStatus,
    TestType, Tests,
};

/// Maximum number of concurrent check history requests
pub const FETCH_CONCURRENCY: usize = 5;

/// How long the probe location table is cached
pub const LOCATIONS_TTL: Duration = Duration::from_secs(3600);

const TESTS_KEY: &str = "tests";
const LOCATIONS_KEY: &str = "locations";
const CHECK_FIELDS: &str = "status,location,time,performance";

/// Data source used by the jobs
#[async_trait::async_trait]
pub trait Monitoring: Send + Sync {
    /// List all tests, `ttl` of `None` bypasses the cache
    async fn list_tests(&self, ttl: Option<Duration>) -> Result<Tests>;

    /// Fetch check history for every test, tests that fail are left out
    async fn fetch_performance(&self, tests: &Tests) -> Result<Performances>;
}

/// The `Client` wraps the StatusCake API.
#[derive(Clone)]
pub struct Client {
    base_url: url::Url,
    client: reqwest::Client,
    cache: Arc<dyn Cache>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client, credentials are sent as static headers on every request
    pub fn new(config: &StatusCakeConfig, cache: Arc<dyn Cache>) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::HeaderName::from_static("api"),
            header_value(&config.api_key)?,
        );
        headers.insert(
            reqwest::header::HeaderName::from_static("username"),
            header_value(&config.username)?,
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            base_url: config.base_url.clone(),
            client,
            cache,
        })
    }

    /// List all tests by ID.
    ///
    /// A failed response is logged and an empty map is returned, nothing gets cached.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn list_tests(&self, ttl: Option<Duration>) -> Result<Tests> {
        self.cached(TESTS_KEY, ttl, || async {
            let tests: Option<Vec<Test>> = self.get_reference("Tests", "test list").await?;
            Ok::<_, Error>(
                tests.map(|tests| tests.into_iter().map(|t| (t.test_id, t)).collect()),
            )
        })
        .await
    }

    /// List probe locations as server code to country code.
    ///
    /// Same failure policy as [`Client::list_tests`].
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn list_locations(&self, ttl: Option<Duration>) -> Result<Locations> {
        self.cached(LOCATIONS_KEY, ttl, || async {
            let locations: Option<Vec<Location>> =
                self.get_reference("Locations/json", "locations list").await?;
            Ok::<_, Error>(locations.map(|locations| {
                locations
                    .into_iter()
                    .map(|l| (l.servercode, l.countryiso.unwrap_or_default()))
                    .collect()
            }))
        })
        .await
    }

    /// Fetch check history for every test, enriched with the probe country.
    ///
    /// At most [`FETCH_CONCURRENCY`] requests are in flight. A test whose request fails,
    /// times out or returns garbage is logged and missing from the result.
    #[tracing::instrument(level = "debug", skip_all, fields(tests = tests.len()))]
    pub async fn fetch_performance(&self, tests: &Tests) -> Result<Performances> {
        let locations = self.list_locations(Some(LOCATIONS_TTL)).await?;

        let outcomes = crate::pool::run_bounded(tests.keys().copied(), FETCH_CONCURRENCY, |id| {
            self.fetch_checks(id)
                .instrument(tracing::debug_span!("checks", test_id = id))
        })
        .await;

        let mut performances = Performances::new();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(checks) => {
                    let samples = checks
                        .into_iter()
                        .filter_map(|check| PerformanceSample::from_check(check, &locations))
                        .collect();
                    performances.insert(id, samples);
                }
                Err(e) => {
                    let name = tests.get(&id).map_or("", |t| t.website_name.as_str());
                    tracing::error!(
                        test_id = id,
                        "Getting performance data for test \"{}\" failed: {}",
                        name,
                        e
                    );
                }
            }
        }

        tracing::debug!(
            "Fetched performance data for {} of {} tests",
            performances.len(),
            tests.len()
        );
        Ok(performances)
    }

    async fn fetch_checks(&self, id: TestId) -> Result<Vec<Check>> {
        let url = self.base_url.join("Tests/Checks")?;
        let id = id.to_string();

        let result = self
            .client
            .get(url)
            .query(&[("TestID", id.as_str()), ("Fields", CHECK_FIELDS)])
            .send()
            .await?;

        if !result.status().is_success() {
            return Err(Error::WebServer(
                result.status().as_u16(),
                result.status().to_string(),
            ));
        }

        let body = result.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// GET reference data, `None` when the server didn't answer with something usable
    async fn get_reference<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        what: &str,
    ) -> Result<Option<T>> {
        let url = self.base_url.join(path)?;
        let result = self.client.get(url).send().await?;

        let status = result.status();
        if !status.is_success() {
            tracing::error!(
                severity = "critical",
                code = status.as_u16(),
                "Getting {} failed: {} {}",
                what,
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            );
            return Ok(None);
        }

        let body = result.bytes().await?;
        match serde_json::from_slice(&body) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                tracing::error!(severity = "critical", "Getting {} failed: {}", what, e);
                Ok(None)
            }
        }
    }

    /// Serve `key` from the cache if `ttl` is set and a usable value is stored, else fetch.
    ///
    /// Fresh values are only stored when `ttl` is set and the fetch produced a value.
    async fn cached<T, F, Fut>(&self, key: &str, ttl: Option<Duration>, fetch: F) -> Result<T>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Default,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Option<T>>>,
    {
        let ttl = ttl.filter(|ttl| !ttl.is_zero());

        if ttl.is_some() {
            match self.cache.get(key) {
                Some(serde_json::Value::Null) | None => {}
                Some(value) => match serde_json::from_value(value) {
                    Ok(value) => {
                        tracing::trace!("Using cached {}", key);
                        return Ok(value);
                    }
                    Err(e) => tracing::debug!("Discarding cached {}: {}", key, e),
                },
            }
        }

        let Some(value) = fetch().await? else {
            return Ok(T::default());
        };

        if let Some(ttl) = ttl {
            if let Err(e) = self.cache.set(key, serde_json::to_value(&value)?, ttl) {
                tracing::warn!("Failed to cache {}: {}", key, e);
            }
        }

        Ok(value)
    }
}

#[async_trait::async_trait]
impl Monitoring for Client {
    async fn list_tests(&self, ttl: Option<Duration>) -> Result<Tests> {
        Client::list_tests(self, ttl).await
    }

    async fn fetch_performance(&self, tests: &Tests) -> Result<Performances> {
        Client::fetch_performance(self, tests).await
    }
}

fn header_value(value: &str) -> Result<reqwest::header::HeaderValue> {
    reqwest::header::HeaderValue::from_str(value)
        .map_err(|_e| Error::general("Credentials are not valid header values"))
}

#[cfg(test)]
mod test {
    use super::{Client, TestStatus, TestType, Tests};
    use crate::cache::{Cache, MemoryCache};
    use crate::config::StatusCakeConfig;
    use mockito::Matcher;
    use serde_json::json;
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    const TESTS: &str = r#"[
        {"TestID": 101, "Paused": false, "TestType": "HTTP", "WebsiteName": "A", "Status": "Up", "Uptime": 99.9},
        {"TestID": 102, "Paused": true, "TestType": "PING", "WebsiteName": "B", "Status": "Down", "Uptime": 42}
    ]"#;

    const LOCATIONS: &str = r#"[
        {"servercode": "NL1", "countryiso": "NL", "title": "Amsterdam 1"},
        {"servercode": "US1", "countryiso": "US"}
    ]"#;

    fn client(server: &mockito::Server, cache: Arc<MemoryCache>) -> Client {
        let config = StatusCakeConfig::new(&server.url(), "secret", "joe").unwrap();
        Client::new(&config, cache).unwrap()
    }

    fn client_with_timeout(server: &mockito::Server, timeout: Duration) -> Client {
        let mut config = StatusCakeConfig::new(&server.url(), "secret", "joe").unwrap();
        config.timeout = timeout;
        Client::new(&config, Arc::new(MemoryCache::new())).unwrap()
    }

    fn checks_query(id: u64) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("TestID".into(), id.to_string()),
            Matcher::UrlEncoded("Fields".into(), "status,location,time,performance".into()),
        ])
    }

    #[tokio::test]
    async fn list_tests_sends_credentials() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/Tests")
            .match_header("api", "secret")
            .match_header("username", "joe")
            .with_status(200)
            .with_body(TESTS)
            .create_async()
            .await;

        let tests = client(&server, Arc::new(MemoryCache::new()))
            .list_tests(None)
            .await
            .unwrap();
        mock.assert_async().await;

        assert_eq!(tests.len(), 2);
        assert_eq!(tests[&101].website_name, "A");
        assert_eq!(tests[&102].test_type, TestType::Ping);
        assert_eq!(tests[&102].status, TestStatus::Down);
        assert!(tests[&102].paused);
    }

    #[tokio::test]
    async fn null_fields_do_not_drop_tests() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/Tests")
            .with_status(200)
            .with_body(
                r#"[
                    {"TestID": 101, "Paused": false, "TestType": "HTTP", "WebsiteName": "A", "Status": "Up", "Uptime": 99.9},
                    {"TestID": 102, "Paused": false, "TestType": "HTTP", "WebsiteName": "B", "Status": "Up", "Uptime": null}
                ]"#,
            )
            .create_async()
            .await;

        let tests = client(&server, Arc::new(MemoryCache::new()))
            .list_tests(None)
            .await
            .unwrap();
        assert_eq!(tests.len(), 2);
        assert!((tests[&101].uptime - 99.9).abs() < f64::EPSILON);
        assert!((tests[&102].uptime - 0.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn no_ttl_bypasses_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/Tests")
            .with_status(200)
            .with_body(TESTS)
            .expect(2)
            .create_async()
            .await;

        let cache = Arc::new(MemoryCache::new());
        cache
            .set("tests", json!({}), Duration::from_secs(60))
            .unwrap();

        let client = client(&server, cache.clone());
        assert_eq!(client.list_tests(None).await.unwrap().len(), 2);
        assert_eq!(client.list_tests(None).await.unwrap().len(), 2);
        mock.assert_async().await;

        // Untouched by the uncached calls
        assert_eq!(cache.get("tests"), Some(json!({})));
    }

    #[tokio::test]
    async fn ttl_uses_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/Tests")
            .with_status(200)
            .with_body(TESTS)
            .expect(1)
            .create_async()
            .await;

        let cache = Arc::new(MemoryCache::new());
        let client = client(&server, cache.clone());
        let ttl = Some(Duration::from_secs(3600));

        let first = client.list_tests(ttl).await.unwrap();
        assert!(cache.has("tests"));
        let second = client.list_tests(ttl).await.unwrap();
        mock.assert_async().await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn cached_null_is_a_miss() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/Locations/json")
            .with_status(200)
            .with_body(LOCATIONS)
            .expect(1)
            .create_async()
            .await;

        let cache = Arc::new(MemoryCache::new());
        cache
            .set("locations", serde_json::Value::Null, Duration::from_secs(60))
            .unwrap();

        let locations = client(&server, cache.clone())
            .list_locations(Some(Duration::from_secs(3600)))
            .await
            .unwrap();
        mock.assert_async().await;

        assert_eq!(locations.get("NL1").map(String::as_str), Some("NL"));
        assert_eq!(cache.get("locations"), Some(json!({"NL1": "NL", "US1": "US"})));
    }

    #[tokio::test]
    async fn failed_reference_fetch_is_empty_and_not_cached() {
        let mut server = mockito::Server::new_async().await;
        let _tests = server
            .mock("GET", "/Tests")
            .with_status(503)
            .create_async()
            .await;
        let _locations = server
            .mock("GET", "/Locations/json")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let cache = Arc::new(MemoryCache::new());
        let client = client(&server, cache.clone());
        let ttl = Some(Duration::from_secs(3600));

        assert!(client.list_tests(ttl).await.unwrap().is_empty());
        assert!(client.list_locations(ttl).await.unwrap().is_empty());
        assert!(!cache.has("tests"));
        assert!(!cache.has("locations"));
    }

    #[tokio::test]
    async fn fetch_performance_enriches_samples() {
        let mut server = mockito::Server::new_async().await;
        let _locations = server
            .mock("GET", "/Locations/json")
            .with_status(200)
            .with_body(LOCATIONS)
            .create_async()
            .await;
        let _checks = server
            .mock("GET", "/Tests/Checks")
            .match_query(checks_query(101))
            .with_status(200)
            .with_body(
                r#"[
                    {"Location": "NL1", "Time": 1700000000, "Performance": 250.5, "Status": 200},
                    {"Location": "NL1", "Time": 1700000030, "Performance": null, "Status": 500},
                    {"Location": "XX1", "Time": 1700000060, "Performance": 300, "Status": 200}
                ]"#,
            )
            .create_async()
            .await;

        let client = client(&server, Arc::new(MemoryCache::new()));
        let tests: Tests = client_tests();
        let tests: Tests = tests.into_iter().filter(|(id, _)| *id == 101).collect();

        let performances = client.fetch_performance(&tests).await.unwrap();
        let samples = &performances[&101];
        assert_eq!(samples.len(), 2);

        assert_eq!(samples[0].location, "NL1");
        assert_eq!(samples[0].country.as_deref(), Some("NL"));
        assert_eq!(samples[0].time, 1_700_000_000);
        assert!((samples[0].performance - 250.5).abs() < f64::EPSILON);

        assert_eq!(samples[1].location, "XX1");
        assert!(samples[1].country.is_none());
    }

    #[tokio::test]
    async fn fetch_performance_isolates_failures() {
        let mut server = mockito::Server::new_async().await;
        let _locations = server
            .mock("GET", "/Locations/json")
            .with_status(200)
            .with_body(LOCATIONS)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/Tests/Checks")
            .match_query(checks_query(101))
            .with_status(200)
            .with_body(r#"[{"Location": "US1", "Time": 1700000000, "Performance": 12}]"#)
            .expect(1)
            .create_async()
            .await;
        let failing = server
            .mock("GET", "/Tests/Checks")
            .match_query(checks_query(102))
            .with_status(500)
            .expect(1)
            .create_async()
            .await;
        let garbage = server
            .mock("GET", "/Tests/Checks")
            .match_query(checks_query(103))
            .with_status(200)
            .with_body("{\"Error\": ")
            .expect(1)
            .create_async()
            .await;

        let mut tests = client_tests();
        let mut third = tests[&101].clone();
        third.test_id = 103;
        third.website_name = "C".into();
        tests.insert(103, third);

        let performances = client(&server, Arc::new(MemoryCache::new()))
            .fetch_performance(&tests)
            .await
            .unwrap();

        ok.assert_async().await;
        failing.assert_async().await;
        garbage.assert_async().await;

        assert_eq!(performances.len(), 1);
        assert_eq!(performances[&101][0].country.as_deref(), Some("US"));
        assert!(!performances.contains_key(&102));
        assert!(!performances.contains_key(&103));
    }

    #[tokio::test]
    async fn fetch_performance_drops_timed_out_tests() {
        let mut server = mockito::Server::new_async().await;
        let _locations = server
            .mock("GET", "/Locations/json")
            .with_status(200)
            .with_body(LOCATIONS)
            .create_async()
            .await;
        let _ok = server
            .mock("GET", "/Tests/Checks")
            .match_query(checks_query(101))
            .with_status(200)
            .with_body(r#"[{"Location": "NL1", "Time": 1700000000, "Performance": 12}]"#)
            .create_async()
            .await;
        let _stalled = server
            .mock("GET", "/Tests/Checks")
            .match_query(checks_query(102))
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_secs(1));
                w.write_all(b"[]")
            })
            .create_async()
            .await;

        let performances = client_with_timeout(&server, Duration::from_millis(200))
            .fetch_performance(&client_tests())
            .await
            .unwrap();

        assert_eq!(performances.len(), 1);
        assert_eq!(performances[&101][0].country.as_deref(), Some("NL"));
        assert!(!performances.contains_key(&102));
    }

    #[tokio::test]
    async fn fetch_performance_uses_cached_locations() {
        let mut server = mockito::Server::new_async().await;
        let locations = server
            .mock("GET", "/Locations/json")
            .expect(0)
            .create_async()
            .await;

        let cache = Arc::new(MemoryCache::new());
        cache
            .set("locations", json!({"DE1": "DE"}), Duration::from_secs(60))
            .unwrap();

        let performances = client(&server, cache)
            .fetch_performance(&Tests::new())
            .await
            .unwrap();
        locations.assert_async().await;
        assert!(performances.is_empty());
    }

    fn client_tests() -> Tests {
        serde_json::from_str::<Vec<super::Test>>(TESTS)
            .unwrap()
            .into_iter()
            .map(|t| (t.test_id, t))
            .collect()
    }
}
