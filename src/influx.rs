//!
//! InfluxDB sink using the 1.x HTTP write API.
//!
use crate::config::InfluxConfig;
use crate::points::Point;
use crate::{Error, Result};
use std::fmt::Write;

/// Timestamp precision of a write
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precision {
    /// Seconds
    Seconds,
}

impl Precision {
    /// Value of the `precision` query parameter
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Seconds => "s",
        }
    }
}

/// Destination of point batches
#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    /// Write all points in one batch
    async fn write_points(&self, points: &[Point], precision: Precision) -> Result<()>;
}

/// InfluxDB HTTP client
#[derive(Clone)]
pub struct Client {
    write_url: url::Url,
    database: String,
    username: String,
    password: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("write_url", &self.write_url)
            .field("database", &self.database)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client from connection settings
    pub fn new(config: &InfluxConfig) -> Result<Self> {
        let scheme = if config.ssl { "https" } else { "http" };
        let write_url = url::Url::parse(&format!(
            "{}://{}:{}/write",
            scheme, config.host, config.port
        ))?;

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.ssl && !config.verify_ssl)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            write_url,
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            client,
        })
    }

    /// Write a batch of points
    #[tracing::instrument(level = "debug", skip_all, fields(points = points.len()))]
    pub async fn write_points(&self, points: &[Point], precision: Precision) -> Result<()> {
        let body = encode_points(points);
        if body.is_empty() {
            tracing::debug!("Nothing to write");
            return Ok(());
        }

        let mut request = self
            .client
            .post(self.write_url.clone())
            .query(&[("db", self.database.as_str()), ("precision", precision.as_str())]);
        if !self.username.is_empty() {
            request = request.basic_auth(&self.username, Some(&self.password));
        }

        let result = request.body(body).send().await?;

        let status = result.status();
        if status.is_success() {
            tracing::debug!("Wrote {} points to {}", points.len(), self.database);
            Ok(())
        } else {
            let text = result.text().await.unwrap_or_default();
            tracing::error!("Write to {} failed: {} {}", self.database, status, text);
            Err(Error::WebServer(status.as_u16(), text))
        }
    }
}

#[async_trait::async_trait]
impl Sink for Client {
    async fn write_points(&self, points: &[Point], precision: Precision) -> Result<()> {
        Client::write_points(self, points, precision).await
    }
}

/// Encode points as line protocol, one per line
#[must_use]
pub fn encode_points(points: &[Point]) -> String {
    let mut body = String::new();
    for point in points {
        if !point.value.is_finite() {
            tracing::warn!(
                "Dropping {} point with non-finite value {}",
                point.measurement,
                point.value
            );
            continue;
        }
        if !body.is_empty() {
            body.push('\n');
        }
        encode_point(&mut body, point);
    }
    body
}

fn encode_point(out: &mut String, point: &Point) {
    escape_into(out, &point.measurement, &[',', ' ']);
    for (key, value) in &point.tags {
        // InfluxDB rejects empty tag values
        if value.is_empty() {
            continue;
        }
        out.push(',');
        escape_into(out, key, &[',', '=', ' ']);
        out.push('=');
        escape_into(out, value, &[',', '=', ' ']);
    }
    let _ = write!(out, " value={}", point.value);
    if let Some(timestamp) = point.timestamp {
        let _ = write!(out, " {timestamp}");
    }
}

fn escape_into(out: &mut String, s: &str, special: &[char]) {
    for c in s.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}
