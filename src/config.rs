//!
//! Configuration for the StatusCake client, the InfluxDB sink and the job runner.
//!
//! Nothing in the library reads the process environment except [`Config::from_env`].
//! Clients take the config structs below.
use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_STATUSCAKE_URL: &str = "https://app.statuscake.com/API/";
const DEFAULT_INFLUXDB_HOST: &str = "127.0.0.1";
const DEFAULT_INFLUXDB_PORT: u16 = 8086;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// StatusCake API settings
#[derive(Clone)]
pub struct StatusCakeConfig {
    /// API base URL, always ends with a `/`
    pub base_url: url::Url,
    /// Value of the `API` header
    pub api_key: String,
    /// Value of the `Username` header
    pub username: String,
    /// Per request timeout
    pub timeout: Duration,
}

impl StatusCakeConfig {
    /// Create a config for the given base URL and credentials
    pub fn new(base_url: &str, api_key: &str, username: &str) -> Result<Self> {
        Ok(Self {
            base_url: base_url_with_slash(base_url)?,
            api_key: api_key.to_string(),
            username: username.to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }
}

impl std::fmt::Debug for StatusCakeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusCakeConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// InfluxDB connection settings
#[derive(Clone)]
pub struct InfluxConfig {
    /// Hostname or address
    pub host: String,
    /// HTTP port
    pub port: u16,
    /// Username, empty disables authentication
    pub username: String,
    /// Password
    pub password: String,
    /// Connect over HTTPS
    pub ssl: bool,
    /// Verify the server certificate when connecting over HTTPS
    pub verify_ssl: bool,
    /// Database to write points to
    pub database: String,
    /// Write request timeout
    pub timeout: Duration,
}

impl InfluxConfig {
    /// Plain HTTP connection without credentials
    #[must_use]
    pub fn new(host: &str, port: u16, database: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            username: String::new(),
            password: String::new(),
            ssl: false,
            verify_ssl: false,
            database: database.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for InfluxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("ssl", &self.ssl)
            .field("verify_ssl", &self.verify_ssl)
            .field("database", &self.database)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Complete application configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// StatusCake API
    pub statuscake: StatusCakeConfig,
    /// InfluxDB sink
    pub influx: InfluxConfig,
    /// Directory for the filesystem cache
    pub cache_dir: PathBuf,
    /// Directory for run lock files
    pub lock_dir: PathBuf,
}

impl Config {
    /// Load configuration from the process environment
    /// * `STATUSCAKE_URL` - defaults to `https://app.statuscake.com/API/`
    /// * `STATUSCAKE_API`, `STATUSCAKE_USERNAME` - required credentials
    /// * `STATUSCAKE_TIMEOUT` - request timeout in seconds, defaults to 30
    /// * `INFLUXDB_HOST`, `INFLUXDB_PORT` - defaults to `127.0.0.1:8086`
    /// * `INFLUXDB_USERNAME`, `INFLUXDB_PASSWORD` - optional credentials
    /// * `INFLUXDB_SSL`, `INFLUXDB_VERIFY_SSL` - TLS flags, default off
    /// * `INFLUXDB_DB` - required database name
    /// * `CACHE_DIR`, `LOCK_DIR` - default to directories under the system temp dir
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration using an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let timeout = env
            .parse::<u64>("STATUSCAKE_TIMEOUT")?
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs);

        let statuscake = StatusCakeConfig {
            base_url: base_url_with_slash(
                &env.optional("STATUSCAKE_URL")
                    .unwrap_or_else(|| DEFAULT_STATUSCAKE_URL.to_string()),
            )?,
            api_key: env.required("STATUSCAKE_API")?,
            username: env.required("STATUSCAKE_USERNAME")?,
            timeout,
        };

        let influx = InfluxConfig {
            host: env
                .optional("INFLUXDB_HOST")
                .unwrap_or_else(|| DEFAULT_INFLUXDB_HOST.to_string()),
            port: env.parse("INFLUXDB_PORT")?.unwrap_or(DEFAULT_INFLUXDB_PORT),
            username: env.optional("INFLUXDB_USERNAME").unwrap_or_default(),
            password: env.optional("INFLUXDB_PASSWORD").unwrap_or_default(),
            ssl: env.flag("INFLUXDB_SSL")?,
            verify_ssl: env.flag("INFLUXDB_VERIFY_SSL")?,
            database: env.required("INFLUXDB_DB")?,
            timeout,
        };

        let work_dir = std::env::temp_dir().join("influx-statuscake");

        Ok(Self {
            statuscake,
            influx,
            cache_dir: env
                .optional("CACHE_DIR")
                .map_or_else(|| work_dir.join("cache"), PathBuf::from),
            lock_dir: env
                .optional("LOCK_DIR")
                .map_or_else(|| work_dir.join("lock"), PathBuf::from),
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    // Empty values count as unset, a blank line in a .env file shouldn't override defaults.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key)
            .ok_or_else(|| Error::MissingEnv(key.to_string()))
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key)
            .map(|v| {
                v.parse()
                    .map_err(|e: T::Err| Error::InvalidEnv(key.to_string(), e.to_string()))
            })
            .transpose()
    }

    fn flag(&self, key: &str) -> Result<bool> {
        match self.optional(key).map(|v| v.to_ascii_lowercase()).as_deref() {
            None | Some("0" | "false" | "no" | "off") => Ok(false),
            Some("1" | "true" | "yes" | "on") => Ok(true),
            Some(other) => Err(Error::InvalidEnv(
                key.to_string(),
                format!("'{other}' is not a boolean"),
            )),
        }
    }
}

fn base_url_with_slash(url: &str) -> Result<url::Url> {
    // Url::join drops the last path segment unless the base ends with a slash
    if url.ends_with('/') {
        Ok(url::Url::parse(url)?)
    } else {
        Ok(url::Url::parse(&format!("{url}/"))?)
    }
}
