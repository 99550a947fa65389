//! Configuration loading and types for the discovery service.
//!
//! Configuration is layered: built-in defaults, then an optional YAML
//! file, then environment variables and command-line flags (both parsed
//! by clap into [`Overrides`]). The result is an immutable [`Config`]
//! that is validated once at startup and shared by reference afterwards.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use garde::Validate;
use serde::Deserialize;
use tracing::info;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct Config {
    /// HTTP listener settings.
    #[serde(default)]
    #[garde(dive)]
    pub server: ServerConfig,

    /// Connection to the MinIO (S3-compatible) cluster.
    #[serde(default)]
    #[garde(dive)]
    pub minio: MinioConfig,

    /// Target synthesis settings.
    #[serde(default)]
    #[garde(dive)]
    pub discovery: DiscoveryConfig,

    /// Logging settings.
    #[serde(default)]
    #[garde(dive)]
    pub logging: LoggingConfig,

    /// Observability settings.
    #[serde(default)]
    #[garde(skip)]
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    #[garde(length(min = 1))]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    #[garde(range(min = 1))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// MinIO connection settings.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MinioConfig {
    /// Cluster endpoint as `host:port`, without a URL scheme.
    #[serde(default = "default_endpoint")]
    #[garde(length(min = 1), custom(bare_endpoint))]
    pub endpoint: String,

    /// Access key.
    #[serde(alias = "access_key_id", default = "default_access_key")]
    #[garde(skip)]
    pub access_key: String,

    /// Secret key.
    #[serde(alias = "secret_access_key", default = "default_secret_key")]
    #[garde(skip)]
    pub secret_key: String,

    /// Talk to the cluster over TLS. Also selects the scrape scheme.
    #[serde(default)]
    #[garde(skip)]
    pub use_ssl: bool,

    /// Region presented when signing requests.
    #[serde(default = "default_region")]
    #[garde(length(min = 1))]
    pub region: String,
}

impl MinioConfig {
    /// `https` when TLS is enabled, otherwise `http`.
    pub fn scheme(&self) -> &'static str {
        if self.use_ssl {
            "https"
        } else {
            "http"
        }
    }

    /// Full URL of the cluster's S3 API.
    pub fn endpoint_url(&self) -> String {
        format!("{}://{}", self.scheme(), self.endpoint)
    }
}

impl Default for MinioConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            access_key: default_access_key(),
            secret_key: default_secret_key(),
            use_ssl: false,
            region: default_region(),
        }
    }
}

/// Target synthesis configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DiscoveryConfig {
    /// Base path of the cluster's v3 metrics API.
    #[serde(default = "default_metrics_path")]
    #[garde(pattern(r"^/"))]
    pub metrics_path: String,

    /// Scrape interval advertised in scrape configs (Prometheus duration).
    #[serde(default = "default_scrape_interval")]
    #[garde(custom(prometheus_duration))]
    pub scrape_interval: String,

    /// Scrape timeout advertised in scrape configs (Prometheus duration).
    #[serde(default = "default_scrape_timeout")]
    #[garde(custom(prometheus_duration))]
    pub scrape_timeout: String,

    /// Wildcard pattern a bucket must match to be discovered.
    #[serde(default = "default_bucket_pattern")]
    #[garde(skip)]
    pub bucket_pattern: String,

    /// Wildcard pattern that removes matching buckets. Empty disables it.
    #[serde(default)]
    #[garde(skip)]
    pub bucket_exclude_pattern: String,

    /// Job name of the cluster-level target.
    #[serde(default = "default_server_job")]
    #[garde(length(min = 1))]
    pub server_job: String,

    /// Job name of the per-bucket targets.
    #[serde(default = "default_bucket_job")]
    #[garde(length(min = 1))]
    pub bucket_job: String,
}

impl DiscoveryConfig {
    /// Metrics path prefix for per-bucket targets.
    pub fn bucket_metrics_path(&self) -> String {
        format!("{}/bucket/api", self.metrics_path.trim_end_matches('/'))
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            metrics_path: default_metrics_path(),
            scrape_interval: default_scrape_interval(),
            scrape_timeout: default_scrape_timeout(),
            bucket_pattern: default_bucket_pattern(),
            bucket_exclude_pattern: String::new(),
            server_job: default_server_job(),
            bucket_job: default_bucket_job(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error. `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    #[garde(length(min = 1))]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    #[garde(pattern(r"^(text|json)$"))]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Expose the service's own Prometheus metrics on `/metrics`.
    #[serde(default = "default_true")]
    pub metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { metrics: true }
    }
}

// -- Overrides ---------------------------------------------------------------

/// Settings taken from the command line or the environment.
///
/// A flag wins over its environment variable; both win over the YAML file.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct Overrides {
    /// MinIO server endpoint (e.g. localhost:9000).
    #[arg(long, env = "MINIO_ENDPOINT")]
    pub minio_endpoint: Option<String>,

    /// MinIO access key.
    #[arg(long, env = "MINIO_ACCESS_KEY", hide_env_values = true)]
    pub minio_access_key: Option<String>,

    /// MinIO secret key.
    #[arg(long, env = "MINIO_SECRET_KEY", hide_env_values = true)]
    pub minio_secret_key: Option<String>,

    /// Use TLS for the MinIO connection.
    #[arg(
        long,
        env = "MINIO_USE_SSL",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub minio_use_ssl: Option<bool>,

    /// Region used when signing MinIO requests.
    #[arg(long, env = "MINIO_REGION")]
    pub minio_region: Option<String>,

    /// Address to listen on (e.g. :8080 or 127.0.0.1:8080).
    #[arg(long, env = "LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    /// Scrape interval advertised to Prometheus (e.g. 15s).
    #[arg(long, env = "SCRAPE_INTERVAL")]
    pub scrape_interval: Option<String>,

    /// Scrape timeout advertised to Prometheus (e.g. 10s).
    #[arg(long, env = "SCRAPE_TIMEOUT")]
    pub scrape_timeout: Option<String>,

    /// Base path of the MinIO metrics API (e.g. /minio/metrics/v3).
    #[arg(long, env = "METRICS_PATH")]
    pub metrics_path: Option<String>,

    /// Wildcard pattern for bucket inclusion.
    #[arg(long, env = "BUCKET_PATTERN")]
    pub bucket_pattern: Option<String>,

    /// Wildcard pattern for bucket exclusion.
    #[arg(long, env = "BUCKET_EXCLUDE_PATTERN")]
    pub bucket_exclude_pattern: Option<String>,
}

impl Config {
    /// Build the effective configuration from an optional YAML file and the
    /// command-line/environment overrides, then validate it.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => load_config(path)?,
            None => Config::default(),
        };
        config.apply_overrides(overrides)?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Apply every override that is set.
    pub fn apply_overrides(&mut self, overrides: Overrides) -> anyhow::Result<()> {
        if let Some(v) = overrides.minio_endpoint {
            self.minio.endpoint = v;
        }
        if let Some(v) = overrides.minio_access_key {
            self.minio.access_key = v;
        }
        if let Some(v) = overrides.minio_secret_key {
            self.minio.secret_key = v;
        }
        if let Some(v) = overrides.minio_use_ssl {
            self.minio.use_ssl = v;
        }
        if let Some(v) = overrides.minio_region {
            self.minio.region = v;
        }
        if let Some(addr) = overrides.listen_addr {
            let (host, port) = split_listen_addr(&addr)?;
            self.server.host = host;
            self.server.port = port;
        }
        if let Some(v) = overrides.scrape_interval {
            self.discovery.scrape_interval = v;
        }
        if let Some(v) = overrides.scrape_timeout {
            self.discovery.scrape_timeout = v;
        }
        if let Some(v) = overrides.metrics_path {
            self.discovery.metrics_path = v;
        }
        if let Some(v) = overrides.bucket_pattern {
            self.discovery.bucket_pattern = v;
        }
        if let Some(v) = overrides.bucket_exclude_pattern {
            self.discovery.bucket_exclude_pattern = v;
        }
        Ok(())
    }

    /// Run field validation plus the checks that span several fields.
    pub fn ensure_valid(&self) -> anyhow::Result<()> {
        self.validate()
            .map_err(|report| anyhow::anyhow!("invalid configuration: {report}"))?;

        let d = &self.discovery;
        if d.server_job == d.bucket_job {
            anyhow::bail!(
                "invalid configuration: discovery.server_job and discovery.bucket_job are both '{}'",
                d.server_job
            );
        }

        // Both parse, field validation already ran.
        let interval = parse_duration(&d.scrape_interval).unwrap_or_default();
        let timeout = parse_duration(&d.scrape_timeout).unwrap_or_default();
        if timeout > interval {
            anyhow::bail!(
                "invalid configuration: scrape_timeout {} is greater than scrape_interval {}",
                d.scrape_timeout,
                d.scrape_interval
            );
        }
        Ok(())
    }

    /// `host:port` the HTTP server binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Log the effective configuration with credentials masked.
    pub fn log_summary(&self) {
        info!("Configuration loaded:");
        info!("  MinIO Endpoint: {}", self.minio.endpoint);
        info!("  MinIO Access Key: {}", mask_sensitive(&self.minio.access_key));
        info!("  MinIO Secret Key: {}", mask_sensitive(&self.minio.secret_key));
        info!("  MinIO Use SSL: {}", self.minio.use_ssl);
        info!("  MinIO Region: {}", self.minio.region);
        info!("  Listen Address: {}", self.listen_addr());
        info!("  Scrape Interval: {}", self.discovery.scrape_interval);
        info!("  Scrape Timeout: {}", self.discovery.scrape_timeout);
        info!("  Metrics Path: {}", self.discovery.metrics_path);
        info!("  Bucket Pattern: {}", self.discovery.bucket_pattern);
        info!(
            "  Bucket Exclude Pattern: {}",
            self.discovery.bucket_exclude_pattern
        );
        info!(
            "  Jobs: server='{}' buckets='{}'",
            self.discovery.server_job, self.discovery.bucket_job
        );
    }
}

/// Split `[host]:port` into its parts. An empty host binds all interfaces.
fn split_listen_addr(addr: &str) -> anyhow::Result<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .with_context(|| format!("listen address '{addr}' must be host:port or :port"))?;
    let port = port
        .parse::<u16>()
        .with_context(|| format!("listen address '{addr}' has an invalid port"))?;
    let host = if host.is_empty() {
        default_host()
    } else {
        host.trim_start_matches('[').trim_end_matches(']').to_string()
    };
    Ok((host, port))
}

// -- Validators --------------------------------------------------------------

fn bare_endpoint(value: &str, _ctx: &()) -> garde::Result {
    if value.contains("://") {
        return Err(garde::Error::new(
            "endpoint must be host:port without a URL scheme (use use_ssl for https)",
        ));
    }
    Ok(())
}

fn prometheus_duration(value: &str, _ctx: &()) -> garde::Result {
    match parse_duration(value) {
        Some(_) => Ok(()),
        None => Err(garde::Error::new(format!(
            "'{value}' is not a duration such as 15s, 1m30s or 500ms"
        ))),
    }
}

/// Parse a Prometheus duration: one or more `<integer><unit>` terms with
/// units `ms`, `s`, `m`, `h`, `d`, `w` or `y`, largest unit first.
pub fn parse_duration(s: &str) -> Option<Duration> {
    if s.is_empty() {
        return None;
    }

    let mut total_ms: u64 = 0;
    let mut last_rank = usize::MAX;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit())?;
        if digits == 0 {
            return None;
        }
        let value: u64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (rank, unit_ms) = match &rest[..unit_len] {
            "y" => (6, 365 * 24 * 3_600_000),
            "w" => (5, 7 * 24 * 3_600_000),
            "d" => (4, 24 * 3_600_000),
            "h" => (3, 3_600_000),
            "m" => (2, 60_000),
            "s" => (1, 1_000),
            "ms" => (0, 1),
            _ => return None,
        };
        if rank >= last_rank {
            return None;
        }
        last_rank = rank;
        total_ms = total_ms.checked_add(value.checked_mul(unit_ms)?)?;
        rest = &rest[unit_len..];
    }
    Some(Duration::from_millis(total_ms))
}

/// Mask a credential for logging, keeping at most two characters at each end.
pub fn mask_sensitive(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    match chars.len() {
        0 => "(empty)".to_string(),
        1..=4 => "***".to_string(),
        n => {
            let head: String = chars[..2].iter().collect();
            let tail: String = chars[n - 2..].iter().collect();
            format!("{head}***{tail}")
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_endpoint() -> String {
    "localhost:9000".to_string()
}

fn default_access_key() -> String {
    "minioadmin".to_string()
}

fn default_secret_key() -> String {
    "minioadmin".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_metrics_path() -> String {
    "/minio/metrics/v3".to_string()
}

fn default_scrape_interval() -> String {
    "15s".to_string()
}

fn default_scrape_timeout() -> String {
    "10s".to_string()
}

fn default_bucket_pattern() -> String {
    "*".to_string()
}

fn default_server_job() -> String {
    "minio-server".to_string()
}

fn default_bucket_job() -> String {
    "minio-buckets".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}
