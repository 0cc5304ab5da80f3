//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

pub use cli::{
    BanArgs, CliArgs, Command, DaemonArgs, GlobalOverrides, InvalidateArgs, PurgeArgs,
    PurgeTarget,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "folio";
const ENV_PREFIX: &str = "FOLIO";

const DEFAULT_KV_HOST: &str = "127.0.0.1";
const DEFAULT_KV_PORT: u16 = 6379;
const DEFAULT_KV_PROBE_TIMEOUT_MS: u64 = 250;
const DEFAULT_KV_COMMAND_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_KV_RETRY_ATTEMPTS: u64 = 3;
const DEFAULT_KV_RETRY_BACKOFF_MS: u64 = 100;

const DEFAULT_CACHE_TTL_SECS: u64 = 3_600;
const DEFAULT_CACHE_COMPRESSION_THRESHOLD: u64 = 10 * 1024;
const DEFAULT_CACHE_KEY_PREFIX: &str = "folio:";
const DEFAULT_CACHE_STATS_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_CACHE_MAX_BODY_BYTES: u64 = 5 * 1024 * 1024;

const DEFAULT_EDGE_HOST: &str = "127.0.0.1";
const DEFAULT_EDGE_PORT: u16 = 80;
const DEFAULT_EDGE_PUBLIC_HOST: &str = "localhost";
const DEFAULT_EDGE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_EDGE_ALLOWED_IPS: &[&str] = &["127.0.0.1", "::1"];

const DEFAULT_WARMUP_BASE_URL: &str = "http://127.0.0.1:3000/";
const DEFAULT_WARMUP_SITEMAP_PATH: &str = "/sitemap.xml";
const DEFAULT_WARMUP_FEED_PATH: &str = "/feed";
const DEFAULT_WARMUP_BATCH_SIZE: u64 = 50;
const DEFAULT_WARMUP_BATCH_DELAY_MS: u64 = 500;
const DEFAULT_WARMUP_PAGE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_WARMUP_SITEMAP_TIMEOUT_SECS: u64 = 60;
const DEFAULT_WARMUP_POPULAR_LIMIT: u64 = 20;
const DEFAULT_WARMUP_POPULAR_WINDOW_DAYS: u64 = 30;
const DEFAULT_WARMUP_RECENT_WINDOW_HOURS: u64 = 24;
const DEFAULT_WARMUP_SCHEDULE_SECS: u64 = 900;
const DEFAULT_WARMUP_API_ENDPOINTS: &[&str] = &[
    "/api/v1/posts",
    "/api/v1/categories",
    "/api/v1/tags",
    "/api/v1/pages",
];

const DEFAULT_CONTENT_API_BASE_URL: &str = "http://127.0.0.1:3000/api/v1/";
const DEFAULT_CONTENT_TIMEOUT_SECS: u64 = 10;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub kv: KvSettings,
    pub cache: CacheSettings,
    pub edge: EdgeSettings,
    pub warmup: WarmupSettings,
    pub content: ContentSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct KvSettings {
    pub replication_enabled: bool,
    pub master: NodeSettings,
    pub replica: Option<NodeSettings>,
    pub probe_timeout: Duration,
    pub command_timeout: Duration,
    pub retry_attempts: NonZeroU32,
    pub retry_backoff: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub default_ttl: Duration,
    pub compression_enabled: bool,
    pub compression_threshold: usize,
    pub key_prefix: String,
    pub stats_ttl: Duration,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct EdgeSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub admin_port: Option<u16>,
    /// Virtual host the accelerator serves publicly; sent as `Host`.
    pub public_host: String,
    pub timeout: Duration,
    pub allowed_ips: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct WarmupSettings {
    pub base_url: Url,
    pub sitemap_url: Url,
    pub feed_path: String,
    pub batch_size: NonZeroUsize,
    pub batch_delay: Duration,
    pub page_timeout: Duration,
    pub sitemap_timeout: Duration,
    pub popular_limit: usize,
    pub popular_window_days: u32,
    pub recent_window: Duration,
    pub schedule_interval: Duration,
    pub api_endpoints: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub api_base_url: Url,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("edge.allowed_ips")
            .with_list_parse_key("warmup.api_endpoints")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);
    if let Command::Daemon(args) = &cli.command
        && let Some(seconds) = args.interval_seconds
    {
        raw.warmup.schedule_seconds = Some(seconds);
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    kv: RawKvSettings,
    cache: RawCacheSettings,
    edge: RawEdgeSettings,
    warmup: RawWarmupSettings,
    content: RawContentSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(host) = overrides.kv_master_host.as_ref() {
            self.kv.master.host = Some(host.clone());
        }
        if let Some(port) = overrides.kv_master_port {
            self.kv.master.port = Some(port);
        }
        if let Some(host) = overrides.kv_replica_host.as_ref() {
            self.kv.replica.host = Some(host.clone());
        }
        if let Some(port) = overrides.kv_replica_port {
            self.kv.replica.port = Some(port);
        }
        if let Some(enabled) = overrides.kv_replication_enabled {
            self.kv.replication_enabled = Some(enabled);
        }
        if let Some(enabled) = overrides.edge_enabled {
            self.edge.enabled = Some(enabled);
        }
        if let Some(host) = overrides.edge_host.as_ref() {
            self.edge.host = Some(host.clone());
        }
        if let Some(url) = overrides.warmup_base_url.as_ref() {
            self.warmup.base_url = Some(url.clone());
        }
        if let Some(size) = overrides.warmup_batch_size {
            self.warmup.batch_size = Some(size);
        }
        if let Some(delay) = overrides.warmup_batch_delay_ms {
            self.warmup.batch_delay_ms = Some(delay);
        }
        if let Some(url) = overrides.content_api_base_url.as_ref() {
            self.content.api_base_url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            kv,
            cache,
            edge,
            warmup,
            content,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let kv = build_kv_settings(kv)?;
        let cache = build_cache_settings(cache)?;
        let edge = build_edge_settings(edge)?;
        let warmup = build_warmup_settings(warmup)?;
        let content = build_content_settings(content)?;

        Ok(Self {
            logging,
            kv,
            cache,
            edge,
            warmup,
            content,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_kv_settings(kv: RawKvSettings) -> Result<KvSettings, LoadError> {
    let master = build_node_settings(kv.master, "kv.master.host", "kv.master.port")?
        .unwrap_or_else(|| NodeSettings {
            host: DEFAULT_KV_HOST.to_string(),
            port: DEFAULT_KV_PORT,
            password: None,
            db: 0,
        });
    let replica = build_node_settings(kv.replica, "kv.replica.host", "kv.replica.port")?;

    let replication_enabled = kv.replication_enabled.unwrap_or(false);
    if replication_enabled && replica.is_none() {
        return Err(LoadError::invalid(
            "kv.replication_enabled",
            "replication requires `kv.replica.host`",
        ));
    }

    let probe_timeout = positive_millis(
        kv.probe_timeout_ms.unwrap_or(DEFAULT_KV_PROBE_TIMEOUT_MS),
        "kv.probe_timeout_ms",
    )?;
    let command_timeout = positive_millis(
        kv.command_timeout_ms.unwrap_or(DEFAULT_KV_COMMAND_TIMEOUT_MS),
        "kv.command_timeout_ms",
    )?;
    let retry_attempts = non_zero_u32(
        kv.retry_attempts.unwrap_or(DEFAULT_KV_RETRY_ATTEMPTS),
        "kv.retry_attempts",
    )?;
    let retry_backoff =
        Duration::from_millis(kv.retry_backoff_ms.unwrap_or(DEFAULT_KV_RETRY_BACKOFF_MS));

    Ok(KvSettings {
        replication_enabled,
        master,
        replica,
        probe_timeout,
        command_timeout,
        retry_attempts,
        retry_backoff,
    })
}

/// Returns `None` when no host was supplied for the node.
fn build_node_settings(
    node: RawNodeSettings,
    host_key: &'static str,
    port_key: &'static str,
) -> Result<Option<NodeSettings>, LoadError> {
    let Some(host) = node.host else {
        return Ok(None);
    };
    let host = host.trim().to_string();
    if host.is_empty() {
        return Err(LoadError::invalid(host_key, "host must not be empty"));
    }

    let port = node.port.unwrap_or(DEFAULT_KV_PORT);
    if port == 0 {
        return Err(LoadError::invalid(port_key, "port must be greater than zero"));
    }

    let password = node.password.filter(|value| !value.is_empty());

    Ok(Some(NodeSettings {
        host,
        port,
        password,
        db: node.db.unwrap_or(0),
    }))
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let ttl_secs = cache.default_ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS);
    if ttl_secs == 0 {
        return Err(LoadError::invalid(
            "cache.default_ttl_seconds",
            "must be greater than zero",
        ));
    }

    let threshold = to_usize(
        cache
            .compression_threshold_bytes
            .unwrap_or(DEFAULT_CACHE_COMPRESSION_THRESHOLD),
        "cache.compression_threshold_bytes",
    )?;

    let key_prefix = cache
        .key_prefix
        .unwrap_or_else(|| DEFAULT_CACHE_KEY_PREFIX.to_string());
    if key_prefix.trim().is_empty() {
        return Err(LoadError::invalid(
            "cache.key_prefix",
            "prefix must not be empty",
        ));
    }

    let stats_secs = cache
        .stats_ttl_seconds
        .unwrap_or(DEFAULT_CACHE_STATS_TTL_SECS);
    if stats_secs == 0 {
        return Err(LoadError::invalid(
            "cache.stats_ttl_seconds",
            "must be greater than zero",
        ));
    }

    let max_body_value = cache.max_body_bytes.unwrap_or(DEFAULT_CACHE_MAX_BODY_BYTES);
    if max_body_value == 0 {
        return Err(LoadError::invalid(
            "cache.max_body_bytes",
            "must be greater than zero",
        ));
    }
    let max_body_bytes = to_usize(max_body_value, "cache.max_body_bytes")?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        default_ttl: Duration::from_secs(ttl_secs),
        compression_enabled: cache.compression_enabled.unwrap_or(true),
        compression_threshold: threshold,
        key_prefix,
        stats_ttl: Duration::from_secs(stats_secs),
        max_body_bytes,
    })
}

fn build_edge_settings(edge: RawEdgeSettings) -> Result<EdgeSettings, LoadError> {
    let host = edge
        .host
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_EDGE_HOST.to_string());
    if host.is_empty() {
        return Err(LoadError::invalid("edge.host", "host must not be empty"));
    }

    let port = edge.port.unwrap_or(DEFAULT_EDGE_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "edge.port",
            "port must be greater than zero",
        ));
    }
    if edge.admin_port == Some(0) {
        return Err(LoadError::invalid(
            "edge.admin_port",
            "port must be greater than zero",
        ));
    }

    let public_host = edge
        .public_host
        .unwrap_or_else(|| DEFAULT_EDGE_PUBLIC_HOST.to_string());
    if public_host.trim().is_empty() {
        return Err(LoadError::invalid(
            "edge.public_host",
            "host must not be empty",
        ));
    }

    let timeout = positive_millis(
        edge.timeout_ms.unwrap_or(DEFAULT_EDGE_TIMEOUT_MS),
        "edge.timeout_ms",
    )?;

    let allowed_ips = edge
        .allowed_ips
        .unwrap_or_else(|| DEFAULT_EDGE_ALLOWED_IPS.iter().map(|ip| ip.to_string()).collect());
    for entry in &allowed_ips {
        crate::edge::parse_acl_entry(entry)
            .map_err(|reason| LoadError::invalid("edge.allowed_ips", reason))?;
    }

    Ok(EdgeSettings {
        enabled: edge.enabled.unwrap_or(false),
        host,
        port,
        admin_port: edge.admin_port,
        public_host: public_host.trim().to_string(),
        timeout,
        allowed_ips,
    })
}

fn build_warmup_settings(warmup: RawWarmupSettings) -> Result<WarmupSettings, LoadError> {
    let base_url = parse_base_url(
        warmup.base_url.as_deref().unwrap_or(DEFAULT_WARMUP_BASE_URL),
        "warmup.base_url",
    )?;

    let sitemap_raw = warmup
        .sitemap_url
        .unwrap_or_else(|| DEFAULT_WARMUP_SITEMAP_PATH.to_string());
    let sitemap_url = base_url
        .join(sitemap_raw.trim())
        .map_err(|err| LoadError::invalid("warmup.sitemap_url", format!("{err}")))?;

    let batch_size = warmup.batch_size.unwrap_or(DEFAULT_WARMUP_BATCH_SIZE);
    let batch_size = NonZeroUsize::new(to_usize(batch_size, "warmup.batch_size")?)
        .ok_or_else(|| LoadError::invalid("warmup.batch_size", "must be greater than zero"))?;

    let page_timeout_secs = warmup
        .page_timeout_seconds
        .unwrap_or(DEFAULT_WARMUP_PAGE_TIMEOUT_SECS);
    let sitemap_timeout_secs = warmup
        .sitemap_timeout_seconds
        .unwrap_or(DEFAULT_WARMUP_SITEMAP_TIMEOUT_SECS);
    if page_timeout_secs == 0 {
        return Err(LoadError::invalid(
            "warmup.page_timeout_seconds",
            "must be greater than zero",
        ));
    }
    if sitemap_timeout_secs == 0 {
        return Err(LoadError::invalid(
            "warmup.sitemap_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let popular_window_days = u32::try_from(
        warmup
            .popular_window_days
            .unwrap_or(DEFAULT_WARMUP_POPULAR_WINDOW_DAYS),
    )
    .map_err(|_| {
        LoadError::invalid(
            "warmup.popular_window_days",
            "value exceeds supported range for u32",
        )
    })?;

    let recent_hours = warmup
        .recent_window_hours
        .unwrap_or(DEFAULT_WARMUP_RECENT_WINDOW_HOURS);
    if recent_hours == 0 {
        return Err(LoadError::invalid(
            "warmup.recent_window_hours",
            "must be greater than zero",
        ));
    }

    let schedule_seconds = warmup
        .schedule_seconds
        .unwrap_or(DEFAULT_WARMUP_SCHEDULE_SECS);
    if schedule_seconds == 0 {
        return Err(LoadError::invalid(
            "warmup.schedule_seconds",
            "must be greater than zero",
        ));
    }

    let feed_path = warmup
        .feed_path
        .unwrap_or_else(|| DEFAULT_WARMUP_FEED_PATH.to_string());
    if !feed_path.starts_with('/') {
        return Err(LoadError::invalid(
            "warmup.feed_path",
            "path must start with `/`",
        ));
    }

    let api_endpoints = warmup.api_endpoints.unwrap_or_else(|| {
        DEFAULT_WARMUP_API_ENDPOINTS
            .iter()
            .map(|path| path.to_string())
            .collect()
    });

    Ok(WarmupSettings {
        base_url,
        sitemap_url,
        feed_path,
        batch_size,
        batch_delay: Duration::from_millis(
            warmup
                .batch_delay_ms
                .unwrap_or(DEFAULT_WARMUP_BATCH_DELAY_MS),
        ),
        page_timeout: Duration::from_secs(page_timeout_secs),
        sitemap_timeout: Duration::from_secs(sitemap_timeout_secs),
        popular_limit: to_usize(
            warmup.popular_limit.unwrap_or(DEFAULT_WARMUP_POPULAR_LIMIT),
            "warmup.popular_limit",
        )?,
        popular_window_days,
        recent_window: Duration::from_secs(recent_hours * 60 * 60),
        schedule_interval: Duration::from_secs(schedule_seconds),
        api_endpoints,
    })
}

fn build_content_settings(content: RawContentSettings) -> Result<ContentSettings, LoadError> {
    let api_base_url = parse_base_url(
        content
            .api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_CONTENT_API_BASE_URL),
        "content.api_base_url",
    )?;

    let timeout_secs = content
        .timeout_seconds
        .unwrap_or(DEFAULT_CONTENT_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "content.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ContentSettings {
        api_base_url,
        timeout: Duration::from_secs(timeout_secs),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawKvSettings {
    replication_enabled: Option<bool>,
    master: RawNodeSettings,
    replica: RawNodeSettings,
    probe_timeout_ms: Option<u64>,
    command_timeout_ms: Option<u64>,
    retry_attempts: Option<u64>,
    retry_backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawNodeSettings {
    host: Option<String>,
    port: Option<u16>,
    password: Option<String>,
    db: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    default_ttl_seconds: Option<u64>,
    compression_enabled: Option<bool>,
    compression_threshold_bytes: Option<u64>,
    key_prefix: Option<String>,
    stats_ttl_seconds: Option<u64>,
    max_body_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEdgeSettings {
    enabled: Option<bool>,
    host: Option<String>,
    port: Option<u16>,
    admin_port: Option<u16>,
    public_host: Option<String>,
    timeout_ms: Option<u64>,
    allowed_ips: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawWarmupSettings {
    base_url: Option<String>,
    sitemap_url: Option<String>,
    feed_path: Option<String>,
    batch_size: Option<u64>,
    batch_delay_ms: Option<u64>,
    page_timeout_seconds: Option<u64>,
    sitemap_timeout_seconds: Option<u64>,
    popular_limit: Option<u64>,
    popular_window_days: Option<u64>,
    recent_window_hours: Option<u64>,
    schedule_seconds: Option<u64>,
    api_endpoints: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    api_base_url: Option<String>,
    timeout_seconds: Option<u64>,
}

/// Parse an absolute http(s) URL and make sure relative joins land below it.
fn parse_base_url(raw: &str, key: &'static str) -> Result<Url, LoadError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|err| LoadError::invalid(key, format!("invalid url `{raw}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(key, "scheme must be http or https"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn positive_millis(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_millis(value))
}

fn to_usize(value: u64, key: &'static str) -> Result<usize, LoadError> {
    usize::try_from(value)
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

#[cfg(test)]
mod tests;
