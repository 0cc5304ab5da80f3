use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
/// Logs go to stderr; stdout is reserved for command output.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(std::io::stderr)
            .compact()
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Registers metric descriptions with the installed recorder. Idempotent.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "folio_cache_hit_total",
            Unit::Count,
            "Total number of page-cache hits."
        );
        describe_counter!(
            "folio_cache_miss_total",
            Unit::Count,
            "Total number of page-cache misses, including undecodable entries."
        );
        describe_counter!(
            "folio_cache_store_total",
            Unit::Count,
            "Total number of responses written to the page cache."
        );
        describe_counter!(
            "folio_cache_invalidated_total",
            Unit::Count,
            "Total number of page-cache entries removed by invalidation."
        );
        describe_counter!(
            "folio_kv_retry_total",
            Unit::Count,
            "Total number of retried KV commands."
        );
        describe_counter!(
            "folio_edge_request_total",
            Unit::Count,
            "Total number of PURGE and BAN requests sent to the edge, by outcome."
        );
        describe_counter!(
            "folio_warm_url_total",
            Unit::Count,
            "Total number of warming requests, by outcome."
        );
        describe_histogram!(
            "folio_warm_pass_ms",
            Unit::Milliseconds,
            "Warm pass duration in milliseconds."
        );
    });
}
