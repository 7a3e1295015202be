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
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "veglia_page_micro_hit_total",
            Unit::Count,
            "Total number of page reads served from the process-local micro cache."
        );
        describe_counter!(
            "veglia_page_kv_hit_total",
            Unit::Count,
            "Total number of page reads served fresh from the shared KV store."
        );
        describe_counter!(
            "veglia_page_stale_serve_total",
            Unit::Count,
            "Total number of page reads served stale while a refresh ran in the background."
        );
        describe_counter!(
            "veglia_page_miss_total",
            Unit::Count,
            "Total number of page reads that found no cached value."
        );
        describe_counter!(
            "veglia_page_refresh_total",
            Unit::Count,
            "Total number of background page refreshes that completed."
        );
        describe_counter!(
            "veglia_page_lock_contended_total",
            Unit::Count,
            "Total number of cold reads that lost the fetch lock and fell back to polling."
        );
        describe_counter!(
            "veglia_kv_soft_fail_total",
            Unit::Count,
            "Total number of KV backend failures treated as cache misses."
        );
        describe_counter!(
            "veglia_profile_retry_total",
            Unit::Count,
            "Total number of profile fetch attempts that were retried."
        );
        describe_counter!(
            "veglia_profile_degraded_total",
            Unit::Count,
            "Total number of profile lookups degraded to placeholders after exhausting retries."
        );
        describe_counter!(
            "veglia_profile_memo_hit_total",
            Unit::Count,
            "Total number of profile lookups served from the short-TTL memo cache."
        );
        describe_histogram!(
            "veglia_aggregate_build_ms",
            Unit::Milliseconds,
            "Latency of building one following-status page from the collaborators."
        );
        describe_histogram!(
            "veglia_hot_sync_ms",
            Unit::Milliseconds,
            "Latency of reconciling hot-cache keys after a page-0 build."
        );
    });
}
