use std::{io, sync::Once};

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
///
/// Events go to stderr so that rendered documents can be piped from stdout.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .with_writer(io::stderr)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(io::stderr)
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "texd_cache_hit_total",
            Unit::Count,
            "Total number of bounded cache hits."
        );
        describe_counter!(
            "texd_cache_miss_total",
            Unit::Count,
            "Total number of bounded cache misses."
        );
        describe_counter!(
            "texd_cache_evict_total",
            Unit::Count,
            "Total number of bounded cache evictions due to capacity."
        );
        describe_counter!(
            "texd_render_attempt_total",
            Unit::Count,
            "Total number of render requests sent, by outcome."
        );
        describe_counter!(
            "texd_reference_retry_total",
            Unit::Count,
            "Total number of renders retried after a reference miss."
        );
        describe_histogram!(
            "texd_request_duration_ms",
            Unit::Milliseconds,
            "Round-trip latency of texd requests in milliseconds."
        );
    });
}
