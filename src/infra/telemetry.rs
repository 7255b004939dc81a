//! Process-wide tracing subscriber and metric descriptions.

use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing::level_filters::LevelFilter;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cache::{METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_CACHE_PURGE, METRIC_DEDUP_HIT};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

/// Applied only when `RUST_LOG` is unset.
const DEPENDENCY_DIRECTIVES: &[&str] = &["sqlx::query=warn", "hyper=info", "tower_http=info"];

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global subscriber. Fails if one is already installed.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let registry = tracing_subscriber::registry()
        .with(env_filter(logging.level))
        .with(ErrorLayer::default());

    let installed = match logging.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(true))
            .try_init(),
    };

    installed.map_err(|err| InfraError::telemetry(err.to_string()))
}

fn env_filter(level: LevelFilter) -> EnvFilter {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return filter;
    }
    DEPENDENCY_DIRECTIVES
        .iter()
        .filter_map(|directive| directive.parse().ok())
        .fold(filter, EnvFilter::add_directive)
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT,
            Unit::Count,
            "Total number of result cache hits, labelled by projection."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Total number of result cache misses, lapsed entries included."
        );
        describe_counter!(
            METRIC_CACHE_PURGE,
            Unit::Count,
            "Total number of identities purged after committed mutations."
        );
        describe_counter!(
            METRIC_DEDUP_HIT,
            Unit::Count,
            "Total number of creates answered from the dedup window."
        );
    });
}
