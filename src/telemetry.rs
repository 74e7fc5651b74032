//! Telemetry bootstrap.
//!
//! Hosts that do not already run their own subscriber can install one here;
//! metric descriptions are registered either way so any recorder the host
//! mounts picks up units and help texts.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use serde::Deserialize;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::error::CacheError;

static METRIC_DESCRIPTIONS: Once = Once::new();

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    #[default]
    Compact,
}

/// Install a global tracing subscriber. `RUST_LOG` overrides the default
/// `info` directive.
pub fn init(format: LogFormat) -> Result<(), CacheError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .from_env_lossy();

    let fmt_layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
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
            CacheError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_histogram!(
            "frammento_index_rebuild_ms",
            Unit::Milliseconds,
            "Duration of full dependency index rebuilds."
        );
        describe_counter!(
            "frammento_index_update_total",
            Unit::Count,
            "Event-driven dependency index updates, labeled by kind."
        );
        describe_counter!(
            "frammento_guard_hit_total",
            Unit::Count,
            "Guard reads served from the artifact store."
        );
        describe_counter!(
            "frammento_guard_stale_total",
            Unit::Count,
            "Guard reads that recomputed and stored a fresh artifact."
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_metrics_is_idempotent() {
        describe_metrics();
        describe_metrics();
    }

    #[test]
    fn log_format_parses_from_config() {
        #[derive(Deserialize)]
        struct Wrapper {
            format: LogFormat,
        }
        let wrapper: Wrapper = toml::from_str(r#"format = "json""#).expect("parse");
        assert!(matches!(wrapper.format, LogFormat::Json));
    }
}
