//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
///
/// Subsequent calls are no-ops.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gymkeep_api=info,gymkeep_shared=info,tower_http=info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let _ = match format {
        LogFormat::Json => builder.json().with_target(false).try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
}
