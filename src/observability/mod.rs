pub mod metrics;

use lazy_static::lazy_static;
use metrics::Metrics;
use tracing_subscriber::EnvFilter;

lazy_static! {
    pub static ref METRICS: Metrics = Metrics::new();
}

/// Installs the global `tracing` subscriber. `RUST_LOG` controls the filter
/// (default `info`); `LOG_FORMAT=json` switches the output to one JSON
/// object per line.
pub fn init_tracing() {
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {}", e);
    }
}

pub fn log_metrics_summary() {
    let snapshot = METRICS.snapshot();
    tracing::info!(
        "Uptime {}s: sent={} deleted={} notices={} suppressed={} cleaned={} welcomes={} \
         checks={} cache_hits={} config_changes={} platform_errors={}",
        snapshot.uptime_secs,
        snapshot.messages_sent,
        snapshot.messages_deleted,
        snapshot.notices_sent,
        snapshot.notices_suppressed,
        snapshot.notices_cleaned,
        snapshot.welcomes_sent,
        snapshot.membership_checks,
        snapshot.membership_cache_hits,
        snapshot.config_changes,
        snapshot.platform_errors,
    );
}
