use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "TOWER_LOG";

/// Installs the process-wide fmt subscriber.
///
/// `TOWER_LOG` wins over `fallback`; an invalid directive falls back to `warn`.
/// Calling this more than once is harmless, later calls keep the first subscriber.
pub fn init(fallback: Option<&str>) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(fallback.unwrap_or("warn")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
