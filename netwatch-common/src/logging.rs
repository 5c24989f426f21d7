use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber; `RUST_LOG` wins over `default_filter`
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    // a second init (tests, embedding) is not an error
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
