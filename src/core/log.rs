use tracing_subscriber::{
    EnvFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

/// Console logging, off by default. `-v` turns on debug output for this
/// crate only; `RUST_LOG` overrides everything.
pub fn init_logging(verbose: bool) {
    let default_filter = if verbose { "foliotrack=debug" } else { "off" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time())
        .with(filter)
        .init();
}
