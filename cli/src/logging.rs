//! Tracing initialisation.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output settings taken from the command line.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default level or filter directives, e.g. `"info"` or
    /// `"info,progindex_evm=debug"`. `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Emit JSON structured logs (true) or human-readable text (false)
    pub json: bool,
}

/// Initialise tracing. Call once at startup.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr so `export` can write TSV to stdout.
    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
