//! Tracing subscriber setup for the `research-chat` binary.
//!
//! Logs go to stderr so they never interleave with transcript output on
//! stdout. `RUST_LOG` overrides [`DEFAULT_FILTER`].

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_FILTER: &str = "research_chat=info,research_api=warn";

pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()
    };

    if let Err(error) = result {
        eprintln!("failed to initialize logging: {error}");
    }
}
