//! komiksync binary entry point.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing(komiksync::cli::is_verbose());
    komiksync::cli::run().await
}

/// `RUST_LOG` wins over the `-v` default.
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

fn default_directive(verbose: bool) -> String {
    let level = if verbose { "info" } else { "warn" };
    format!("komiksync={}", level)
}
