use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use static_http_server::{server, Config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cfg = Config::from_args().context("parse arguments")?;

    server::run(&cfg).await
}
