//! PDF Table Extractor - Entry point
//!
//! Serves the extraction tools over MCP on stdio. Any arguments are taken as
//! resource directories that sandbox file access.

use pdf_table_extractor::{run_server, run_server_with_dirs};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the MCP transport, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_table_extractor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let resource_dirs: Vec<String> = std::env::args().skip(1).collect();
    tracing::info!(?resource_dirs, "Starting PDF table extractor");

    if resource_dirs.is_empty() {
        run_server().await
    } else {
        run_server_with_dirs(resource_dirs).await
    }
}
