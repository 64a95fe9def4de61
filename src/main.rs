//! PDF Overlay Editor
//!
//! Command-line driver: upload PDFs, inspect extracted text and save
//! text edits through the document service.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdf_overlay_editor::backend::HttpBackend;
use pdf_overlay_editor::cli::{self, Cli};
use pdf_overlay_editor::Config;

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout carries command output
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "pdf_overlay_editor=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    if let Err(error) = run().await {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();
    tracing::debug!(api = %config.api.url, "Using document service");

    let backend = HttpBackend::new(&config.api.url, config.http_timeout())?;
    let mut stdout = std::io::stdout().lock();
    cli::run(cli, Arc::new(backend), &config, &mut stdout).await
}
