mod cli;
mod converter;
mod epub;
mod epub_reader;
mod error;
mod format;
mod html;
mod image;
mod manifest;
mod markdown;
mod pdf;
mod pdf_reader;
mod reader;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "convert=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    converter::convert(&cli)
}
