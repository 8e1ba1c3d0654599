use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use prismize::input::parse_input;
use prismize::{HostPage, PageDefaults};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let raw_input = args.next().unwrap_or_else(|| String::from("-"));
    let output = args.next().map(PathBuf::from);

    let subscriber_result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
    if subscriber_result.is_err() {
        // tracing was already initialised; continue silently
    }

    let input = parse_input(&raw_input).with_context(|| format!("invalid input {raw_input:?}"))?;
    let html = input
        .read()
        .with_context(|| format!("failed to read {raw_input}"))?;

    let defaults = PageDefaults::from_env().unwrap_or_else(|err| {
        warn!("Failed to load page defaults: {err}. Using none.");
        PageDefaults::empty()
    });

    let page = HostPage::parse(&html, Arc::new(defaults));
    let frames = page.prismize_all().context("failed to embed code blocks")?;
    info!(count = frames.len(), "embedded code frames");

    let rendered = page.to_html();
    match output {
        Some(path) => fs::write(&path, rendered)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => io::stdout()
            .write_all(rendered.as_bytes())
            .context("failed to write output")?,
    }
    Ok(())
}
