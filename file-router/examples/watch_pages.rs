//! Watch a pages directory and keep a manifest file up to date.
//!
//! Usage: cargo run -p file-router --example watch_pages -- <pages-dir> [manifest.json]

use std::path::PathBuf;

use anyhow::Context;
use file_router::{ManifestFile, PageRegistry, RouterConfig, RunningRegistry};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("file_router=debug")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let root_dir = args
        .next()
        .map(PathBuf::from)
        .context("missing <pages-dir> argument")?;
    let root_dir = std::path::absolute(&root_dir)
        .with_context(|| format!("cannot resolve {}", root_dir.display()))?;
    let manifest = args
        .next()
        .map_or_else(|| root_dir.join("manifest.json"), PathBuf::from);

    let config = RouterConfig::new(&root_dir).exclude("^_");
    let registry = PageRegistry::new(config, ManifestFile::new(&manifest))?;
    let running = RunningRegistry::spawn(registry)?;

    println!("Watching {} -> {}", root_dir.display(), manifest.display());
    println!("Press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;

    let registry = running.stop().await?;
    println!("\nFinal routes:");
    for page in registry.snapshot() {
        println!("  {:<24} {}", page.url, page.path);
    }

    Ok(())
}
