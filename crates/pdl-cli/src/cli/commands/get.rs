//! `pdl get <url>` – download one resource.

use anyhow::{Context, Result};
use clap::Args;
use pdl_core::config::PdlConfig;
use pdl_core::url_model;
use pdl_core::{ByteCounter, CancelToken, Downloader, FetchMode};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::progress;

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Direct HTTP/HTTPS URL to download.
    pub url: String,

    /// Output path (default: file name derived from the URL).
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Number of concurrent ranges (overrides config).
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: Option<u16>,

    /// Resume from parts staged by an interrupted run.
    #[arg(short, long)]
    pub resume: bool,

    /// Extra request header, e.g. -H 'Referer: https://example.com/'. Repeatable.
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    pub headers: Vec<String>,

    /// Give up (and cancel all ranges) after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Do not print progress.
    #[arg(short, long)]
    pub quiet: bool,
}

pub async fn run_get(cfg: &PdlConfig, args: GetArgs) -> Result<()> {
    let mut options = cfg.download_options();
    if let Some(n) = args.concurrency {
        options.concurrency = n as usize;
    }
    options.resume |= args.resume;
    options.headers = parse_headers(&args.headers)?;
    if let Some(secs) = args.timeout {
        options.job_timeout = Some(Duration::from_secs(secs));
    }

    let destination = args
        .output
        .unwrap_or_else(|| PathBuf::from(url_model::derive_filename(&args.url)));
    tracing::info!(url = %args.url, dest = %destination.display(), concurrency = options.concurrency, resume = options.resume, "starting download");

    let cancel = CancelToken::new();
    let downloader = Downloader::new(options).with_cancel_token(cancel.clone());
    let counter = Arc::new(ByteCounter::new());

    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\ninterrupted, stopping...");
                cancel.cancel();
            }
        })
    };
    let reporter = (!args.quiet).then(|| progress::spawn_reporter(Arc::clone(&counter)));

    let url = args.url.clone();
    let dest = destination.clone();
    let sink = Arc::clone(&counter);
    let result = tokio::task::spawn_blocking(move || downloader.download(&url, &dest, sink.as_ref()))
        .await
        .context("download task panicked")?;

    ctrl_c.abort();
    if let Some(handle) = reporter {
        handle.finish().await;
    }

    let report = result.with_context(|| format!("downloading {}", args.url))?;
    let how = match report.mode {
        FetchMode::Multi { parts } => format!("{} ranges", parts),
        FetchMode::Single => "single stream".to_string(),
    };
    println!(
        "saved {} ({} bytes, {})",
        destination.display(),
        report.bytes_written,
        how
    );
    if report.bytes_resumed > 0 {
        println!("  resumed {} bytes from staged parts", report.bytes_resumed);
    }
    Ok(())
}

/// Parse repeated `Name: value` header arguments.
pub(crate) fn parse_headers(raw: &[String]) -> Result<HashMap<String, String>> {
    let mut out = HashMap::new();
    for h in raw {
        let (name, value) = h
            .split_once(':')
            .with_context(|| format!("invalid header {:?}, expected 'Name: value'", h))?;
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("invalid header {:?}: empty name", h);
        }
        out.insert(name.to_string(), value.trim().to_string());
    }
    Ok(out)
}
