//! Download orchestrator.
//!
//! Probes the resource, then either splits it into ranges fetched by one
//! worker thread each and merges the parts, or falls back to a single
//! unranged GET when the server cannot serve ranges.

mod multi;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use crate::control::CancelToken;
use crate::error::{DownloadError, FetchError};
use crate::fetcher::{self, PartFetcher};
use crate::merge;
use crate::planner;
use crate::probe::{self, ResourceDescriptor};
use crate::progress::ProgressSink;
use crate::storage::PartStore;
use crate::transfer::{CurlOptions, Source};

/// Caller-supplied knobs for one download.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Number of ranges (and worker threads) for a split download.
    pub concurrency: usize,
    /// Reuse staged parts from an interrupted run.
    pub resume: bool,
    /// Extra request headers sent with the probe and every fetch.
    pub headers: HashMap<String, String>,
    pub curl: CurlOptions,
    /// Cancel all workers when the whole job takes longer than this.
    pub job_timeout: Option<Duration>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            resume: false,
            headers: HashMap::new(),
            curl: CurlOptions::default(),
            job_timeout: None,
        }
    }
}

/// Which path a finished download took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Split into `parts` ranges, fetched concurrently and merged.
    Multi { parts: usize },
    /// One unranged GET straight into the destination.
    Single,
}

/// Summary of a finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub mode: FetchMode,
    /// Final length of the destination.
    pub bytes_written: u64,
    /// Bytes received over the wire in this run.
    pub bytes_fetched: u64,
    /// Bytes reused from staged parts of an earlier run.
    pub bytes_resumed: u64,
}

/// Phases of one job, logged as the job moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Probing,
    MultiFetch,
    SingleFetch,
    Merging,
    Done,
    Failed,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobPhase::Probing => "probing",
            JobPhase::MultiFetch => "multi-fetch",
            JobPhase::SingleFetch => "single-fetch",
            JobPhase::Merging => "merging",
            JobPhase::Done => "done",
            JobPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Runs downloads with fixed options. Cancelling the token passed to
/// `with_cancel_token` stops any job currently running on this downloader.
#[derive(Debug, Clone, Default)]
pub struct Downloader {
    options: DownloadOptions,
    cancel: CancelToken,
}

impl Downloader {
    pub fn new(options: DownloadOptions) -> Self {
        Self {
            options,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Download `url` to `destination`, reporting byte deltas to `sink`.
    pub fn download(
        &self,
        url: &str,
        destination: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadReport, DownloadError> {
        let job_cancel = self.cancel.child();
        let timed_out = AtomicBool::new(false);
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let result = std::thread::scope(|s| {
            if let Some(limit) = self.options.job_timeout {
                let cancel = job_cancel.clone();
                let timed_out = &timed_out;
                s.spawn(move || {
                    if let Err(mpsc::RecvTimeoutError::Timeout) = done_rx.recv_timeout(limit) {
                        tracing::warn!(?limit, "job timed out, cancelling workers");
                        timed_out.store(true, Ordering::Relaxed);
                        cancel.cancel();
                    }
                });
            }
            let result = self.run(url, destination, sink, &job_cancel);
            drop(done_tx);
            result
        });

        match result {
            Ok(report) => {
                tracing::info!(
                    phase = %JobPhase::Done,
                    dest = %destination.display(),
                    mode = ?report.mode,
                    bytes = report.bytes_written,
                    "download finished"
                );
                Ok(report)
            }
            Err(err) => {
                let err = match (err, self.options.job_timeout) {
                    (DownloadError::Cancelled, Some(limit)) if timed_out.load(Ordering::Relaxed) => {
                        DownloadError::TimedOut(limit)
                    }
                    (err, _) => err,
                };
                tracing::warn!(phase = %JobPhase::Failed, url, "download failed: {}", err);
                Err(err)
            }
        }
    }

    fn run(
        &self,
        url: &str,
        destination: &Path,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<DownloadReport, DownloadError> {
        let source = Source {
            url: url.to_string(),
            headers: self.options.headers.clone(),
        };

        tracing::info!(phase = %JobPhase::Probing, url, "probing resource");
        let descriptor = probe::probe(&source, &self.options.curl)?;
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        if descriptor.total_length > 0 {
            sink.set_total(descriptor.total_length);
        }

        if descriptor.can_split() {
            self.run_multi(&source, &descriptor, destination, sink, cancel)
        } else {
            self.run_single(&source, &descriptor, destination, sink, cancel)
        }
    }

    fn run_multi(
        &self,
        source: &Source,
        descriptor: &ResourceDescriptor,
        destination: &Path,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<DownloadReport, DownloadError> {
        let ranges = planner::plan(descriptor.total_length, self.options.concurrency)?;
        let store = PartStore::for_destination(destination, self.options.resume);
        store.prepare()?;

        let mut work = Vec::with_capacity(ranges.len());
        let mut bytes_resumed = 0u64;
        for range in &ranges {
            let state = store.part_state(range)?;
            if state.bytes_present > 0 {
                tracing::debug!(index = range.index, present = state.bytes_present, "resuming part");
                sink.add(state.bytes_present);
                bytes_resumed += state.bytes_present;
            }
            work.push((*range, state.bytes_present));
        }

        tracing::info!(
            phase = %JobPhase::MultiFetch,
            parts = ranges.len(),
            total = descriptor.total_length,
            resumed = bytes_resumed,
            "fetching ranges"
        );
        let fetcher = PartFetcher {
            source,
            curl: self.options.curl,
            store: &store,
            cancel,
        };
        let bytes_fetched = match multi::fetch_all(&fetcher, &work, sink) {
            Ok(n) => n,
            Err(err) => {
                if !store.resume() {
                    if let Err(e) = store.remove_all() {
                        tracing::warn!("failed to remove staging directory: {}", e);
                    }
                }
                return Err(err);
            }
        };

        tracing::info!(phase = %JobPhase::Merging, dest = %destination.display(), "merging parts");
        let bytes_written = merge::merge(destination, &store, &ranges)?;
        Ok(DownloadReport {
            mode: FetchMode::Multi { parts: ranges.len() },
            bytes_written,
            bytes_fetched,
            bytes_resumed,
        })
    }

    fn run_single(
        &self,
        source: &Source,
        descriptor: &ResourceDescriptor,
        destination: &Path,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<DownloadReport, DownloadError> {
        tracing::info!(
            phase = %JobPhase::SingleFetch,
            status = descriptor.status,
            supports_range = descriptor.supports_range,
            "ranges unavailable, using a single stream"
        );
        // A length from a failed HEAD describes the error page, not the resource.
        let expected = (descriptor.status == 200 && descriptor.total_length > 0)
            .then_some(descriptor.total_length);

        match fetcher::fetch_whole(source, &self.options.curl, destination, expected, sink, cancel) {
            Ok(written) => Ok(DownloadReport {
                mode: FetchMode::Single,
                bytes_written: written,
                bytes_fetched: written,
                bytes_resumed: 0,
            }),
            Err(err) => {
                if let Err(e) = std::fs::remove_file(destination) {
                    tracing::debug!(dest = %destination.display(), "no partial destination removed: {}", e);
                }
                Err(match err {
                    FetchError::Cancelled => DownloadError::Cancelled,
                    other => DownloadError::Single(other),
                })
            }
        }
    }
}
