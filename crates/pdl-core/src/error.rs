//! Error taxonomy for the download pipeline.
//!
//! Each phase has its own error type so callers can tell where a job failed;
//! `DownloadError` is the single terminal error a job reports.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Metadata (HEAD) request failed before any response could be read.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("metadata request failed: {0}")]
    Transport(#[source] curl::Error),
}

/// Degenerate inputs to the range planner.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanningError {
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("cannot split a zero-length resource into ranges")]
    EmptyResource,
}

/// Staging or destination I/O failed.
#[derive(Debug, Error)]
#[error("{}: {}", .path.display(), .source)]
pub struct StorageError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl StorageError {
    pub fn new(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// Error returned by a single range (or single-stream) fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Curl reported a transport error (timeout, connection reset, DNS, ...).
    #[error("transfer failed: {0}")]
    Curl(#[source] curl::Error),
    /// The response had a status we cannot use for this request.
    #[error("HTTP {0}")]
    Http(u32),
    /// A ranged request starting past offset 0 was answered with the whole body.
    #[error("server ignored the range starting at byte {from} (HTTP 200)")]
    RangeIgnored { from: u64 },
    /// A 206 answer whose `Content-Range` does not start where we asked.
    #[error("server answered a range starting at {got:?}, requested {requested}")]
    RangeMismatch { requested: u64, got: Option<u64> },
    /// The server sent more bytes than were requested (e.g. 200 with the full body).
    #[error("server sent more than the {expected} requested bytes")]
    Overflow { expected: u64 },
    /// The body ended before the requested number of bytes arrived.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    /// The job's cancel token was set while this fetch was in flight.
    #[error("fetch cancelled")]
    Cancelled,
    #[error("worker thread panicked")]
    Panicked,
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

/// Concatenation of staged parts into the destination failed.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("part {index} holds {actual} bytes, expected {expected}")]
    PartSize {
        index: usize,
        expected: u64,
        actual: u64,
    },
    #[error("merged {actual} bytes, expected {expected}")]
    Length { expected: u64, actual: u64 },
}

/// Terminal error of one download job. Names the phase that failed.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("probe failed: {0}")]
    Probe(#[from] ProbeError),
    #[error("planning failed: {0}")]
    Planning(#[from] PlanningError),
    #[error("range {index} failed: {source}")]
    Fetch {
        index: usize,
        #[source]
        source: FetchError,
    },
    #[error("single-stream fetch failed: {0}")]
    Single(#[source] FetchError),
    #[error("staging failed: {0}")]
    Storage(#[from] StorageError),
    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),
    #[error("download cancelled")]
    Cancelled,
    #[error("download timed out after {0:?}")]
    TimedOut(Duration),
}
