pub mod config;
pub mod logging;

pub mod control;
pub mod downloader;
pub mod error;
pub mod fetcher;
pub mod merge;
pub mod planner;
pub mod probe;
pub mod progress;
pub mod storage;
pub mod transfer;
pub mod url_model;

pub use control::CancelToken;
pub use downloader::{DownloadOptions, DownloadReport, Downloader, FetchMode};
pub use error::DownloadError;
pub use progress::{ByteCounter, ProgressSink};
