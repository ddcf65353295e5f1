//! Integration tests: local HTTP server with Range support, split download,
//! resume, single-stream fallback and failure handling.

mod common;

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use common::range_server::{self, RangeServerOptions};
use pdl_core::error::{DownloadError, FetchError};
use pdl_core::storage::staging_dir;
use pdl_core::{ByteCounter, DownloadOptions, Downloader, FetchMode, ProgressSink};
use tempfile::tempdir;

fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn downloader(concurrency: usize, resume: bool) -> Downloader {
    Downloader::new(DownloadOptions {
        concurrency,
        resume,
        ..DownloadOptions::default()
    })
}

#[test]
fn four_ranges_reassemble_the_resource() {
    let data = body(100_000);
    let server = range_server::start(data.clone());
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.bin");
    let counter = ByteCounter::new();

    let report = downloader(4, false)
        .download(&server.url, &dest, &counter)
        .expect("download");

    assert_eq!(report.mode, FetchMode::Multi { parts: 4 });
    assert_eq!(report.bytes_written, 100_000);
    assert_eq!(report.bytes_fetched, 100_000);
    assert_eq!(report.bytes_resumed, 0);
    assert_eq!(counter.bytes_done(), 100_000);
    assert_eq!(counter.snapshot().total_bytes, 100_000);
    assert_eq!(fs::read(&dest).unwrap(), data);
    assert!(!staging_dir(&dest).exists(), "staging removed after merge");
    assert_eq!(
        server.get_ranges(),
        vec![
            "bytes=0-24999",
            "bytes=25000-49999",
            "bytes=50000-74999",
            "bytes=75000-99999",
        ]
    );
}

#[test]
fn uneven_split_keeps_every_boundary_byte() {
    let data = body(100_003);
    let server = range_server::start(data.clone());
    let dir = tempdir().unwrap();
    let dest = dir.path().join("odd.bin");
    let counter = ByteCounter::new();

    let report = downloader(7, false)
        .download(&server.url, &dest, &counter)
        .expect("download");

    assert_eq!(report.mode, FetchMode::Multi { parts: 7 });
    assert_eq!(fs::read(&dest).unwrap(), data);
    assert_eq!(counter.bytes_done(), 100_003);
}

#[test]
fn no_range_support_falls_back_to_single_stream() {
    let data = body(32 * 1024);
    let server = range_server::start_with_options(
        data.clone(),
        RangeServerOptions {
            support_ranges: false,
            advertise_ranges: false,
            ..RangeServerOptions::default()
        },
    );
    let dir = tempdir().unwrap();
    let dest = dir.path().join("single.bin");
    let counter = ByteCounter::new();

    let report = downloader(4, false)
        .download(&server.url, &dest, &counter)
        .expect("download");

    assert_eq!(report.mode, FetchMode::Single);
    assert_eq!(fs::read(&dest).unwrap(), data);
    assert_eq!(counter.bytes_done(), data.len() as u64);
    assert!(!staging_dir(&dest).exists(), "single stream never stages");
    assert!(server.get_ranges().is_empty(), "no ranged requests sent");
}

#[test]
fn head_blocked_falls_back_to_single_stream() {
    let data = body(10_000);
    let server = range_server::start_with_options(
        data.clone(),
        RangeServerOptions {
            head_allowed: false,
            ..RangeServerOptions::default()
        },
    );
    let dir = tempdir().unwrap();
    let dest = dir.path().join("nohead.bin");

    let report = downloader(4, false)
        .download(&server.url, &dest, &ByteCounter::new())
        .expect("download");

    assert_eq!(report.mode, FetchMode::Single);
    assert_eq!(fs::read(&dest).unwrap(), data);
}

#[test]
fn resume_requests_only_the_missing_suffix() {
    let data = body(100_000);
    let server = range_server::start(data.clone());
    let dir = tempdir().unwrap();
    let dest = dir.path().join("resume.bin");

    // Part 1 covers 25000..50000: 10_000 bytes already staged.
    // Part 3 covers 75000..100000: fully staged.
    let staging = staging_dir(&dest);
    fs::create_dir_all(&staging).unwrap();
    fs::write(staging.join("part-1"), &data[25_000..35_000]).unwrap();
    fs::write(staging.join("part-3"), &data[75_000..100_000]).unwrap();

    let counter = ByteCounter::new();
    let report = downloader(4, true)
        .download(&server.url, &dest, &counter)
        .expect("download");

    assert_eq!(
        server.get_ranges(),
        vec!["bytes=0-24999", "bytes=35000-49999", "bytes=50000-74999"]
    );
    assert_eq!(report.bytes_resumed, 35_000);
    assert_eq!(report.bytes_fetched, 65_000);
    assert_eq!(counter.bytes_done(), 100_000);
    assert_eq!(fs::read(&dest).unwrap(), data);
    assert!(!staging.exists());
}

#[test]
fn stale_staging_is_ignored_without_resume() {
    let data = body(40_000);
    let server = range_server::start(data.clone());
    let dir = tempdir().unwrap();
    let dest = dir.path().join("fresh.bin");

    let staging = staging_dir(&dest);
    fs::create_dir_all(&staging).unwrap();
    fs::write(staging.join("part-0"), vec![0xEE; 7_000]).unwrap();

    downloader(2, false)
        .download(&server.url, &dest, &ByteCounter::new())
        .expect("download");

    assert_eq!(server.get_ranges(), vec!["bytes=0-19999", "bytes=20000-39999"]);
    assert_eq!(fs::read(&dest).unwrap(), data);
}

#[test]
fn failing_range_cancels_its_siblings() {
    let data = body(400_000);
    let server = range_server::start_with_options(
        data,
        RangeServerOptions {
            fail_range_start: Some(100_000),
            stall: Some(Duration::from_secs(30)),
            ..RangeServerOptions::default()
        },
    );
    let dir = tempdir().unwrap();
    let dest = dir.path().join("broken.bin");

    let started = Instant::now();
    let err = downloader(4, false)
        .download(&server.url, &dest, &ByteCounter::new())
        .unwrap_err();

    assert!(
        started.elapsed() < Duration::from_secs(15),
        "stalled siblings must be cancelled, took {:?}",
        started.elapsed()
    );
    match err {
        DownloadError::Fetch { index, source } => {
            assert_eq!(index, 1);
            assert!(matches!(source, FetchError::Curl(_)), "got {source}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dest.exists(), "no merge after a failed range");
    assert!(!staging_dir(&dest).exists(), "staging discarded without resume");
}

#[test]
fn failed_job_keeps_staging_when_resume_is_enabled() {
    let data = body(80_000);
    let server = range_server::start_with_options(
        data,
        RangeServerOptions {
            fail_range_start: Some(40_000),
            ..RangeServerOptions::default()
        },
    );
    let dir = tempdir().unwrap();
    let dest = dir.path().join("later.bin");

    let err = downloader(2, true)
        .download(&server.url, &dest, &ByteCounter::new())
        .unwrap_err();

    assert!(matches!(err, DownloadError::Fetch { index: 1, .. }));
    assert!(!dest.exists());
    assert!(staging_dir(&dest).exists(), "staged parts kept for the next run");
}

#[test]
fn server_ignoring_ranges_is_rejected() {
    let data = body(50_000);
    let server = range_server::start_with_options(
        data,
        RangeServerOptions {
            support_ranges: false,
            advertise_ranges: true,
            ..RangeServerOptions::default()
        },
    );
    let dir = tempdir().unwrap();
    let dest = dir.path().join("liar.bin");

    let err = downloader(2, false)
        .download(&server.url, &dest, &ByteCounter::new())
        .unwrap_err();

    match err {
        DownloadError::Fetch { source, .. } => {
            assert!(
                matches!(
                    source,
                    FetchError::Overflow { .. } | FetchError::RangeIgnored { from: 25_000 }
                ),
                "got {source}"
            );
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dest.exists());
}

#[test]
fn resume_after_ranges_were_ignored_rebuilds_exact_bytes() {
    let data = body(50_000);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("twice.bin");

    let ignoring = range_server::start_with_options(
        data.clone(),
        RangeServerOptions {
            support_ranges: false,
            advertise_ranges: true,
            ..RangeServerOptions::default()
        },
    );
    let err = downloader(2, true)
        .download(&ignoring.url, &dest, &ByteCounter::new())
        .unwrap_err();
    assert!(matches!(err, DownloadError::Fetch { .. }), "got {err}");

    // The whole-body answer must not leak into the part starting at 25000.
    let staged = fs::metadata(staging_dir(&dest).join("part-1"))
        .map(|m| m.len())
        .unwrap_or(0);
    assert_eq!(staged, 0);

    let good = range_server::start(data.clone());
    let report = downloader(2, true)
        .download(&good.url, &dest, &ByteCounter::new())
        .expect("resumed download");
    assert_eq!(report.bytes_written, 50_000);
    assert_eq!(fs::read(&dest).unwrap(), data);
    assert!(!staging_dir(&dest).exists());
}

/// Panics on the first delta it receives.
struct PanicOnFirstDelta(AtomicBool);

impl ProgressSink for PanicOnFirstDelta {
    fn add(&self, _bytes: u64) {
        if !self.0.swap(true, Ordering::SeqCst) {
            panic!("progress sink failure");
        }
    }
}

#[test]
fn panicking_worker_cancels_its_siblings() {
    let data = body(400_000);
    let server = range_server::start_with_options(
        data,
        RangeServerOptions {
            stall: Some(Duration::from_secs(30)),
            ..RangeServerOptions::default()
        },
    );
    let dir = tempdir().unwrap();
    let dest = dir.path().join("panic.bin");

    let started = Instant::now();
    let err = downloader(4, false)
        .download(&server.url, &dest, &PanicOnFirstDelta(AtomicBool::new(false)))
        .unwrap_err();

    assert!(
        started.elapsed() < Duration::from_secs(15),
        "stalled siblings must be cancelled, took {:?}",
        started.elapsed()
    );
    assert!(
        matches!(
            err,
            DownloadError::Fetch {
                source: FetchError::Panicked,
                ..
            }
        ),
        "got {err}"
    );
    assert!(!dest.exists());
    assert!(!staging_dir(&dest).exists());
}

#[test]
fn job_timeout_cancels_all_workers() {
    let data = body(200_000);
    let server = range_server::start_with_options(
        data,
        RangeServerOptions {
            stall: Some(Duration::from_secs(30)),
            ..RangeServerOptions::default()
        },
    );
    let dir = tempdir().unwrap();
    let dest = dir.path().join("slow.bin");
    let dl = Downloader::new(DownloadOptions {
        concurrency: 2,
        job_timeout: Some(Duration::from_secs(1)),
        ..DownloadOptions::default()
    });

    let started = Instant::now();
    let err = dl.download(&server.url, &dest, &ByteCounter::new()).unwrap_err();

    assert!(matches!(err, DownloadError::TimedOut(d) if d == Duration::from_secs(1)));
    assert!(started.elapsed() < Duration::from_secs(15));
    assert!(!dest.exists());
}
