//! Periodic progress line printed from a `ByteCounter` snapshot.

use pdl_core::progress::ProgressStats;
use pdl_core::ByteCounter;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const PROGRESS_INTERVAL_MS: u64 = 500;

pub struct Reporter {
    counter: Arc<ByteCounter>,
    handle: JoinHandle<()>,
}

impl Reporter {
    /// Stop the periodic task and print the final line.
    pub async fn finish(self) {
        self.handle.abort();
        let _ = self.handle.await;
        print_line(&self.counter.snapshot());
        println!();
    }
}

pub fn spawn_reporter(counter: Arc<ByteCounter>) -> Reporter {
    let task_counter = Arc::clone(&counter);
    let handle = tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_millis(PROGRESS_INTERVAL_MS));
        loop {
            tick.tick().await;
            print_line(&task_counter.snapshot());
        }
    });
    Reporter { counter, handle }
}

fn print_line(stats: &ProgressStats) {
    let line = format_line(stats);
    let mut out = std::io::stdout().lock();
    let _ = write!(out, "\r{}", line);
    let _ = out.flush();
}

pub(crate) fn format_line(stats: &ProgressStats) -> String {
    let done_mib = stats.bytes_done as f64 / 1_048_576.0;
    let rate_mib = stats.bytes_per_sec() / 1_048_576.0;
    match stats.fraction() {
        Some(fraction) => {
            let total_mib = stats.total_bytes as f64 / 1_048_576.0;
            let eta = stats
                .eta_secs()
                .map(|s| format!("{:.0}s", s))
                .unwrap_or_else(|| "?".to_string());
            format!(
                "  {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  ETA {}  ",
                done_mib,
                total_mib,
                fraction * 100.0,
                rate_mib,
                eta
            )
        }
        None => format!("  {:.1} MiB  {:.2} MiB/s  ", done_mib, rate_mib),
    }
}
