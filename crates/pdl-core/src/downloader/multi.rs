//! Fork-join over ranges: one scoped thread per range, one result per thread.

use std::sync::mpsc;
use std::thread;

use crate::control::CancelToken;
use crate::error::{DownloadError, FetchError};
use crate::fetcher::PartFetcher;
use crate::planner::Range;
use crate::progress::ProgressSink;

type WorkerResult = (usize, Result<u64, FetchError>);

/// Reports a worker that unwinds instead of returning: cancels its siblings and
/// sends `Panicked` for its range.
struct PanicGuard<'a> {
    index: usize,
    cancel: &'a CancelToken,
    tx: mpsc::Sender<WorkerResult>,
}

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.cancel.cancel();
            let _ = self.tx.send((self.index, Err(FetchError::Panicked)));
        }
    }
}

/// Fetch every `(range, resume_offset)` concurrently and wait for all of them.
///
/// The first real failure cancels the siblings through the fetcher's token;
/// the join still waits for every worker before returning. Errors caused only
/// by that cancellation never mask the failure that triggered it.
pub(super) fn fetch_all(
    fetcher: &PartFetcher<'_>,
    work: &[(Range, u64)],
    sink: &dyn ProgressSink,
) -> Result<u64, DownloadError> {
    let (tx, rx) = mpsc::channel::<WorkerResult>();

    thread::scope(|s| {
        let handles: Vec<_> = work
            .iter()
            .map(|(range, offset)| {
                let tx = tx.clone();
                s.spawn(move || {
                    let guard = PanicGuard {
                        index: range.index,
                        cancel: fetcher.cancel,
                        tx,
                    };
                    let res = fetcher.fetch(range, *offset, sink);
                    let _ = guard.tx.send((range.index, res));
                })
            })
            .collect();
        drop(tx);

        let mut first_error: Option<(usize, FetchError)> = None;
        let mut fetched = 0u64;
        let mut record = |index: usize, err: FetchError| {
            if !err.is_cancelled() {
                tracing::warn!(index, "range failed, cancelling remaining workers: {}", err);
                fetcher.cancel.cancel();
            }
            let replace = match &first_error {
                None => true,
                Some((_, prev)) => prev.is_cancelled() && !err.is_cancelled(),
            };
            if replace {
                first_error = Some((index, err));
            }
        };

        // Ends once every worker has dropped its sender.
        for (index, res) in rx.iter() {
            match res {
                Ok(n) => fetched += n,
                Err(e) => record(index, e),
            }
        }
        // A panicked worker already reported through its guard.
        for handle in handles {
            let _ = handle.join();
        }

        match first_error {
            None => Ok(fetched),
            Some((_, FetchError::Cancelled)) => Err(DownloadError::Cancelled),
            Some((index, source)) => Err(DownloadError::Fetch { index, source }),
        }
    })
}
