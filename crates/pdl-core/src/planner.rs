//! Range math and part planning.
//!
//! Ranges are half-open `[start, end)` everywhere in this crate. The inclusive
//! form only exists on the wire and is produced by `Range::curl_range_from`.

use crate::error::PlanningError;

/// One contiguous slice of the resource, assigned to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    /// Position in the partition; also the staging entry key.
    pub index: usize,
    /// Start offset (inclusive).
    pub start: u64,
    /// End offset (exclusive).
    pub end: u64,
}

impl Range {
    /// Length of this range in bytes.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Curl range value (inclusive end) for the suffix starting at `from`:
    /// `from-(end-1)`. None when nothing is left to request.
    pub fn curl_range_from(&self, from: u64) -> Option<String> {
        if from >= self.end {
            return None;
        }
        Some(format!("{}-{}", from, self.end - 1))
    }
}

/// Splits `[0, total_len)` into `concurrency` contiguous ranges.
///
/// Every range but the last gets `total_len / concurrency` bytes; the last one
/// absorbs the remainder so the partition ends exactly at `total_len`.
pub fn plan(total_len: u64, concurrency: usize) -> Result<Vec<Range>, PlanningError> {
    if concurrency == 0 {
        return Err(PlanningError::ZeroConcurrency);
    }
    if total_len == 0 {
        return Err(PlanningError::EmptyResource);
    }

    let base = total_len / concurrency as u64;
    let mut out = Vec::with_capacity(concurrency);
    let mut start = 0u64;
    for index in 0..concurrency {
        let end = if index == concurrency - 1 {
            total_len
        } else {
            start + base
        };
        out.push(Range { index, start, end });
        start = end;
    }
    Ok(out)
}
