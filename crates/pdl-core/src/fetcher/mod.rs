//! Range fetch: one GET with a `Range` header per part, streamed into staging.

mod single;
mod stream;

pub use single::fetch_whole;

use crate::control::CancelToken;
use crate::error::FetchError;
use crate::planner::Range;
use crate::progress::ProgressSink;
use crate::storage::PartStore;
use crate::transfer::{self, CurlOptions, Source};

use stream::ResponseHead;

/// Fetches ranges of one resource into one job's staging area.
///
/// Shared by all workers of a job; each call touches only the part file of
/// the range it was given.
pub struct PartFetcher<'a> {
    pub source: &'a Source,
    pub curl: CurlOptions,
    pub store: &'a PartStore,
    pub cancel: &'a CancelToken,
}

impl PartFetcher<'_> {
    /// Fetch `range` starting `resume_offset` bytes into it. Returns the number
    /// of bytes received over the wire.
    ///
    /// When nothing is left (`start + resume_offset >= end`) this is a no-op:
    /// no request is made and staged data is left untouched.
    pub fn fetch(
        &self,
        range: &Range,
        resume_offset: u64,
        sink: &dyn ProgressSink,
    ) -> Result<u64, FetchError> {
        let from = range.start.saturating_add(resume_offset);
        let Some(curl_range) = range.curl_range_from(from) else {
            tracing::debug!(index = range.index, "range already complete");
            return Ok(0);
        };
        if self.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let expected = range.end - from;
        let mut writer = self.store.writer(range, resume_offset > 0)?;
        let mut easy = transfer::easy_for(self.source, &self.curl).map_err(FetchError::Curl)?;
        easy.range(&curl_range).map_err(FetchError::Curl)?;

        tracing::debug!(index = range.index, range = %curl_range, "range fetch started");
        let received = stream::stream_body(
            &mut easy,
            &mut writer,
            Some(expected),
            |head| range_response_ok(head, from),
            sink,
            self.cancel,
        )?;
        writer.finish()?;
        tracing::debug!(index = range.index, received, "range fetch finished");
        Ok(received)
    }
}

/// A part may only receive bytes that start exactly at `from`: a 206 whose
/// `Content-Range` starts there, or a whole-body 200 when `from` is 0.
fn range_response_ok(head: &ResponseHead, from: u64) -> Result<(), FetchError> {
    match head.status {
        206 if head.range_start == Some(from) => Ok(()),
        206 => Err(FetchError::RangeMismatch {
            requested: from,
            got: head.range_start,
        }),
        200 if from == 0 => Ok(()),
        200 => Err(FetchError::RangeIgnored { from }),
        code => Err(FetchError::Http(code)),
    }
}
