//! Single-stream GET (no Range), straight into the destination.

use std::path::Path;

use crate::control::CancelToken;
use crate::error::FetchError;
use crate::progress::ProgressSink;
use crate::storage::PartWriter;
use crate::transfer::{self, CurlOptions, Source};

use super::stream;

/// Downloads `source` with one unranged GET, truncating `destination` first.
/// When `expected_len` is known the body must match it exactly.
/// Returns the number of bytes written.
pub fn fetch_whole(
    source: &Source,
    curl: &CurlOptions,
    destination: &Path,
    expected_len: Option<u64>,
    sink: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<u64, FetchError> {
    if cancel.is_cancelled() {
        return Err(FetchError::Cancelled);
    }
    let mut writer = PartWriter::open(destination.to_path_buf(), false)?;
    let mut easy = transfer::easy_for(source, curl).map_err(FetchError::Curl)?;

    let written = stream::stream_body(
        &mut easy,
        &mut writer,
        expected_len,
        |head| match head.status {
            200..=299 => Ok(()),
            code => Err(FetchError::Http(code)),
        },
        sink,
        cancel,
    )?;
    writer.finish()?;
    Ok(written)
}
