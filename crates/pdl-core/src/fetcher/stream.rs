//! Body streaming shared by range and single-stream fetches.

use std::cell::Cell;
use std::str;

use crate::control::CancelToken;
use crate::error::{FetchError, StorageError};
use crate::progress::ProgressSink;
use crate::storage::PartWriter;

/// What the header callback saw of the final response.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) struct ResponseHead {
    pub status: u32,
    /// First byte offset of `Content-Range`, if the response carried one.
    pub range_start: Option<u64>,
}

impl ResponseHead {
    /// Fold one raw header line into the head. A status line starts a new
    /// response (redirect hops, interim responses).
    fn observe(&mut self, line: &str) {
        let line = line.trim_end();
        if line.starts_with("HTTP/") {
            *self = ResponseHead {
                status: line
                    .split_whitespace()
                    .nth(1)
                    .and_then(|code| code.parse().ok())
                    .unwrap_or(0),
                range_start: None,
            };
        } else if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-range") {
                self.range_start = content_range_start(value);
            }
        }
    }
}

/// `bytes 100-199/1000` → 100.
fn content_range_start(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (start, _) = rest.split_once('-')?;
    start.trim().parse().ok()
}

/// Perform the transfer on `easy`, writing each received chunk to `writer` and
/// reporting its size to `sink`. Returns the number of body bytes written.
///
/// `check` vets the final response head before the first body byte is
/// written; a rejected response leaves `writer` untouched. Returning 0 from
/// the write callback makes curl abort the transfer; that is how rejection,
/// cancellation, storage failures and oversized bodies stop it. The progress
/// callback also fires while idle, so a stalled transfer notices cancellation
/// without waiting for data.
pub(super) fn stream_body(
    easy: &mut curl::easy::Easy,
    writer: &mut PartWriter,
    expected: Option<u64>,
    check: impl Fn(&ResponseHead) -> Result<(), FetchError>,
    sink: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<u64, FetchError> {
    easy.fail_on_error(true).map_err(FetchError::Curl)?;
    easy.progress(true).map_err(FetchError::Curl)?;

    let head = Cell::new(ResponseHead::default());
    let mut checked = false;
    let mut rejected: Option<FetchError> = None;
    let mut received = 0u64;
    let mut overflow = false;
    let mut storage_error: Option<StorageError> = None;

    let performed = {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(line) = str::from_utf8(data) {
                    let mut h = head.get();
                    h.observe(line);
                    head.set(h);
                }
                true
            })
            .map_err(FetchError::Curl)?;
        transfer
            .write_function(|data| {
                if cancel.is_cancelled() {
                    return Ok(0);
                }
                if !checked {
                    if let Err(e) = check(&head.get()) {
                        rejected = Some(e);
                        return Ok(0);
                    }
                    checked = true;
                }
                let n = data.len() as u64;
                if expected.is_some_and(|exp| received + n > exp) {
                    overflow = true;
                    return Ok(0);
                }
                match writer.write_chunk(data) {
                    Ok(()) => {
                        received += n;
                        sink.add(n);
                        Ok(data.len())
                    }
                    Err(e) => {
                        storage_error = Some(e);
                        Ok(0)
                    }
                }
            })
            .map_err(FetchError::Curl)?;
        transfer
            .progress_function(|_, _, _, _| !cancel.is_cancelled())
            .map_err(FetchError::Curl)?;
        transfer.perform()
    };

    if let Err(e) = performed {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        if let Some(err) = rejected {
            return Err(err);
        }
        if let Some(se) = storage_error {
            return Err(FetchError::Storage(se));
        }
        if overflow {
            return Err(FetchError::Overflow {
                expected: expected.unwrap_or(0),
            });
        }
        if e.is_http_returned_error() {
            let code = easy.response_code().unwrap_or(0);
            return Err(FetchError::Http(code));
        }
        return Err(FetchError::Curl(e));
    }

    // An empty body never reaches the write callback.
    if !checked {
        check(&head.get())?;
    }
    if let Some(exp) = expected {
        if received != exp {
            return Err(FetchError::PartialTransfer {
                expected: exp,
                received,
            });
        }
    }
    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head_of(lines: &[&str]) -> ResponseHead {
        let mut head = ResponseHead::default();
        for line in lines {
            head.observe(line);
        }
        head
    }

    #[test]
    fn partial_content_head() {
        let head = head_of(&[
            "HTTP/1.1 206 Partial Content\r\n",
            "Content-Length: 100\r\n",
            "Content-Range: bytes 100-199/1000\r\n",
            "\r\n",
        ]);
        assert_eq!(
            head,
            ResponseHead {
                status: 206,
                range_start: Some(100)
            }
        );
    }

    #[test]
    fn redirect_hop_is_forgotten() {
        let head = head_of(&[
            "HTTP/1.1 302 Found\r\n",
            "Content-Range: bytes 5-9/10\r\n",
            "Location: /other\r\n",
            "\r\n",
            "HTTP/2 200\r\n",
            "content-length: 10\r\n",
            "\r\n",
        ]);
        assert_eq!(
            head,
            ResponseHead {
                status: 200,
                range_start: None
            }
        );
    }

    #[test]
    fn content_range_forms() {
        assert_eq!(content_range_start(" bytes 0-249/1000"), Some(0));
        assert_eq!(content_range_start("bytes 750-999/*"), Some(750));
        assert_eq!(content_range_start("bytes */1000"), None);
        assert_eq!(content_range_start("items 1-2/3"), None);
    }
}
