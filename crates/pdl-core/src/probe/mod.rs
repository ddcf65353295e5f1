//! Capability probe: HEAD request for length and range support.

mod parse;

use std::str;

use crate::error::ProbeError;
use crate::transfer::{self, CurlOptions, Source};

/// What the probe learned about the resource. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub locator: String,
    /// `Content-Length` of the final response; 0 when absent.
    pub total_length: u64,
    /// 200 response with `Accept-Ranges: bytes`.
    pub supports_range: bool,
    /// Status code of the final response.
    pub status: u32,
}

impl ResourceDescriptor {
    /// True when the resource can be split into concurrent ranged fetches.
    pub fn can_split(&self) -> bool {
        self.supports_range && self.total_length > 0
    }
}

/// Performs a HEAD request and returns the resource descriptor.
///
/// Only transport failures are errors. A non-200 answer (e.g. a server that
/// rejects HEAD) yields `supports_range = false` so the caller falls back to a
/// single unranged GET.
pub fn probe(source: &Source, opts: &CurlOptions) -> Result<ResourceDescriptor, ProbeError> {
    let mut lines: Vec<String> = Vec::new();

    let mut easy = transfer::easy_for(source, opts).map_err(ProbeError::Transport)?;
    easy.nobody(true).map_err(ProbeError::Transport)?;
    easy.timeout(opts.connect_timeout.saturating_mul(2))
        .map_err(ProbeError::Transport)?;

    {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    let line = s.trim_end();
                    // Each redirect hop starts a new header block.
                    if line.starts_with("HTTP/") {
                        lines.clear();
                    }
                    lines.push(line.to_string());
                }
                true
            })
            .map_err(ProbeError::Transport)?;
        transfer.perform().map_err(ProbeError::Transport)?;
    }

    let status = easy.response_code().map_err(ProbeError::Transport)?;
    let headers = parse::parse_headers(&lines);
    let descriptor = ResourceDescriptor {
        locator: source.url.clone(),
        total_length: headers.content_length.unwrap_or(0),
        supports_range: status == 200 && headers.accept_ranges,
        status,
    };
    tracing::debug!(
        url = %source.url,
        status,
        total_length = descriptor.total_length,
        supports_range = descriptor.supports_range,
        "probe finished"
    );
    Ok(descriptor)
}
