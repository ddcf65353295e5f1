//! Parse HEAD response header lines.

/// Headers relevant to planning a download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ProbeHeaders {
    pub content_length: Option<u64>,
    /// `Accept-Ranges: bytes` was present.
    pub accept_ranges: bool,
}

pub(crate) fn parse_headers(lines: &[String]) -> ProbeHeaders {
    let mut out = ProbeHeaders::default();
    for line in lines {
        let Some((name, value)) = line.trim().split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            out.content_length = value.parse::<u64>().ok();
        } else if name.eq_ignore_ascii_case("accept-ranges") {
            out.accept_ranges = value
                .split(',')
                .any(|unit| unit.trim().eq_ignore_ascii_case("bytes"));
        }
    }
    out
}
