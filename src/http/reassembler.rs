//! Incremental header/body reassembly across fragmented TLS records
//! (§4.H).
//!
//! Three states per direction: `HeaderIncomplete → HeaderComplete →
//! BodyComplete`. Grounded on `examples/original_source/mitm.c`'s read
//! callback, which does the same split-on-CRLFCRLF dance over a growing
//! buffer before handing off to the body accumulator.

use crate::byteutil::{find_header_terminator, find_subslice, split_lines, strip_prefix_ci, trim_leading_space};
use crate::net::record::{BodyAccumulator, HeaderAccumulator};

#[derive(Debug, PartialEq, Eq)]
pub enum Progress {
    HeaderIncomplete,
    BodyInProgress,
    BodyComplete,
    /// No `Content-Length` was present: per §9 "Chunked bodies", such
    /// responses are passed through unbuffered rather than mutated.
    PassThrough,
}

/// Feed newly read bytes into the header/body accumulators for one
/// direction of a connection. Returns the resulting state; the caller
/// resets both accumulators after consuming a `BodyComplete` or
/// `PassThrough` result.
pub fn ingest(
    header: &mut HeaderAccumulator,
    body: &mut BodyAccumulator,
    chunked: &mut bool,
    chunk: &[u8],
) -> Progress {
    if !header.is_complete() {
        header.bytes.extend_from_slice(chunk);
        header.filled = header.bytes.len();

        let Some(end) = find_header_terminator(&header.bytes) else {
            return Progress::HeaderIncomplete;
        };

        let trailing = header.bytes.split_off(end);
        header.complete_len = end as i64;
        header.filled = header.bytes.len();

        parse_content_length(&header.bytes, body);
        *chunked = parse_chunked(&header.bytes);

        if !trailing.is_empty() {
            body.bytes.extend_from_slice(&trailing);
            body.filled = body.bytes.len();
        }
        return body_progress(body);
    }

    body.bytes.extend_from_slice(chunk);
    body.filled = body.bytes.len();
    body_progress(body)
}

fn body_progress(body: &BodyAccumulator) -> Progress {
    if body.declared_len < 0 {
        Progress::PassThrough
    } else if body.is_complete() {
        Progress::BodyComplete
    } else {
        Progress::BodyInProgress
    }
}

fn parse_content_length(header_bytes: &[u8], body: &mut BodyAccumulator) {
    for line in split_lines(header_bytes) {
        if let Some(rest) = strip_prefix_ci(line, b"Content-Length:") {
            let rest = trim_leading_space(rest);
            if let Some(n) = crate::byteutil::parse_leading_decimal(rest) {
                body.declared_len = n as i64;
                return;
            }
        }
    }
}

fn parse_chunked(header_bytes: &[u8]) -> bool {
    for line in split_lines(header_bytes) {
        if let Some(rest) = strip_prefix_ci(line, b"Transfer-Encoding:") {
            let rest = trim_leading_space(rest);
            if rest.eq_ignore_ascii_case(b"chunked") {
                return true;
            }
        }
    }
    false
}

/// Strip any `Accept-Encoding:` line from a finalized request header
/// (client→origin only, §4.H), preserving every other line and the
/// terminating CRLFCRLF.
pub fn strip_accept_encoding(header_bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(header_bytes.len());
    for line in split_lines(header_bytes) {
        if line.is_empty() || strip_prefix_ci(line, b"Accept-Encoding:").is_some() {
            continue;
        }
        out.extend_from_slice(line);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out
}

const GUESS_START: &[u8] = b"r: fail";
const GUESS_END: &[u8] = b"d: null";

/// Capture the bytes between `r: fail` and a later `d: null` in a
/// request body (§4.H "Guess sniffing").
pub fn sniff_guess(body_bytes: &[u8]) -> Option<Vec<u8>> {
    let start = find_subslice(body_bytes, GUESS_START)?;
    let after_start = start + GUESS_START.len();
    let rel_end = find_subslice(&body_bytes[after_start..], GUESS_END)?;
    Some(body_bytes[after_start..after_start + rel_end].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_split_across_two_reads_still_parses() {
        let mut header = HeaderAccumulator::new();
        let mut body = BodyAccumulator::new();
        let mut chunked = false;

        let p1 = ingest(&mut header, &mut body, &mut chunked, b"HTTP/1.1 200 OK\r\nContent-L");
        assert_eq!(p1, Progress::HeaderIncomplete);

        let p2 = ingest(&mut header, &mut body, &mut chunked, b"ength: 5\r\n\r\nhello");
        assert_eq!(p2, Progress::BodyComplete);
        assert_eq!(body.bytes, b"hello");
    }

    #[test]
    fn body_accumulates_across_records_until_declared_length() {
        let mut header = HeaderAccumulator::new();
        let mut body = BodyAccumulator::new();
        let mut chunked = false;

        ingest(&mut header, &mut body, &mut chunked, b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n");
        let p1 = ingest(&mut header, &mut body, &mut chunked, b"hello");
        assert_eq!(p1, Progress::BodyInProgress);
        let p2 = ingest(&mut header, &mut body, &mut chunked, b"world");
        assert_eq!(p2, Progress::BodyComplete);
        assert_eq!(body.bytes, b"helloworld");
    }

    #[test]
    fn missing_content_length_is_pass_through() {
        let mut header = HeaderAccumulator::new();
        let mut body = BodyAccumulator::new();
        let mut chunked = false;
        let p = ingest(&mut header, &mut body, &mut chunked, b"HTTP/1.1 200 OK\r\nFoo: bar\r\n\r\nanything");
        assert_eq!(p, Progress::PassThrough);
    }

    #[test]
    fn strips_accept_encoding_preserving_other_lines() {
        let header = b"GET / HTTP/1.1\r\nAccept-Encoding: gzip, br\r\nFoo: bar\r\n\r\n";
        let out = strip_accept_encoding(header);
        assert!(find_subslice(&out, b"Accept-Encoding").is_none());
        assert!(find_subslice(&out, b"Foo: bar").is_some());
        assert!(out.ends_with(b"\r\n\r\n"));
    }

    #[test]
    fn sniffs_guess_between_markers() {
        let body = b"prefix r: fail SOMEGUESS d: null suffix";
        let guess = sniff_guess(body).unwrap();
        assert_eq!(guess, b" SOMEGUESS ");
    }

    #[test]
    fn no_guess_when_markers_absent() {
        assert!(sniff_guess(b"nothing interesting here").is_none());
    }
}
