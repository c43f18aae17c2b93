//! `CONNECT host:port` preamble parser (§4.E).
//!
//! Reads into a growing header buffer until CRLFCRLF is observed. If the
//! first seven bytes aren't `CONNECT`, the accumulated bytes are checked
//! for the literal substring `regenerate-hint` before giving up — that's
//! the fork into the synthetic hint-regeneration responder (§4.K).

use crate::byteutil::{
    find_header_terminator, find_subslice_ci, parse_leading_decimal, split_lines, strip_prefix_ci,
    trim_leading_space,
};

/// Bound on how much we'll accumulate before giving up on ever seeing
/// CRLFCRLF — the original's growing buffer is conceptually unbounded but
/// a real proxy can't let a client hold a slot open forever.
const MAX_HEADER_BYTES: usize = 8192;

pub enum ConnectParseResult {
    NeedMore,
    RegenerateHint,
    Malformed,
    Established { host: String, port: u16, header_len: usize },
}

pub fn parse(buf: &[u8]) -> ConnectParseResult {
    match find_header_terminator(buf) {
        None => {
            if buf.len() >= MAX_HEADER_BYTES {
                ConnectParseResult::Malformed
            } else {
                ConnectParseResult::NeedMore
            }
        }
        Some(end) => {
            let header = &buf[..end];
            let is_connect = header.len() >= 7 && header[..7].eq_ignore_ascii_case(b"CONNECT");
            if !is_connect {
                return if find_subslice_ci(buf, b"regenerate-hint").is_some() {
                    ConnectParseResult::RegenerateHint
                } else {
                    ConnectParseResult::Malformed
                };
            }
            match extract_connect_fields(header) {
                Some((host, port)) => ConnectParseResult::Established {
                    host,
                    port,
                    header_len: end,
                },
                None => ConnectParseResult::Malformed,
            }
        }
    }
}

/// The fixed reply sent once the CONNECT request has been parsed (§4.E).
pub const CONNECT_ESTABLISHED_REPLY: &[u8] = b"HTTP/1.1 200 Connection Established\r\n\r\n";

fn extract_connect_fields(header: &[u8]) -> Option<(String, u16)> {
    let mut lines = split_lines(header);
    let connect_line = lines.next()?;
    let rest = strip_prefix_ci(connect_line, b"CONNECT ")?;
    let (connect_host, connect_port) = parse_host_port_token(rest)?;

    let mut host_line_host: Option<String> = None;
    let mut host_line_port: Option<u16> = None;
    for line in lines {
        if let Some(value) = strip_prefix_ci(line, b"Host:") {
            let value = trim_leading_space(value);
            if let Some((h, p)) = parse_host_port_token(value) {
                host_line_host = Some(h);
                host_line_port = p;
            }
            break;
        }
    }

    let host = if !connect_host.is_empty() {
        connect_host
    } else {
        host_line_host.unwrap_or_default()
    };
    // Port: prefer the CONNECT line, else the Host: line, else 80 (§4.E).
    let port = connect_port.or(host_line_port).unwrap_or(80);

    if host.is_empty() {
        None
    } else {
        Some((host, port))
    }
}

/// Read a hostname token, terminated by the first of ` `, `\r`, `\n`, `\0`,
/// or `:`; if a `:` is found, parse the decimal port that follows.
fn parse_host_port_token(buf: &[u8]) -> Option<(String, Option<u16>)> {
    let mut end = 0;
    while end < buf.len() && !matches!(buf[end], b' ' | b'\r' | b'\n' | 0 | b':') {
        end += 1;
    }
    let host = std::str::from_utf8(&buf[..end]).ok()?.to_string();
    let port = if end < buf.len() && buf[end] == b':' {
        parse_leading_decimal(&buf[end + 1..]).map(|p| p as u16)
    } else {
        None
    };
    Some((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port_from_connect_line() {
        let input = b"CONNECT example.com:443 HTTP/1.1\r\nHost: example.com:443\r\n\r\n";
        match parse(input) {
            ConnectParseResult::Established { host, port, .. } => {
                assert_eq!(host, "example.com");
                assert_eq!(port, 443);
            }
            _ => panic!("expected Established"),
        }
    }

    #[test]
    fn falls_back_to_port_80() {
        let input = b"CONNECT example.com HTTP/1.1\r\nHost: example.com\r\n\r\n";
        match parse(input) {
            ConnectParseResult::Established { port, .. } => assert_eq!(port, 80),
            _ => panic!("expected Established"),
        }
    }

    #[test]
    fn host_line_port_used_when_connect_line_lacks_one() {
        let input = b"CONNECT example.com HTTP/1.1\r\nHost: example.com:8443\r\n\r\n";
        match parse(input) {
            ConnectParseResult::Established { port, .. } => assert_eq!(port, 8443),
            _ => panic!("expected Established"),
        }
    }

    #[test]
    fn detects_regenerate_hint_flow() {
        let input = b"OPTIONS / HTTP/1.1\r\nX-Action: regenerate-hint\r\n\r\n";
        assert!(matches!(parse(input), ConnectParseResult::RegenerateHint));
    }

    #[test]
    fn non_connect_without_marker_is_malformed() {
        let input = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";
        assert!(matches!(parse(input), ConnectParseResult::Malformed));
    }

    #[test]
    fn incomplete_header_asks_for_more() {
        let input = b"CONNECT example.com:443 HTTP/1.1\r\nHost: ex";
        assert!(matches!(parse(input), ConnectParseResult::NeedMore));
    }
}
