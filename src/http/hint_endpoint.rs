//! Synthetic HTTP responder for the `X-Action: regenerate-hint` in-band
//! control flow (§4.K).
//!
//! Shares the proxy's listening port with the `CONNECT` flow;
//! `net::connect_parser` forks into this module once it recognizes the
//! `regenerate-hint` substring on a non-`CONNECT` request.

use serde_json::json;

const CORS_HEADERS: &str = "Access-Control-Allow-Origin: *\r\n\
Access-Control-Allow-Methods: POST, OPTIONS\r\n\
Access-Control-Allow-Headers: Content-Type, X-Action\r\n";

pub enum RequestKind {
    /// The CORS preflight `OPTIONS` request; no payload follows on this
    /// leg, the client POSTs separately.
    Preflight,
    /// A POST carrying the actual regenerate-hint request.
    Regenerate,
}

/// Distinguish the preflight `OPTIONS` leg from the follow-up `POST`
/// (§4.K, §8 scenario 6).
pub fn classify(initial_bytes: &[u8]) -> RequestKind {
    if initial_bytes.len() >= 7 && initial_bytes[..7].eq_ignore_ascii_case(b"OPTIONS") {
        RequestKind::Preflight
    } else {
        RequestKind::Regenerate
    }
}

/// `HTTP/1.1 200 OK` + the three CORS headers + `Content-Length: 0`.
pub fn preflight_reply() -> Vec<u8> {
    format!("HTTP/1.1 200 OK\r\n{CORS_HEADERS}Content-Length: 0\r\n\r\n").into_bytes()
}

/// `{"hints":[...]}` wrapped in a 200 response with the same CORS
/// headers and the correct `Content-Length` (§4.K).
pub fn hints_reply(hints: &[String]) -> Vec<u8> {
    let body = json!({ "hints": hints }).to_string();
    let mut out =
        format!("HTTP/1.1 200 OK\r\n{CORS_HEADERS}Content-Length: {}\r\n\r\n", body.len())
            .into_bytes();
    out.extend_from_slice(body.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byteutil::find_subslice;

    #[test]
    fn preflight_reply_carries_cors_headers_and_zero_length() {
        let reply = preflight_reply();
        assert!(find_subslice(&reply, b"Access-Control-Allow-Origin: *").is_some());
        assert!(find_subslice(&reply, b"Content-Length: 0").is_some());
        assert!(reply.ends_with(b"\r\n\r\n"));
    }

    #[test]
    fn hints_reply_has_matching_content_length() {
        let hints = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
        let reply = hints_reply(&hints);
        let header_end = crate::byteutil::find_header_terminator(&reply).unwrap();
        let body = &reply[header_end..];
        let expected = format!("Content-Length: {}", body.len());
        assert!(find_subslice(&reply, expected.as_bytes()).is_some());
    }

    #[test]
    fn classifies_options_as_preflight() {
        assert!(matches!(classify(b"OPTIONS / HTTP/1.1\r\n"), RequestKind::Preflight));
    }

    #[test]
    fn classifies_post_as_regenerate() {
        assert!(matches!(classify(b"POST / HTTP/1.1\r\n"), RequestKind::Regenerate));
    }
}
