//! Response mutator: inject the hint overlay before `</body>` and fix up
//! `Content-Length` (§4.I).
//!
//! Pure and side-effect free — `net::event_loop` decides when a response
//! is "complete" (via `http::reassembler`) and where the overlay fragment
//! comes from (`llm::orchestrator`); this module only knows how to splice
//! it in.

use crate::byteutil::{find_header_terminator, find_subslice, split_lines, strip_prefix_ci};

/// The marker the mutator writes so a keep-alive connection's later
/// responses aren't re-mutated, and so re-feeding an already-mutated body
/// is a no-op (§4.I, §8 scenario 4).
pub const INJECTION_MARKER: &[u8] = b"M+I_Proxy";

/// Whether `full_response` (header ++ body, as handed off by the
/// reassembler) qualifies for mutation (§4.I).
pub fn should_mutate(target_host_match: bool, div_injected: bool, full_response: &[u8]) -> bool {
    target_host_match
        && !div_injected
        && find_subslice(full_response, b"<!DOCTYPE html>").is_some()
        && find_subslice(full_response, b"</body>").is_some()
        && find_subslice(full_response, INJECTION_MARKER).is_none()
}

/// Insert `fragment` before the first `</body>` and rewrite
/// `Content-Length` to match the new body length. Returns `None` if the
/// header is malformed or carries no `Content-Length` line at all — such
/// responses are passed through unmutated (§9 "Chunked bodies").
pub fn inject(full_response: &[u8], fragment: &[u8]) -> Option<Vec<u8>> {
    let header_end = find_header_terminator(full_response)?;
    let (header, body) = full_response.split_at(header_end);

    let insert_at = find_subslice(body, b"</body>")?;
    let mut new_body = Vec::with_capacity(body.len() + fragment.len());
    new_body.extend_from_slice(&body[..insert_at]);
    new_body.extend_from_slice(fragment);
    new_body.extend_from_slice(&body[insert_at..]);

    let new_header = rewrite_content_length(header, new_body.len())?;

    let mut out = Vec::with_capacity(new_header.len() + new_body.len());
    out.extend_from_slice(&new_header);
    out.extend_from_slice(&new_body);
    Some(out)
}

fn rewrite_content_length(header: &[u8], new_body_len: usize) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(header.len() + 16);
    let mut replaced = false;
    for line in split_lines(header) {
        if line.is_empty() {
            continue;
        }
        if strip_prefix_ci(line, b"Content-Length:").is_some() {
            out.extend_from_slice(format!("Content-Length: {new_body_len}").as_bytes());
            replaced = true;
        } else {
            out.extend_from_slice(line);
        }
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    if replaced {
        Some(out)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> Vec<u8> {
        format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{body}", body.len()).into_bytes()
    }

    #[test]
    fn injects_before_body_close_and_fixes_length() {
        let full = response("<!DOCTYPE html><html><body>X</body></html>");
        let fragment = format!("<div>{}</div>", std::str::from_utf8(INJECTION_MARKER).unwrap());
        let out = inject(&full, fragment.as_bytes()).unwrap();

        let header_end = find_header_terminator(&out).unwrap();
        let (header, body) = out.split_at(header_end);
        assert_eq!(
            std::str::from_utf8(body).unwrap(),
            format!("<!DOCTYPE html><html><body>X{fragment}</body></html>")
        );
        assert!(find_subslice(header, format!("Content-Length: {}", body.len()).as_bytes()).is_some());
    }

    #[test]
    fn already_mutated_body_does_not_requalify() {
        let full = response(&format!("<!DOCTYPE html><html><body>X<div>{}</div></body></html>", std::str::from_utf8(INJECTION_MARKER).unwrap()));
        assert!(!should_mutate(true, false, &full));
    }

    #[test]
    fn non_html_body_does_not_qualify() {
        let full = response("{\"json\":true}");
        assert!(!should_mutate(true, false, &full));
    }

    #[test]
    fn zero_length_body_does_not_qualify() {
        let full = response("");
        assert!(!should_mutate(true, false, &full));
    }

    #[test]
    fn missing_content_length_returns_none() {
        let full = b"HTTP/1.1 200 OK\r\n\r\n<!DOCTYPE html><html><body>X</body></html>".to_vec();
        assert!(inject(&full, b"<div></div>").is_none());
    }
}
