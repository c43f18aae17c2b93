//! Small byte-scanning helpers shared by the response cache's `max-age`
//! parser and the HTTP reassembler/mutator's header parsing. Header
//! comparisons across this crate are case-insensitive (§9 "Case-insensitive
//! header parsing").

/// Case-insensitive `haystack.starts_with(prefix)`, returning the remainder
/// of `haystack` past `prefix` on a match.
pub fn strip_prefix_ci<'a>(haystack: &'a [u8], prefix: &[u8]) -> Option<&'a [u8]> {
    if haystack.len() < prefix.len() {
        return None;
    }
    let (head, tail) = haystack.split_at(prefix.len());
    if head.eq_ignore_ascii_case(prefix) {
        Some(tail)
    } else {
        None
    }
}

/// Find the first occurrence of `needle` in `haystack`, case-sensitively.
pub fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Find the first occurrence of `needle` in `haystack`, case-insensitively.
pub fn find_subslice_ci(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

/// Split `buf` into CRLF- or LF-terminated lines, with the terminator
/// stripped from each yielded slice.
pub fn split_lines(buf: &[u8]) -> impl Iterator<Item = &[u8]> {
    buf.split(|&b| b == b'\n').map(trim_cr)
}

fn trim_cr(line: &[u8]) -> &[u8] {
    if let Some((&last, rest)) = line.split_last() {
        if last == b'\r' {
            return rest;
        }
    }
    line
}

/// Parse a leading run of ASCII decimal digits, stopping at the first of
/// CR, LF, SPACE, NUL, or any other non-digit byte (§4.B max-age parsing).
pub fn parse_leading_decimal(buf: &[u8]) -> Option<u64> {
    let mut end = 0;
    while end < buf.len() && buf[end].is_ascii_digit() {
        end += 1;
    }
    if end == 0 {
        return None;
    }
    std::str::from_utf8(&buf[..end]).ok()?.parse().ok()
}

/// Locate CRLFCRLF (or, as a pragmatic fallback some origins send, a bare
/// LFLF) marking the end of an HTTP header block.
pub fn find_header_terminator(buf: &[u8]) -> Option<usize> {
    find_subslice(buf, b"\r\n\r\n")
        .map(|pos| pos + 4)
        .or_else(|| find_subslice(buf, b"\n\n").map(|pos| pos + 2))
}

/// Strip a single leading SPACE, the usual `Name: value` separator left
/// after a case-insensitive prefix match.
pub fn trim_leading_space(buf: &[u8]) -> &[u8] {
    if buf.first() == Some(&b' ') {
        &buf[1..]
    } else {
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_prefix_is_case_insensitive() {
        assert_eq!(
            strip_prefix_ci(b"content-length: 12\r\n", b"Content-Length:"),
            Some(b" 12\r\n".as_slice())
        );
    }

    #[test]
    fn parse_leading_decimal_stops_at_non_digit() {
        assert_eq!(parse_leading_decimal(b"120\r\nFoo"), Some(120));
        assert_eq!(parse_leading_decimal(b"120 extra"), Some(120));
        assert_eq!(parse_leading_decimal(b"abc"), None);
    }

    #[test]
    fn finds_header_terminator_across_split() {
        let buf = b"GET / HTTP/1.1\r\nHost: x\r\n\r\nbody";
        let pos = find_header_terminator(buf).unwrap();
        assert_eq!(&buf[pos..], b"body");
    }
}
