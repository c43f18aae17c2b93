//! Byte-for-byte tunnel relay for non-MITM pairs (§4.G).
//!
//! No buffering across readiness events and no inspection: each readiness
//! on either side reads up to 4096 bytes and writes the exact amount to
//! the other side, looping until the read drains to `WouldBlock`.

use std::io::{Read, Write};

use crate::error::ProxyError;

const CHUNK: usize = 4096;

/// Relay result for one readiness event on `handle`'s side of a tunnel
/// pair. `Done` means the read side reached EOF or a hard error and the
/// pair should be torn down (§7 "Short / zero read").
pub enum RelayOutcome {
    Forwarded(usize),
    WouldBlock,
    Done,
}

/// Read up to 4096 bytes from `src` and write the exact amount to `dst`,
/// looping until a read would block. A short write is retried in a loop
/// too — `mio`/`openssl` streams are non-blocking, so a partial write can
/// legitimately happen mid-relay.
pub fn relay<R, W>(src: &mut R, dst: &mut W) -> Result<RelayOutcome, ProxyError>
where
    R: Read,
    W: Write,
{
    let mut buf = [0u8; CHUNK];
    let mut total = 0usize;
    loop {
        match src.read(&mut buf) {
            Ok(0) => {
                return if total > 0 {
                    Ok(RelayOutcome::Forwarded(total))
                } else {
                    Ok(RelayOutcome::Done)
                };
            }
            Ok(n) => {
                write_all_retrying(dst, &buf[..n])?;
                total += n;
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                return if total > 0 {
                    Ok(RelayOutcome::Forwarded(total))
                } else {
                    Ok(RelayOutcome::WouldBlock)
                };
            }
            Err(e) => return Err(ProxyError::Io(e)),
        }
    }
}

fn write_all_retrying<W: Write>(dst: &mut W, mut buf: &[u8]) -> Result<(), ProxyError> {
    while !buf.is_empty() {
        match dst.write(buf) {
            Ok(0) => return Err(ProxyError::Dropped("write returned 0")),
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(ProxyError::Io(e)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn relays_all_bytes_until_eof() {
        let mut src = Cursor::new(b"hello world".to_vec());
        let mut dst = Vec::new();
        let outcome = relay(&mut src, &mut dst).unwrap();
        assert!(matches!(outcome, RelayOutcome::Forwarded(11)));
        assert_eq!(dst, b"hello world");
    }

    #[test]
    fn empty_source_is_done() {
        let mut src = Cursor::new(Vec::new());
        let mut dst = Vec::new();
        assert!(matches!(relay(&mut src, &mut dst).unwrap(), RelayOutcome::Done));
    }
}
