//! Connection record data model (§3 "Connection record").
//!
//! A client↔origin pair is modeled as two independent records that refer to
//! each other by socket handle rather than by direct reference — the same
//! shape the teacher's paired-struct proxy code uses handles/ids for
//! instead of raw pointers, and exactly what §9 "Cyclic references between
//! paired records" mandates.
//!
//! The spec names three separate transport-holding fields per record
//! (`tls_client_session`, `tls_origin_session`, and an implicit raw socket
//! during the CONNECT/tunnel phases). Because at most one of those is ever
//! occupied for a given record at a time, this implementation collapses
//! them into a single tagged union, [`Transport`] — it preserves the
//! ownership invariant from §8 property 2 (at most one owning TLS session
//! per side) exactly, while avoiding three parallel `Option` fields that
//! would need to be kept manually mutually exclusive.

use std::io::{Read, Write};

use mio::net::TcpStream;
use openssl::ssl::{MidHandshakeSslStream, SslStream};
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;

/// Which half of a client↔origin pair this record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    ClientSide,
    OriginSide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnMode {
    Tunnel,
    Mitm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    None,
    Br,
    Gzip,
    Other,
}

/// The transport this record owns. Exactly one non-`Closed` variant at a
/// time; closing a record frees exactly the resources this enum holds
/// (§8 property 2).
pub enum Transport {
    /// Before a mode decision is made, or for the lifetime of a tunnel-mode
    /// pair: a plain, non-blocking TCP stream.
    Plain(TcpStream),
    /// Client-facing TLS handshake in progress (`WANT_READ`/`WANT_WRITE`).
    ClientHandshaking(MidHandshakeSslStream<TcpStream>),
    /// Client-facing TLS session, fully established.
    ClientEstablished(SslStream<TcpStream>),
    /// Origin-facing TLS handshake in progress.
    OriginHandshaking(MidHandshakeSslStream<TcpStream>),
    /// Origin-facing TLS session, fully established.
    OriginEstablished(SslStream<TcpStream>),
    /// Torn down; retained only long enough to be removed from the table.
    Closed,
}

impl Transport {
    pub fn is_closed(&self) -> bool {
        matches!(self, Transport::Closed)
    }

    /// True while a handshake is in progress on either side — the event
    /// loop must drive `tls::mitm::continue_*` on readiness rather than
    /// attempt an application-data read/write (§4.D).
    pub fn is_handshaking(&self) -> bool {
        matches!(self, Transport::ClientHandshaking(_) | Transport::OriginHandshaking(_))
    }

    /// The raw descriptor backing this transport, used as the `mio`
    /// registration token (§4.C). `None` only for `Closed`.
    pub fn raw_fd(&self) -> Option<i32> {
        use std::os::unix::io::AsRawFd;
        match self {
            Transport::Plain(s) => Some(s.as_raw_fd()),
            Transport::ClientHandshaking(s) => Some(s.get_ref().as_raw_fd()),
            Transport::ClientEstablished(s) => Some(s.get_ref().as_raw_fd()),
            Transport::OriginHandshaking(s) => Some(s.get_ref().as_raw_fd()),
            Transport::OriginEstablished(s) => Some(s.get_ref().as_raw_fd()),
            Transport::Closed => None,
        }
    }

    /// Read application data. Only meaningful for `Plain` and the two
    /// `*Established` variants; any other state is reported as
    /// `WouldBlock` since there is nothing to read from a handshake in
    /// progress or a closed record.
    pub fn try_read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Transport::Plain(s) => s.read(buf),
            Transport::ClientEstablished(s) => s.read(buf),
            Transport::OriginEstablished(s) => s.read(buf),
            _ => Err(std::io::Error::from(std::io::ErrorKind::WouldBlock)),
        }
    }

    pub fn try_write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Transport::Plain(s) => s.write(buf),
            Transport::ClientEstablished(s) => s.write(buf),
            Transport::OriginEstablished(s) => s.write(buf),
            _ => Err(std::io::Error::from(std::io::ErrorKind::WouldBlock)),
        }
    }
}

/// Lets a `Transport` stand in directly for the generic `R`/`W` halves
/// `net::tunnel::relay` is written against.
impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.try_read(buf)
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.try_write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Incremental header accumulator (§3 "Header accumulator").
#[derive(Debug, Default)]
pub struct HeaderAccumulator {
    pub bytes: Vec<u8>,
    pub filled: usize,
    /// -1 until CRLFCRLF is observed, per the invariant in §3.
    pub complete_len: i64,
}

impl HeaderAccumulator {
    pub fn new() -> Self {
        HeaderAccumulator {
            bytes: Vec::new(),
            filled: 0,
            complete_len: -1,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete_len >= 0
    }

    pub fn reset(&mut self) {
        self.bytes.clear();
        self.filled = 0;
        self.complete_len = -1;
    }
}

/// Incremental body accumulator (§3 "Body accumulator").
#[derive(Debug, Default)]
pub struct BodyAccumulator {
    pub bytes: Vec<u8>,
    pub filled: usize,
    /// -1 when `Content-Length` is unknown.
    pub declared_len: i64,
}

impl BodyAccumulator {
    pub fn new() -> Self {
        BodyAccumulator {
            bytes: Vec::new(),
            filled: 0,
            declared_len: -1,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.declared_len >= 0 && self.filled as i64 == self.declared_len
    }

    pub fn reset(&mut self) {
        self.bytes.clear();
        self.filled = 0;
        self.declared_len = -1;
    }
}

pub struct ConnectionRecord {
    pub role: Role,
    pub mode: ConnMode,

    pub client_handle: Option<i32>,
    pub origin_handle: Option<i32>,

    pub origin_host: String,
    pub origin_port: u16,

    pub transport: Transport,

    /// Owned by the client-side record only (§3 invariant).
    pub leaf_cert: Option<X509>,
    pub leaf_key: Option<PKey<Private>>,

    pub header: HeaderAccumulator,
    pub body: BodyAccumulator,

    pub content_encoding: ContentEncoding,
    pub chunked: bool,
    pub div_injected: bool,

    pub active: bool,
    pub added_at: u64,

    /// Captured `r: fail` .. `d: null` bytes from a client request body
    /// (§4.H "Guess sniffing"); consumed by the LLM orchestrator as
    /// optional context.
    pub guess: Option<Vec<u8>>,
}

impl ConnectionRecord {
    pub fn new_client_side(
        client_handle: i32,
        origin_host: String,
        origin_port: u16,
        mode: ConnMode,
        transport: Transport,
        added_at: u64,
    ) -> Self {
        ConnectionRecord {
            role: Role::ClientSide,
            mode,
            client_handle: Some(client_handle),
            origin_handle: None,
            origin_host,
            origin_port,
            transport,
            leaf_cert: None,
            leaf_key: None,
            header: HeaderAccumulator::new(),
            body: BodyAccumulator::new(),
            content_encoding: ContentEncoding::None,
            chunked: false,
            div_injected: false,
            active: false,
            added_at,
            guess: None,
        }
    }

    pub fn new_origin_side(
        origin_handle: i32,
        client_handle: i32,
        origin_host: String,
        origin_port: u16,
        mode: ConnMode,
        transport: Transport,
        added_at: u64,
    ) -> Self {
        ConnectionRecord {
            role: Role::OriginSide,
            mode,
            client_handle: Some(client_handle),
            origin_handle: Some(origin_handle),
            origin_host,
            origin_port,
            transport,
            leaf_cert: None,
            leaf_key: None,
            header: HeaderAccumulator::new(),
            body: BodyAccumulator::new(),
            content_encoding: ContentEncoding::None,
            chunked: false,
            div_injected: false,
            active: true,
            added_at,
            guess: None,
        }
    }

    /// The handle this record is registered under in the event loop / table
    /// (§3 invariant: "A record is in the table iff its primary handle ...
    /// is registered with the event loop").
    pub fn primary_handle(&self) -> i32 {
        match self.role {
            Role::ClientSide => self.client_handle.expect("client_side record without client_handle"),
            Role::OriginSide => self.origin_handle.expect("origin_side record without origin_handle"),
        }
    }

    /// The handle of this record's partner, if any.
    pub fn partner_handle(&self) -> Option<i32> {
        match self.role {
            Role::ClientSide => self.origin_handle,
            Role::OriginSide => self.client_handle,
        }
    }
}
