//! Single-threaded, readiness-driven connection multiplexer (§4.D).
//!
//! `mio::Poll` stands in for the original's hand-rolled `select()` active/
//! ready descriptor sets — same readiness-driven shape, backed by the OS
//! epoll/kqueue the original's `select()` itself ultimately rode on. The
//! socket handle IS the `mio::Token` (§3, `net::record::Transport::raw_fd`),
//! so a record's primary handle is simultaneously its table key and its
//! poll registration — no separate handle allocator to keep in sync.

use std::net::{IpAddr, SocketAddr};
use std::os::unix::io::AsRawFd;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use openssl::pkey::{PKey, Private};
use openssl::ssl::{SslConnector, SslContext};
use openssl::x509::X509;

use crate::cache::CacheTable;
use crate::config::{Config, Mode};
use crate::clock::Clock;
use crate::error::ProxyError;
use crate::http::{hint_endpoint, mutator, reassembler};
use crate::llm::{categories::Solution, client::llm_request, orchestrator};
use crate::net::conn_table::ConnTable;
use crate::net::connect_parser::{self, ConnectParseResult, CONNECT_ESTABLISHED_REPLY};
use crate::net::record::{ConnMode, ConnectionRecord, Role, Transport};
use crate::net::tunnel::{self, RelayOutcome};
use crate::tls::{certs, mitm};

const READ_CHUNK: usize = 4096;
const INITIAL_CACHE_SIZE: usize = 200;

pub struct EventLoop {
    config: Config,
    poll: Poll,
    listener: TcpListener,
    listener_token: Token,
    conn_table: ConnTable,
    cache_table: CacheTable,
    clock: Clock,

    root_cert: X509,
    root_key: PKey<Private>,
    server_ctx: SslContext,
    origin_connector: SslConnector,

    solution: Option<Solution>,
}

impl EventLoop {
    /// Bind the listening socket and load everything the loop needs up
    /// front: the root CA (fatal if missing, §7), the shared TLS
    /// contexts, and the categories seed (optional — may be absent on
    /// first run, §6).
    pub fn new(config: Config) -> Result<Self, ProxyError> {
        let (root_cert, root_key) = mitm::load_root_ca(&config.ca_cert_path, &config.ca_key_path)
            .map_err(|e| ProxyError::Fatal(format!("failed to load root CA: {e}")))?;
        let server_ctx = mitm::build_server_ctx(&root_cert, &root_key)?;
        let origin_connector = mitm::build_origin_connector()?;

        let mut listener = TcpListener::bind(config.listen_addr())?;
        let listener_token = Token(listener.as_raw_fd() as usize);

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, listener_token, Interest::READABLE)?;

        let solution = Solution::load(&config.categories_path);

        Ok(EventLoop {
            config,
            poll,
            listener,
            listener_token,
            conn_table: ConnTable::new(),
            cache_table: CacheTable::new(INITIAL_CACHE_SIZE),
            clock: Clock::new(),
            root_cert,
            root_key,
            server_ctx,
            origin_connector,
            solution,
        })
    }

    /// Infinite loop: copy active→ready via `poll.poll`, dispatch the
    /// lowest-numbered ready handle first, repeat (§4.D). Never returns
    /// on success — only a fatal startup error short-circuits (§6).
    pub fn run(mut self) -> Result<(), ProxyError> {
        let mut events = Events::with_capacity(1024);
        loop {
            self.poll.poll(&mut events, None)?;

            let mut tokens: Vec<usize> = events.iter().map(|e| e.token().0).collect();
            tokens.sort_unstable();
            tokens.dedup();

            for token in tokens {
                if token == self.listener_token.0 {
                    self.accept_new();
                } else {
                    self.process(token as i32);
                }
            }
        }
    }

    fn register_stream(&self, stream: &mut TcpStream) {
        let token = Token(stream.as_raw_fd() as usize);
        let _ = self
            .poll
            .registry()
            .register(stream, token, Interest::READABLE | Interest::WRITABLE);
    }

    fn accept_new(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, _addr)) => {
                    self.register_stream(&mut stream);
                    let fd = stream.as_raw_fd();
                    self.conn_table.grow_if_needed();
                    let record = ConnectionRecord::new_client_side(
                        fd,
                        String::new(),
                        0,
                        ConnMode::Tunnel,
                        Transport::Plain(stream),
                        self.clock.now_ns(),
                    );
                    self.conn_table.insert(record);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
        }
    }

    /// `process(handle)` (§4.D): origin readiness forwards origin→client;
    /// otherwise this is client-side traffic, possibly still in the
    /// CONNECT-preamble phase.
    fn process(&mut self, handle: i32) {
        let Some(record) = self.conn_table.remove(handle) else {
            return;
        };

        match record.role {
            Role::OriginSide => self.process_origin_side(record),
            Role::ClientSide if !record.active => self.process_preamble(record),
            Role::ClientSide => self.process_client_side(record),
        }
    }

    // --- CONNECT / regenerate-hint preamble -----------------------------

    fn process_preamble(&mut self, mut record: ConnectionRecord) {
        let mut buf = [0u8; READ_CHUNK];
        match record.transport.try_read(&mut buf) {
            Ok(0) => { /* drop, nothing to reinsert */ }
            Ok(n) => {
                record.header.bytes.extend_from_slice(&buf[..n]);
                match connect_parser::parse(&record.header.bytes) {
                    ConnectParseResult::NeedMore => self.conn_table.insert(record),
                    ConnectParseResult::Malformed => { /* drop client */ }
                    ConnectParseResult::RegenerateHint => self.serve_hint_endpoint(record),
                    ConnectParseResult::Established { host, port, .. } => {
                        self.establish_connect(record, host, port)
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => self.conn_table.insert(record),
            Err(_) => { /* drop client */ }
        }
    }

    fn serve_hint_endpoint(&mut self, mut record: ConnectionRecord) {
        match hint_endpoint::classify(&record.header.bytes) {
            hint_endpoint::RequestKind::Preflight => {
                let reply = hint_endpoint::preflight_reply();
                let _ = write_all(&mut record.transport, &reply);
                record.header.reset();
                self.conn_table.insert(record);
            }
            hint_endpoint::RequestKind::Regenerate => {
                let hints = self.generate_hints(orchestrator::HintLength::Long);
                let reply = hint_endpoint::hints_reply(&hints);
                let _ = write_all(&mut record.transport, &reply);
                // Connection closed after the reply (§4.K); record is not
                // reinserted and its transport drops here.
            }
        }
    }

    fn establish_connect(&mut self, mut record: ConnectionRecord, host: String, port: u16) {
        record.header.reset();
        record.origin_host = host.clone();
        record.origin_port = port;

        if write_all(&mut record.transport, CONNECT_ESTABLISHED_REPLY).is_err() {
            return;
        }

        let tunnel_only =
            self.config.mode == Mode::Tunnel || mitm::bypass_matches(&host, &self.config.bypass_hosts);
        let mode = if tunnel_only { ConnMode::Tunnel } else { ConnMode::Mitm };
        record.mode = mode;

        let Some(mut origin_stream) = self.connect_origin(&host, port) else {
            return;
        };
        self.register_stream(&mut origin_stream);
        let origin_fd = origin_stream.as_raw_fd();

        let client_stream = match std::mem::replace(&mut record.transport, Transport::Closed) {
            Transport::Plain(s) => s,
            other => {
                record.transport = other;
                return;
            }
        };

        match mode {
            ConnMode::Tunnel => {
                record.transport = Transport::Plain(client_stream);
                record.origin_handle = Some(origin_fd);
                record.active = true;

                let origin_record = ConnectionRecord::new_origin_side(
                    origin_fd,
                    record.client_handle.expect("client record has client_handle"),
                    host,
                    port,
                    mode,
                    Transport::Plain(origin_stream),
                    self.clock.now_ns(),
                );
                self.conn_table.insert(record);
                self.conn_table.insert(origin_record);
            }
            ConnMode::Mitm => {
                let (leaf_cert, leaf_key) = match certs::mint_leaf_cert(&host, &self.root_cert, &self.root_key) {
                    Ok(pair) => pair,
                    Err(_) => return,
                };
                let client_transport =
                    match mitm::begin_client_handshake(&self.server_ctx, client_stream, &leaf_cert, &leaf_key) {
                        Ok(t) => t,
                        Err(_) => return,
                    };
                record.transport = client_transport;
                record.leaf_cert = Some(leaf_cert);
                record.leaf_key = Some(leaf_key);
                record.origin_handle = Some(origin_fd);
                record.active = true;

                let origin_transport = match mitm::begin_origin_handshake(&self.origin_connector, origin_stream, &host) {
                    Ok(t) => t,
                    Err(_) => return,
                };
                let origin_record = ConnectionRecord::new_origin_side(
                    origin_fd,
                    record.client_handle.expect("client record has client_handle"),
                    host,
                    port,
                    mode,
                    origin_transport,
                    self.clock.now_ns(),
                );
                self.conn_table.insert(record);
                self.conn_table.insert(origin_record);
            }
        }
    }

    fn connect_origin(&self, host: &str, port: u16) -> Option<TcpStream> {
        let ip: IpAddr = host
            .parse()
            .ok()
            .or_else(|| dns_lookup::lookup_host(host).ok().and_then(|v| v.into_iter().next()))?;
        let addr = SocketAddr::new(ip, port);
        TcpStream::connect(addr).ok()
    }

    // --- established connections -----------------------------------------

    fn process_client_side(&mut self, record: ConnectionRecord) {
        self.process_half(record, true);
    }

    fn process_origin_side(&mut self, record: ConnectionRecord) {
        self.process_half(record, false);
    }

    /// Shared driver for an already-established half of a pair.
    /// `is_client` picks which direction readiness fired on; the peer
    /// record (if any) is pulled out of the table for the duration.
    fn process_half(&mut self, mut record: ConnectionRecord, is_client: bool) {
        if record.transport.is_handshaking() {
            self.drive_handshake(&mut record, is_client);
            self.conn_table.insert(record);
            return;
        }

        let peer_handle = record.partner_handle();
        let mut peer = peer_handle.and_then(|h| self.conn_table.remove(h));

        match record.mode {
            ConnMode::Tunnel => self.pump_tunnel(&mut record, peer.as_mut()),
            ConnMode::Mitm => self.pump_mitm(&mut record, peer.as_mut(), is_client),
        }

        if !record.transport.is_closed() {
            self.conn_table.insert(record);
        }
        if let Some(peer) = peer {
            if !peer.transport.is_closed() {
                self.conn_table.insert(peer);
            }
        }
    }

    fn drive_handshake(&self, record: &mut ConnectionRecord, is_client: bool) {
        let transport = std::mem::replace(&mut record.transport, Transport::Closed);
        let result = match (is_client, transport) {
            (true, Transport::ClientHandshaking(mid)) => mitm::continue_client_handshake(mid),
            (false, Transport::OriginHandshaking(mid)) => mitm::continue_origin_handshake(mid),
            (_, other) => Ok(other),
        };
        record.transport = result.unwrap_or(Transport::Closed);
    }

    fn pump_tunnel(&self, record: &mut ConnectionRecord, peer: Option<&mut ConnectionRecord>) {
        let Some(peer) = peer else {
            record.transport = Transport::Closed;
            return;
        };
        match tunnel::relay(&mut record.transport, &mut peer.transport) {
            Ok(RelayOutcome::Forwarded(_)) | Ok(RelayOutcome::WouldBlock) => {}
            Ok(RelayOutcome::Done) | Err(_) => {
                record.transport = Transport::Closed;
                peer.transport = Transport::Closed;
            }
        }
    }

    fn pump_mitm(&mut self, record: &mut ConnectionRecord, peer: Option<&mut ConnectionRecord>, is_client: bool) {
        let Some(peer) = peer else {
            record.transport = Transport::Closed;
            return;
        };

        let mut buf = [0u8; READ_CHUNK];
        let n = match record.transport.try_read(&mut buf) {
            Ok(0) => {
                record.transport = Transport::Closed;
                peer.transport = Transport::Closed;
                return;
            }
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return,
            Err(_) => {
                record.transport = Transport::Closed;
                peer.transport = Transport::Closed;
                return;
            }
        };

        if is_client {
            self.forward_client_to_origin(record, peer, &buf[..n]);
        } else {
            self.forward_origin_to_client(record, peer, &buf[..n]);
        }
    }

    fn forward_client_to_origin(&self, record: &mut ConnectionRecord, peer: &mut ConnectionRecord, chunk: &[u8]) {
        let header_was_complete = record.header.is_complete();
        let progress = reassembler::ingest(&mut record.header, &mut record.body, &mut record.chunked, chunk);
        match progress {
            reassembler::Progress::HeaderIncomplete | reassembler::Progress::BodyInProgress => {}
            reassembler::Progress::PassThrough => {
                if header_was_complete {
                    let _ = write_all(&mut peer.transport, chunk);
                } else {
                    // The header just finished assembling on this read with
                    // no usable declared length (§9 "Chunked bodies") — still
                    // strip Accept-Encoding before the first byte leaves for
                    // the origin, same as the BodyComplete path (§4.H).
                    let stripped_header = reassembler::strip_accept_encoding(&record.header.bytes);
                    let mut out = stripped_header;
                    out.extend_from_slice(&record.body.bytes);
                    let _ = write_all(&mut peer.transport, &out);
                    record.body.bytes.clear();
                    record.body.filled = 0;
                }
            }
            reassembler::Progress::BodyComplete => {
                if let Some(guess) = reassembler::sniff_guess(&record.body.bytes) {
                    record.guess = Some(guess);
                }
                let stripped_header = reassembler::strip_accept_encoding(&record.header.bytes);
                let mut out = stripped_header;
                out.extend_from_slice(&record.body.bytes);
                let _ = write_all(&mut peer.transport, &out);
                record.header.reset();
                record.body.reset();
            }
        }
    }

    fn forward_origin_to_client(&mut self, record: &mut ConnectionRecord, peer: &mut ConnectionRecord, chunk: &[u8]) {
        let progress = reassembler::ingest(&mut record.header, &mut record.body, &mut record.chunked, chunk);
        match progress {
            reassembler::Progress::HeaderIncomplete | reassembler::Progress::BodyInProgress => {}
            reassembler::Progress::PassThrough => {
                let _ = write_all(&mut peer.transport, chunk);
            }
            reassembler::Progress::BodyComplete => {
                let mut full = record.header.bytes.clone();
                full.extend_from_slice(&record.body.bytes);
                let header_len = record.header.bytes.len();

                let target_match = record.origin_host == self.config.target_host;
                if mutator::should_mutate(target_match, peer.div_injected, &full) {
                    let hints = self.generate_hints(orchestrator::HintLength::Short);
                    let fragment = crate::llm::overlay::render(&hints, self.config.listen_port);
                    if let Some(mutated) = mutator::inject(&full, fragment.as_bytes()) {
                        full = mutated;
                        peer.div_injected = true;
                    }
                } else if !target_match {
                    // Best-effort cache write for non-target hosts. The
                    // key is host:port only — this crate doesn't track
                    // per-request paths, so only the coarse single-entry
                    // cache operations are exercised on the live path
                    // (see DESIGN.md).
                    let cache_key = format!("{}:{}", record.origin_host, record.origin_port);
                    let _ = self
                        .cache_table
                        .put(cache_key, record.origin_port, full.clone(), header_len);
                }

                let _ = write_all(&mut peer.transport, &full);
                record.header.reset();
                record.body.reset();
            }
        }
    }

    /// Load (or re-scrape) the categories solution and run the LLM
    /// orchestrator once (§4.J). Malformed responses yield empty hints
    /// rather than failing the caller (§7). `length` picks between the
    /// original's two prompt presets: `Short` for first-generation
    /// (compact panel, §4.J), `Long` for a `regenerate-hint` request
    /// (expanded panel, a second, more detailed look).
    fn generate_hints(&mut self, length: orchestrator::HintLength) -> [String; 4] {
        if self.solution.is_none() {
            self.solution = Solution::load(&self.config.categories_path);
        }
        let Some(solution) = self.solution.clone() else {
            return Default::default();
        };
        let system = orchestrator::system_prompt(length);
        let query = orchestrator::build_query(&solution);
        match llm_request(
            &self.config.llm_endpoint,
            &self.config.llm_api_key,
            &self.config.llm_model,
            &system,
            &query,
        ) {
            Ok(text) => orchestrator::parse_response(&text),
            Err(_) => Default::default(),
        }
    }
}

fn write_all(transport: &mut Transport, mut buf: &[u8]) -> std::io::Result<()> {
    while !buf.is_empty() {
        match transport.try_write(buf) {
            Ok(0) => return Err(std::io::Error::from(std::io::ErrorKind::WriteZero)),
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
