//! TLS MITM engine: shared client-facing context, per-connection leaf
//! installation, and the origin-facing connector (§4.F).
//!
//! The non-blocking handshake dance (`accept`/`connect` returning
//! `HandshakeError::WouldBlock` with a resumable `MidHandshakeSslStream`)
//! is the standard `openssl` crate idiom for driving TLS off a readiness
//! loop instead of a blocking call — it is what lets `net::event_loop`
//! treat `WANT_READ`/`WANT_WRITE` as "no-op, wait for next readiness"
//! exactly as §5 requires.

use mio::net::TcpStream;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{
    HandshakeError, MidHandshakeSslStream, Ssl, SslConnector, SslContext, SslContextBuilder,
    SslMethod, SslStream, SslVerifyMode,
};
use openssl::x509::X509;

use crate::error::TlsError;
use crate::net::record::Transport;

pub fn load_root_ca(cert_path: &str, key_path: &str) -> Result<(X509, PKey<Private>), TlsError> {
    let cert_bytes = std::fs::read(cert_path).map_err(|e| TlsError::RootCaLoad {
        path: cert_path.to_string(),
        source: e,
    })?;
    let key_bytes = std::fs::read(key_path).map_err(|e| TlsError::RootCaLoad {
        path: key_path.to_string(),
        source: e,
    })?;
    let cert = X509::from_pem(&cert_bytes)?;
    let key = PKey::private_key_from_pem(&key_bytes)?;
    Ok((cert, key))
}

/// The shared client-facing TLS context: one per proxy instance,
/// configured once with the root CA cert/key as its default identity and a
/// platform-default cipher list (§4.F "Server-side context").
pub fn build_server_ctx(root_cert: &X509, root_key: &PKey<Private>) -> Result<SslContext, TlsError> {
    let mut builder = SslContextBuilder::new(SslMethod::tls_server())?;
    builder.set_certificate(root_cert)?;
    builder.set_private_key(root_key)?;
    builder.set_cipher_list("DEFAULT")?;
    Ok(builder.build())
}

/// Origin-facing connector, also a single shared instance. Peer
/// verification is left off: the proxy already broke end-to-end trust by
/// MITM-ing the client leg, and an unverified upstream leg matches the
/// original submission's behavior (it never calls `SSL_CTX_set_verify`).
pub fn build_origin_connector() -> Result<SslConnector, TlsError> {
    let mut builder = SslConnector::builder(SslMethod::tls())?;
    builder.set_verify(SslVerifyMode::NONE);
    Ok(builder.build())
}

/// Start (or resume) the client-facing handshake with a freshly minted
/// leaf certificate installed on the per-connection `Ssl` object,
/// overriding the shared context's default identity (§4.F
/// "Client-side handshake").
pub fn begin_client_handshake(
    ctx: &SslContext,
    stream: TcpStream,
    leaf_cert: &X509,
    leaf_key: &PKey<Private>,
) -> Result<Transport, TlsError> {
    let mut ssl = Ssl::new(ctx)?;
    ssl.set_certificate(leaf_cert)?;
    ssl.set_private_key(leaf_key)?;
    finish_accept(ssl.accept(stream))
}

pub fn continue_client_handshake(
    mid: MidHandshakeSslStream<TcpStream>,
) -> Result<Transport, TlsError> {
    finish_accept(mid.handshake())
}

fn finish_accept(
    result: Result<SslStream<TcpStream>, HandshakeError<TcpStream>>,
) -> Result<Transport, TlsError> {
    match result {
        Ok(stream) => Ok(Transport::ClientEstablished(stream)),
        Err(HandshakeError::WouldBlock(mid)) => Ok(Transport::ClientHandshaking(mid)),
        Err(e) => Err(TlsError::HandshakeFailed(e.to_string())),
    }
}

/// Start (or resume) the origin-facing handshake, with SNI set to the
/// `CONNECT` host (§4.F "Origin-side handshake").
pub fn begin_origin_handshake(
    connector: &SslConnector,
    stream: TcpStream,
    host: &str,
) -> Result<Transport, TlsError> {
    let config = connector.configure()?;
    let ssl = config.into_ssl(host)?;
    finish_connect(ssl.connect(stream))
}

pub fn continue_origin_handshake(
    mid: MidHandshakeSslStream<TcpStream>,
) -> Result<Transport, TlsError> {
    finish_connect(mid.handshake())
}

fn finish_connect(
    result: Result<SslStream<TcpStream>, HandshakeError<TcpStream>>,
) -> Result<Transport, TlsError> {
    match result {
        Ok(stream) => Ok(Transport::OriginEstablished(stream)),
        Err(HandshakeError::WouldBlock(mid)) => Ok(Transport::OriginHandshaking(mid)),
        Err(e) => Err(TlsError::HandshakeFailed(e.to_string())),
    }
}

/// Bypass heuristic (§4.F, §9): CONNECT hosts containing any of these
/// substrings downgrade to tunnel mode because leaf-minting breaks pinned
/// clients. Kept configurable via `Config::bypass_hosts`.
pub fn bypass_matches(host: &str, bypass_hosts: &[String]) -> bool {
    bypass_hosts.iter().any(|needle| host.contains(needle.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bypass_matches_known_substrings() {
        let list = vec!["icloud".to_string(), "play".to_string(), "api".to_string()];
        assert!(bypass_matches("gateway.icloud.com", &list));
        assert!(bypass_matches("play.google.com", &list));
        assert!(bypass_matches("api.example.com", &list));
        assert!(!bypass_matches("www.nytimes.com", &list));
    }
}
