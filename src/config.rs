//! Startup configuration.
//!
//! The teacher's `config.rs` uses `mini-config` for a live-reloadable
//! key/value routing table because its gateway takes configuration updates
//! over a control protocol while running. This proxy has no control plane:
//! everything is decided once, from CLI args and a handful of environment
//! variables, at process start (§6). `mini-config` has no remaining use
//! here and is dropped (see DESIGN.md); `serde`/`serde_json` stay, matching
//! the teacher's `#[derive(Serialize, Deserialize)]` style for the structs
//! that do need to round-trip (cache entries, categories).

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Operating mode selected on the command line (§1, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Byte-for-byte tunnel relay, no decryption (§4.G).
    Tunnel,
    /// Full TLS termination with HTML mutation for the target host (§4.F-J).
    Mitm,
}

/// Default bypass substrings (§4.F "Bypass heuristic", §9).
pub const DEFAULT_BYPASS_HOSTS: &[&str] = &["icloud", "play", "api"];

/// Default target host the mutator operates on (§4.H).
pub const DEFAULT_TARGET_HOST: &str = "www.nytimes.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_port: u16,
    pub mode: Mode,

    /// Host whose HTML responses get the hint overlay injected.
    pub target_host: String,

    /// Substrings that force tunnel mode for a given CONNECT host even when
    /// running in MITM mode (configurable denylist, §9).
    pub bypass_hosts: Vec<String>,

    pub ca_cert_path: String,
    pub ca_key_path: String,
    pub categories_path: String,

    pub llm_endpoint: String,
    pub llm_api_key: String,
    pub llm_model: String,
}

impl Config {
    /// The address the hint-regeneration endpoint (and the CONNECT accept
    /// loop) listen on.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.listen_port))
    }

    /// Parse `proxy <port> --mode=<tunnel|mitm>`, pulling the remaining
    /// (operationally sensitive) settings from the environment rather than
    /// the command line, matching §6's stated CLI surface exactly while
    /// still being configurable in a deployment.
    pub fn from_args<I: Iterator<Item = String>>(mut args: I) -> Result<Config, String> {
        args.next(); // argv[0]

        let port_arg = args.next().ok_or("missing <port> argument")?;
        let listen_port: u16 = port_arg
            .parse()
            .map_err(|_| format!("invalid port: {port_arg}"))?;

        let mode_arg = args.next().ok_or("missing --mode=<tunnel|mitm> argument")?;
        let mode = match mode_arg
            .strip_prefix("--mode=")
            .ok_or_else(|| format!("invalid argument: {mode_arg}"))?
        {
            "tunnel" => Mode::Tunnel,
            "MITM" | "mitm" => Mode::Mitm,
            other => return Err(format!("unknown mode: {other}")),
        };

        let bypass_hosts = std::env::var("HINTPROXY_BYPASS_HOSTS")
            .ok()
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|| {
                DEFAULT_BYPASS_HOSTS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        Ok(Config {
            listen_port,
            mode,
            target_host: std::env::var("HINTPROXY_TARGET_HOST")
                .unwrap_or_else(|_| DEFAULT_TARGET_HOST.to_string()),
            bypass_hosts,
            ca_cert_path: std::env::var("HINTPROXY_CA_CERT")
                .unwrap_or_else(|_| "certs/ca-cert.pem".to_string()),
            ca_key_path: std::env::var("HINTPROXY_CA_KEY")
                .unwrap_or_else(|_| "certs/ca-key.pem".to_string()),
            categories_path: std::env::var("HINTPROXY_CATEGORIES")
                .unwrap_or_else(|_| "categories.txt".to_string()),
            llm_endpoint: std::env::var("HINTPROXY_LLM_ENDPOINT")
                .unwrap_or_else(|_| "https://ai-proxy.sandbox.localhost/dev".to_string()),
            llm_api_key: std::env::var("HINTPROXY_LLM_API_KEY").unwrap_or_default(),
            llm_model: "4o-mini".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tunnel_mode() {
        let args = vec!["proxy".to_string(), "8080".to_string(), "--mode=tunnel".to_string()];
        let cfg = Config::from_args(args.into_iter()).unwrap();
        assert_eq!(cfg.listen_port, 8080);
        assert_eq!(cfg.mode, Mode::Tunnel);
    }

    #[test]
    fn parses_mitm_mode() {
        let args = vec!["proxy".to_string(), "9090".to_string(), "--mode=MITM".to_string()];
        let cfg = Config::from_args(args.into_iter()).unwrap();
        assert_eq!(cfg.mode, Mode::Mitm);
    }

    #[test]
    fn rejects_missing_port() {
        let args = vec!["proxy".to_string()];
        assert!(Config::from_args(args.into_iter()).is_err());
    }

    #[test]
    fn rejects_bad_mode() {
        let args = vec!["proxy".to_string(), "80".to_string(), "--mode=bogus".to_string()];
        assert!(Config::from_args(args.into_iter()).is_err());
    }
}
