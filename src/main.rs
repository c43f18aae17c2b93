//! Entry point (§6 "CLI contract").
//!
//! `hintproxy <port> --mode=<tunnel|mitm>` parses its arguments, initializes
//! logging, builds the event loop, and runs it forever. There is no
//! success exit path — the process only ever returns via a fatal startup
//! error or an external signal, matching the teacher's `main.rs` shape for
//! its own long-running gateway process.

mod byteutil;
mod cache;
mod clock;
mod config;
mod error;
mod hash;
mod http;
mod llm;
mod logging;
mod net;
mod tls;

use config::Config;
use net::event_loop::EventLoop;

fn main() {
    logging::init();

    let config = match Config::from_args(std::env::args()) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("usage: hintproxy <port> --mode=<tunnel|mitm>");
            eprintln!("error: {message}");
            std::process::exit(1);
        }
    };

    log::info!(
        "starting on port {} in {:?} mode, target host {}",
        config.listen_port,
        config.mode,
        config.target_host
    );

    let event_loop = match EventLoop::new(config) {
        Ok(event_loop) => event_loop,
        Err(err) => {
            log::error!("fatal startup error: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = event_loop.run() {
        log::error!("event loop terminated: {err}");
        std::process::exit(1);
    }
}
