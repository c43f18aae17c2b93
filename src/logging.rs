//! Logging bootstrap.
//!
//! Adapted from the teacher's `writer.rs`: same `env_logger` + custom
//! timestamped formatter, same `RUST_LOG` convention defaulting to `info`.
//! The teacher pipes this to a rotating file because its daemon runs
//! detached; this proxy runs in the foreground of a terminal session, so
//! the sink stays `env_logger`'s default (stderr) instead of carrying over
//! the `BufWriter`-to-file plumbing.

pub fn init() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    env_logger::Builder::new()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{}] {} [{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        })
        .parse_filters(&filter)
        .init();

    log::info!("logging initialized (RUST_LOG={})", filter);
}
