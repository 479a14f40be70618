//! Logging (`SPEC_FULL.md` §4.12, component C12 half).
//!
//! Setup follows `examples/instrumentisto-medea/mock/control-api/src/main.rs`'s
//! `init_logger`: a `slog_term`/`slog_envlogger`/`slog_async` drain chain
//! installed as the global logger via `slog_scope`, with `slog_stdlog`
//! bridging any `log`-crate output from dependencies. A `slog_json` drain is
//! added as a second mode for embedded/production targets that want
//! line-delimited structured logs rather than a human terminal format; the
//! teacher's root `Cargo.toml` already declares `slog-json` as a dependency
//! without using it directly, so this module is its first real call site.

use slog::{o, Drain};
use slog_scope::GlobalLoggerGuard;

/// Output format for the process-wide logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, colorized terminal output.
    Term,
    /// Line-delimited JSON, one object per log record.
    Json,
}

/// Installs the global `slog` logger and bridges the `log` crate into it.
/// Keep the returned guard alive for the process lifetime; dropping it
/// restores the previous (no-op) logger.
#[must_use]
pub fn init(format: LogFormat) -> GlobalLoggerGuard {
    let logger = match format {
        LogFormat::Term => {
            let decorator = slog_term::TermDecorator::new().build();
            let drain = slog_term::FullFormat::new(decorator).build().fuse();
            let drain = slog_envlogger::new(drain).fuse();
            let drain = slog_async::Async::new(drain).build().fuse();
            slog::Logger::root(drain, o!("component" => "kvs-signaling-core"))
        }
        LogFormat::Json => {
            let drain = slog_json::Json::default(std::io::stdout()).fuse();
            let drain = slog_envlogger::new(drain).fuse();
            let drain = slog_async::Async::new(drain).build().fuse();
            slog::Logger::root(drain, o!("component" => "kvs-signaling-core"))
        }
    };

    let guard = slog_scope::set_global_logger(logger);
    let _ = slog_stdlog::init();
    guard
}
