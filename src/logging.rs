//! Logging initialization on top of `tracing`.

use std::io;

use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::time::ChronoUtc, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const LOG_TARGET: &str = "file_gateway";

/// Keeps the non-blocking file writer alive; drop it only at process
/// exit or buffered log lines are lost.
pub struct LogGuard {
    _file_writer: Option<WorkerGuard>,
}

/// Install the global subscriber: a console layer, plus a daily-rolling
/// file layer under `log_dir` when one is configured.
///
/// `level` applies to this crate's target only; a `RUST_LOG` environment
/// variable overrides it entirely, and an unrecognized level falls back
/// to `info`. Repeated initialization is a no-op, so tests may call this
/// freely.
pub fn init_logging(level: &str, log_dir: Option<&str>) -> io::Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("{LOG_TARGET}={level}")))
        .unwrap_or_else(|_| EnvFilter::new(format!("{LOG_TARGET}=info")));

    let timer = || ChronoUtc::new(TIMESTAMP_FORMAT.to_string());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_timer(timer())
        .with_target(false)
        .boxed();
    let mut layers = vec![console_layer];

    let mut file_writer = None;
    if let Some(dir) = log_dir {
        std::fs::create_dir_all(dir)?;
        let (writer, guard) =
            tracing_appender::non_blocking(rolling::daily(dir, "file-gateway.log"));
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_timer(timer())
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
        file_writer = Some(guard);
    }

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init();

    Ok(LogGuard {
        _file_writer: file_writer,
    })
}
