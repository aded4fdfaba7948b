use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LogConfig;

/// Installs stdout logging plus a daily rolling `app.log` under `cfg.dir`.
/// Keep the guard alive for the life of the process or buffered file lines are lost.
pub fn init(cfg: &LogConfig) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(&cfg.dir)
        .with_context(|| format!("create log directory {}", cfg.dir))?;

    let file_appender = tracing_appender::rolling::daily(&cfg.dir, "app.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stdout = if cfg.json {
        fmt::layer().with_target(false).json().boxed()
    } else {
        fmt::layer().boxed()
    };
    let file = fmt::layer().with_writer(file_writer).with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::new(&cfg.filter))
        .with(stdout)
        .with(file)
        .try_init()
        .context("install tracing subscriber")?;

    Ok(guard)
}
