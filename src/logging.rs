use anyhow::{Context, Result};
use chrono::{FixedOffset, Utc};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{LogConfig, LogFormat};

pub const LOG_FILE_NAME: &str = "bookmarks.log";

/// Renders event timestamps in a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct OffsetTime {
    offset: FixedOffset,
}

impl OffsetTime {
    pub fn new(offset: FixedOffset) -> Self {
        OffsetTime { offset }
    }
}

impl FormatTime for OffsetTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Utc::now().with_timezone(&self.offset);
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S%.3f%:z"))
    }
}

fn fmt_layer<S, W>(format: LogFormat, timer: OffsetTime, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + 'static,
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_timer(timer)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Text => layer.boxed(),
    }
}

/// Installs the global subscriber: stderr plus a daily-rotated file under `dir`.
///
/// `RUST_LOG` takes precedence over `cfg.level`. The returned guard flushes
/// the file writer when dropped and must be held for the life of the process.
pub fn init(cfg: &LogConfig, dir: &Path, offset: FixedOffset) -> Result<WorkerGuard> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&cfg.level))?;
    let timer = OffsetTime::new(offset);

    let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer(cfg.format, timer, std::io::stderr, cfg.format == LogFormat::Text))
        .with(fmt_layer(cfg.format, timer, file_writer, false))
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_time_renders_offset() {
        let timer = OffsetTime::new(FixedOffset::east_opt(3 * 3600).unwrap());
        let mut out = String::new();
        timer.format_time(&mut Writer::new(&mut out)).unwrap();
        assert!(out.ends_with("+03:00"), "unexpected timestamp {out}");
    }
}
