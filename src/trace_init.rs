//! Tracing bootstrap for processes embedding the decoder.
//!
//! With the `trace` feature enabled, `init_tracing` installs a global
//! subscriber that writes JSON events to a file in the given directory.
//! The filter and file name come from the config's `[trace]` section;
//! `RUST_LOG` overrides the configured filter. The caller holds the
//! returned guard for as long as events should be flushed — dropping it
//! flushes pending events and stops the writer thread. Without the
//! feature, or when a subscriber is already installed, the call returns
//! `None` and changes nothing.

use std::path::Path;

use crate::settings::TraceSettings;

/// Keeps the non-blocking log writer alive.
#[cfg(feature = "trace")]
pub struct TraceGuard {
    _worker: tracing_appender::non_blocking::WorkerGuard,
}

#[cfg(not(feature = "trace"))]
pub struct TraceGuard;

#[cfg(feature = "trace")]
pub fn init_tracing(settings: &TraceSettings, log_dir: &Path) -> Option<TraceGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let appender = tracing_appender::rolling::never(log_dir, &settings.file);
    let (writer, worker) = tracing_appender::non_blocking(appender);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_writer(writer),
        )
        .try_init()
        .ok()?;

    Some(TraceGuard { _worker: worker })
}

#[cfg(not(feature = "trace"))]
pub fn init_tracing(_settings: &TraceSettings, _log_dir: &Path) -> Option<TraceGuard> {
    None
}
