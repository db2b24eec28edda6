//! Tracing subscriber setup for the `mocked-sriov` binary.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// With `log_file` set, output goes to that file through a non-blocking
/// writer and the returned guard must be held until exit to flush it.
/// Otherwise output goes to stderr.
pub fn init(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("log file `{}` has no file name", path.display()))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            builder
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))
                .context("installing tracing subscriber")?;
            Ok(Some(guard))
        }
        None => {
            builder
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))
                .context("installing tracing subscriber")?;
            Ok(None)
        }
    }
}
