use once_cell::sync::OnceCell;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Initialise logging. With `debug` the level defaults to `debug` and can be
/// overridden through `RUST_LOG`; otherwise it is fixed at `info`.
/// When `log_file` is given, output is also appended to that file.
/// Calling this again after a subscriber is installed does nothing.
pub fn init(debug: bool, log_file: Option<PathBuf>) {
    // Ignore `RUST_LOG` unless debug logging was asked for, so a stray
    // variable in the user's environment cannot turn on verbose output.
    let level = if debug { "debug" } else { "info" };
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let file_layer = log_file.and_then(|path| match file_writer(&path) {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().with_writer(writer).with_ansi(false))
        }
        Err(e) => {
            eprintln!("failed to open log file {}: {e}", path.display());
            None
        }
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init();
}

fn file_writer(path: &std::path::Path) -> anyhow::Result<RollingFileAppender> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("log path has no file name"))?;
    std::fs::create_dir_all(&dir)?;
    Ok(RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name.to_string_lossy().to_string())
        .build(dir)?)
}
