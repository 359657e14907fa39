use anyhow::{Context, Result};
use ipcsniff_common::workdir::SnifferWorkDir;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::SystemTime},
    prelude::*,
    EnvFilter,
};

pub fn setup_logging(work_dir: &SnifferWorkDir, log_level: &str) -> Result<()> {
    work_dir.init()?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let file_name = work_dir
        .log_file
        .file_name()
        .context("Log file path has no file name")?;
    let file_appender = RollingFileAppender::new(Rotation::NEVER, &work_dir.path, file_name);

    let file_layer = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_timer(SystemTime)
        .with_writer(file_appender);

    let subscriber = tracing_subscriber::registry().with(filter).with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    tracing::info!(
        "Logging system initialized. Writing to {}",
        work_dir.log_file.display()
    );

    Ok(())
}
