use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging for the CLI.
///
/// `RUST_LOG` takes precedence; otherwise `default_directive` (usually derived
/// from the configured log level) is used. When `log_dir` is given and
/// writable, a daily-rolling file layer is added next to the console layer.
pub fn init_logging(
    log_dir: Option<&Path>,
    service_name: &str,
    default_directive: &str,
) -> Result<(), anyhow::Error> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let writable_dir = log_dir.filter(|dir| can_write(dir));

    // Rotation runs before the appender reopens the file; its outcome is
    // reported once the subscriber is installed.
    let rotation = writable_dir.map(|dir| rotate_logs_on_startup(dir, service_name));

    let file_writer = writable_dir.map(|dir| {
        non_blocking(tracing_appender::rolling::daily(
            dir,
            format!("{service_name}.log"),
        ))
    });
    let (file_layer, guard_file) = match file_writer {
        Some((writer, guard)) => (
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true)
                    .with_line_number(true),
            ),
            Some(guard),
        ),
        None => (None, None),
    };

    // Logs go to stderr so JSON printed on stdout stays clean
    let (non_blocking_stderr, guard_stderr) = non_blocking(std::io::stderr());
    let console_layer = fmt::layer()
        .with_writer(non_blocking_stderr)
        .with_ansi(true)
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    // Guards must outlive the process for buffered lines to flush
    if let Some(guard) = guard_file {
        std::mem::forget(guard);
    }
    std::mem::forget(guard_stderr);

    if let Some(dir) = writable_dir {
        info!(
            "Logging initialized - logs will be written to {}/{service_name}.log",
            dir.display()
        );
    }
    if let Some(result) = rotation {
        report_rotation(result);
    }

    Ok(())
}

fn report_rotation(result: Result<Option<PathBuf>, anyhow::Error>) {
    match result {
        Ok(Some(backup)) => info!("Previous log file backed up to: {}", backup.display()),
        Ok(None) => {}
        Err(err) => warn!("Failed to rotate previous log file: {err:#}"),
    }
}

fn can_write(dir: &Path) -> bool {
    let probe = dir.join(".test_write");
    std::fs::create_dir_all(dir)
        .and_then(|_| std::fs::File::create(&probe))
        .map(|_| std::fs::remove_file(&probe))
        .is_ok()
}

/// Moves an existing `<service>.log` aside with a timestamp suffix and
/// returns the backup path.
pub fn rotate_logs_on_startup(
    log_dir: &Path,
    service_name: &str,
) -> Result<Option<PathBuf>, anyhow::Error> {
    let log_path = log_dir.join(format!("{service_name}.log"));

    if !log_path.exists() {
        return Ok(None);
    }

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let backup = log_dir.join(format!("{service_name}.{timestamp}.log"));
    std::fs::rename(&log_path, &backup)?;
    Ok(Some(backup))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_moves_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("quantive-okr.log");
        std::fs::write(&log, "old").unwrap();

        let backup = rotate_logs_on_startup(dir.path(), "quantive-okr")
            .unwrap()
            .unwrap();

        assert!(!log.exists());
        assert!(backup.exists());
        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("quantive-okr."))
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn test_rotate_without_log_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(rotate_logs_on_startup(dir.path(), "quantive-okr").unwrap(), None);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_init_logging_with_file_layer() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("quantive-okr.log"), "old").unwrap();

        init_logging(Some(dir.path()), "quantive-okr", "info").unwrap();

        assert!(!dir.path().join("quantive-okr.log").exists());
        assert!(init_logging(None, "quantive-okr", "info").is_err());
    }

    #[test]
    fn test_rotation_failure_is_logged() {
        let (output, subscriber) = testing::capture();
        tracing::subscriber::with_default(subscriber, || {
            report_rotation(Err(anyhow::anyhow!("permission denied")));
        });

        let text = output.contents();
        assert!(text.contains("WARN"));
        assert!(text.contains("Failed to rotate previous log file: permission denied"));
    }
}
