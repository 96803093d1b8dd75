use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Map `-v` occurrences and `TFIMPORT_LOG_LEVEL` onto a level name.
///
/// The environment variable wins over the flag when it names a known level.
pub fn resolve_level(verbosity: u8, env_level: Option<&str>) -> &'static str {
    let from_env = env_level.map(|level| level.trim().to_lowercase());
    match from_env.as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("info") => "info",
        Some("warn") | Some("warning") => "warn",
        Some("error") => "error",
        _ => match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        },
    }
}

/// Install the global subscriber: stderr always, plus `log_file` when given.
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init(level: &str, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("tfimport={}", level)))
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter());

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_filter(filter()),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;
    Ok(())
}

/// Append a rendered report to the log file, framed by a timestamp header
pub fn append_report(path: &Path, report: &str) -> std::io::Result<()> {
    use std::io::Write;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    writeln!(file, "----- report {} -----", timestamp)?;
    file.write_all(report.as_bytes())?;
    if !report.ends_with('\n') {
        writeln!(file)?;
    }
    Ok(())
}

/// Log debug level message
pub fn debug(message: &str) {
    tracing::debug!("{}", message);
}

/// Log info level message
pub fn info(message: &str) {
    tracing::info!("{}", message);
}

/// Log warning level message
pub fn warn(message: &str) {
    tracing::warn!("{}", message);
}

/// Log error level message
pub fn error(message: &str) {
    tracing::error!("{}", message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_level_from_verbosity() {
        assert_eq!(resolve_level(0, None), "info");
        assert_eq!(resolve_level(1, None), "debug");
        assert_eq!(resolve_level(4, None), "trace");
    }

    #[test]
    fn test_append_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        append_report(&path, "first").unwrap();
        append_report(&path, "second\n").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("----- report").count(), 2);
        assert!(content.contains("first\n"));
        assert!(content.ends_with("second\n"));
    }

    #[test]
    fn test_resolve_level_env_wins() {
        assert_eq!(resolve_level(0, Some("WARNING")), "warn");
        assert_eq!(resolve_level(2, Some("error")), "error");
        assert_eq!(resolve_level(1, Some("bogus")), "debug");
    }
}
