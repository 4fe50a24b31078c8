//! Centralized logging setup
//!
//! Stdout logging with an optional second non-blocking file output, both
//! filtered by `RUST_LOG` (default "info").

use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

/// Initialize logging. When `log_file` is set, a second copy of the
/// stream goes to that file through a non-blocking appender.
///
/// The appender guard is forgotten to keep the writer alive for the
/// program lifetime.
pub fn init_logging(log_file: Option<&str>) {
    match log_file {
        Some(path) => {
            let directory = std::path::Path::new(path)
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = std::path::Path::new(path)
                .file_name()
                .map_or_else(|| "proxy.log".to_string(), |f| f.to_string_lossy().into_owned());
            let file_appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stdout)
                        .with_filter(env_filter()),
                )
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_filter(env_filter()),
                )
                .init();

            // Keep guard alive for the program lifetime
            std::mem::forget(guard);
        }
        None => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stdout)
                        .with_filter(env_filter()),
                )
                .init();
        }
    }
}
