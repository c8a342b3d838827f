use crate::config::AppConfig;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

pub fn tracing_log_path() -> PathBuf {
    env::var("DASHCAM_TRACE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("dashcam_trace.jsonl"))
}

/// JSON trace file when enabled, otherwise warnings and errors on stderr.
pub fn init_tracing(config: &AppConfig) {
    let _ = TRACING_INIT.get_or_init(|| {
        if config.trace_logs_enabled() {
            let path = tracing_log_path();
            if let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) {
                let subscriber = tracing_subscriber::fmt()
                    .json()
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(file)
                    .with_current_span(false)
                    .with_span_list(false)
                    .finish();
                let _ = tracing::subscriber::set_global_default(subscriber);
                return;
            }
        }
        let subscriber = tracing_subscriber::fmt()
            .compact()
            .with_max_level(Level::WARN)
            .with_writer(std::io::stderr)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
