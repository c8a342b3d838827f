//! Process-level plumbing: the session log, its file store, and crash logging.

mod logging;
mod session_log;

pub use logging::{crash_log_path, install_panic_hook, log_panic, FileLogStore, LOG_MAX_BYTES};
pub use session_log::{SessionLog, FLUSH_THRESHOLD};
