use crate::media::log_file_name;
use crate::services::LogStore;
use anyhow::{Context, Result};
use chrono::Local;
use std::{
    env, fs,
    io::Write,
    panic,
    path::{Path, PathBuf},
    sync::OnceLock,
};

pub const LOG_MAX_BYTES: u64 = 5 * 1024 * 1024;
const CRASH_LOG_MAX_BYTES: u64 = 256 * 1024;
static PANIC_HOOK_INSTALLED: OnceLock<()> = OnceLock::new();

/// Path to the crash log file (location and message only).
pub fn crash_log_path() -> PathBuf {
    env::var("DASHCAM_CRASH_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("dashcam_crash.log"))
}

struct LogWriter {
    path: PathBuf,
    file: fs::File,
    max_bytes: u64,
    bytes_written: u64,
}

impl LogWriter {
    fn open(path: PathBuf, max_bytes: u64) -> Result<Self> {
        let mut bytes_written = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if bytes_written > max_bytes {
            let _ = fs::remove_file(&path);
            bytes_written = 0;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        Ok(Self {
            path,
            file,
            max_bytes,
            bytes_written,
        })
    }

    fn truncate_if_needed(&mut self, next_len: usize) -> Result<()> {
        if self.bytes_written.saturating_add(next_len as u64) <= self.max_bytes {
            return Ok(());
        }
        self.file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .with_context(|| format!("failed to truncate log file {}", self.path.display()))?;
        self.bytes_written = 0;
        Ok(())
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        self.truncate_if_needed(text.len())?;
        self.file
            .write_all(text.as_bytes())
            .with_context(|| format!("failed to write log file {}", self.path.display()))?;
        self.bytes_written = self.bytes_written.saturating_add(text.len() as u64);
        Ok(())
    }
}

/// Appends session log text to one file per day under the log directory.
pub struct FileLogStore {
    dir: PathBuf,
    max_bytes: u64,
    writer: Option<LogWriter>,
}

impl FileLogStore {
    pub fn new(dir: &Path) -> Self {
        Self::with_limit(dir, LOG_MAX_BYTES)
    }

    pub fn with_limit(dir: &Path, max_bytes: u64) -> Self {
        Self {
            dir: dir.to_path_buf(),
            max_bytes,
            writer: None,
        }
    }

    /// File that receives today's text.
    pub fn current_path(&self) -> PathBuf {
        self.dir.join(log_file_name(Local::now()))
    }
}

impl LogStore for FileLogStore {
    fn append(&mut self, text: &str) -> Result<()> {
        let path = self.current_path();
        let writer = match self.writer.take() {
            Some(writer) if writer.path == path => writer,
            _ => LogWriter::open(path, self.max_bytes)?,
        };
        let writer = self.writer.insert(writer);
        writer.write_text(text)
    }
}

/// Write a one-line crash record: timestamp, location, message, version.
pub fn log_panic(info: &panic::PanicHookInfo<'_>) {
    let location = info
        .location()
        .map(|loc| format!("{}:{}", loc.file(), loc.line()))
        .unwrap_or_else(|| "unknown".to_string());
    let payload = if let Some(text) = info.payload().downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = info.payload().downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    };

    let line = format!(
        "[{}] panic at {location}: {payload} (v{})\n",
        Local::now().to_rfc3339(),
        env!("CARGO_PKG_VERSION")
    );
    let path = crash_log_path();
    let bytes_written = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    let truncate = bytes_written.saturating_add(line.len() as u64) > CRASH_LOG_MAX_BYTES;
    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(!truncate)
        .truncate(truncate)
        .open(&path);
    if let Ok(mut file) = file {
        let _ = file.write_all(line.as_bytes());
    }
}

/// Record panics in the crash log, then hand off to the previous hook.
pub fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            log_panic(info);
            tracing::error!(panic = %info, "controller panicked");
            previous(info);
        }));
    });
}
