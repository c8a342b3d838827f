use crate::services::LogStore;
use anyhow::Result;

/// Buffer size that triggers a write to the store.
pub const FLUSH_THRESHOLD: usize = 512;
// Pending text past this size is dropped while the store keeps failing.
const MAX_PENDING: usize = 64 * 1024;

/// Human-readable session log, batched to keep SD card writes rare.
pub struct SessionLog {
    store: Box<dyn LogStore>,
    pending: String,
    echo: bool,
}

impl SessionLog {
    pub fn new(store: Box<dyn LogStore>, echo: bool) -> Self {
        Self {
            store,
            pending: String::new(),
            echo,
        }
    }

    /// Queue one line; written once the buffer passes the threshold.
    pub fn line(&mut self, text: &str) {
        self.push(text);
        if self.pending.len() >= FLUSH_THRESHOLD {
            self.write_pending();
        }
    }

    /// Queue one line and write everything immediately.
    pub fn line_forced(&mut self, text: &str) {
        self.push(text);
        self.write_pending();
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.store.append(&self.pending)?;
        self.pending.clear();
        Ok(())
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    fn push(&mut self, text: &str) {
        if self.echo {
            println!("{text}");
        }
        self.pending.push_str(text);
        self.pending.push('\n');
    }

    fn write_pending(&mut self) {
        if let Err(err) = self.flush() {
            tracing::warn!(error = %err, bytes = self.pending.len(), "session log write failed");
            if self.pending.len() > MAX_PENDING {
                self.pending.clear();
            }
        }
    }
}
