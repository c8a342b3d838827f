use crate::services::Shutdown;
use anyhow::{bail, Context, Result};
use std::process::Command;

/// Powers the host off with a configured command, e.g. `sudo shutdown -h now`.
pub struct CommandShutdown {
    argv: Vec<String>,
}

impl CommandShutdown {
    pub fn new(cmd: &str) -> Result<Self> {
        let argv =
            shell_words::split(cmd).with_context(|| format!("failed to parse --shutdown-cmd '{cmd}'"))?;
        if argv.is_empty() {
            bail!("--shutdown-cmd cannot be empty");
        }
        Ok(Self { argv })
    }
}

impl Shutdown for CommandShutdown {
    fn shutdown_now(&mut self) -> Result<()> {
        // Clips and logs must reach the card before power goes.
        #[cfg(unix)]
        unsafe {
            libc::sync();
        }
        let (program, args) = match self.argv.split_first() {
            Some(parts) => parts,
            None => bail!("shutdown command is empty"),
        };
        tracing::info!(command = %shell_words::join(&self.argv), "powering off host");
        let status = Command::new(program)
            .args(args)
            .status()
            .with_context(|| format!("failed to run {program}"))?;
        if !status.success() {
            bail!("{program} exited with {status}");
        }
        Ok(())
    }
}
