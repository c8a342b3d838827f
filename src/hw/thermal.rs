use crate::services::Thermal;
use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

const NUMBER_PATTERN: &str = r"-?\d+(?:\.\d+)?";

/// Where the CPU temperature comes from.
#[derive(Debug, Clone)]
pub enum ThermalSource {
    /// Sysfs thermal zone reporting millidegrees.
    Zone(PathBuf),
    /// Command whose output contains degrees, e.g. `temp=48.3'C`.
    Command(Vec<String>),
}

pub struct SystemThermal {
    source: ThermalSource,
}

impl SystemThermal {
    pub fn new(source: ThermalSource) -> Self {
        Self { source }
    }

    pub fn from_config(zone: PathBuf, cmd: Option<&str>) -> Result<Self> {
        let source = match cmd {
            Some(cmd) => ThermalSource::Command(
                shell_words::split(cmd)
                    .with_context(|| format!("failed to parse --thermal-cmd '{cmd}'"))?,
            ),
            None => ThermalSource::Zone(zone),
        };
        Ok(Self::new(source))
    }
}

impl Thermal for SystemThermal {
    fn read_cpu_temperature(&mut self) -> Result<f32> {
        match &self.source {
            ThermalSource::Zone(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                parse_millidegrees(&raw)
            }
            ThermalSource::Command(argv) => {
                let (program, args) = argv
                    .split_first()
                    .ok_or_else(|| anyhow!("thermal command is empty"))?;
                let output = Command::new(program)
                    .args(args)
                    .output()
                    .with_context(|| format!("failed to run {program}"))?;
                if !output.status.success() {
                    bail!("{program} exited with {}", output.status);
                }
                parse_degrees(&String::from_utf8_lossy(&output.stdout))
            }
        }
    }
}

pub(crate) fn parse_millidegrees(raw: &str) -> Result<f32> {
    let milli: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("unexpected thermal zone value '{}'", raw.trim()))?;
    Ok(milli as f32 / 1000.0)
}

/// First decimal number in command output.
pub(crate) fn parse_degrees(output: &str) -> Result<f32> {
    let pattern = Regex::new(NUMBER_PATTERN)
        .with_context(|| format!("invalid temperature pattern: {NUMBER_PATTERN}"))?;
    let found = pattern
        .find(output)
        .ok_or_else(|| anyhow!("no temperature in '{}'", output.trim()))?;
    found
        .as_str()
        .parse()
        .with_context(|| format!("bad temperature '{}'", found.as_str()))
}
