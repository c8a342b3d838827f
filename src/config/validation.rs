use super::defaults::{
    BUTTON_COUNT, CAMERA_BINARIES, FORBIDDEN_NAME_CHARS, LED_COUNT, MAX_FLASHES,
    MAX_PASSIVE_CLIP_LIMIT, MAX_PASSIVE_CLIP_SECS, MAX_TICK_MS, MIN_TICK_MS, SHUTDOWN_BINARIES,
    STILL_BINARIES, THERMAL_BINARIES,
};
use super::{AppConfig, ControllerConfig, FlashCounts, LedMap, StoragePaths};
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::{collections::HashSet, fs, path::Path, time::Duration};

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize command lines.
    pub fn validate(&mut self) -> Result<()> {
        let tick_ms = whole_millis(self.tick_secs, "--tick-secs")?;
        if !(MIN_TICK_MS..=MAX_TICK_MS).contains(&tick_ms) {
            bail!(
                "--tick-secs must be between {} and {} seconds, got {}",
                MIN_TICK_MS as f64 / 1000.0,
                MAX_TICK_MS as f64 / 1000.0,
                self.tick_secs
            );
        }
        // Second and half-second boundaries must land exactly on a tick.
        if 500 % tick_ms != 0 {
            bail!(
                "--tick-secs must divide 0.5 seconds evenly, got {}",
                self.tick_secs
            );
        }

        if !(10..=MAX_PASSIVE_CLIP_SECS).contains(&self.passive_clip_secs) {
            bail!(
                "--passive-clip-secs must be between 10 and {MAX_PASSIVE_CLIP_SECS}, got {}",
                self.passive_clip_secs
            );
        }
        if !(1..=MAX_PASSIVE_CLIP_LIMIT).contains(&self.passive_clip_limit) {
            bail!(
                "--passive-clip-limit must be between 1 and {MAX_PASSIVE_CLIP_LIMIT}, got {}",
                self.passive_clip_limit
            );
        }

        let tap_ms = whole_millis(self.tap_max_secs, "--tap-max-secs")?;
        let hold_ms = whole_millis(self.hold_min_secs, "--hold-min-secs")?;
        if tap_ms < tick_ms {
            bail!(
                "--tap-max-secs ({}) must be at least one tick ({})",
                self.tap_max_secs,
                self.tick_secs
            );
        }
        if hold_ms <= tap_ms {
            bail!(
                "--hold-min-secs ({}) must be greater than --tap-max-secs ({})",
                self.hold_min_secs,
                self.tap_max_secs
            );
        }
        if hold_ms > 30_000 {
            bail!(
                "--hold-min-secs must be at most 30 seconds, got {}",
                self.hold_min_secs
            );
        }

        if !self.thermal_limit.is_finite() || !(30.0..=120.0).contains(&self.thermal_limit) {
            bail!(
                "--thermal-limit must be between 30.0 and 120.0, got {}",
                self.thermal_limit
            );
        }
        if !(1..=60).contains(&self.thermal_max_failures) {
            bail!(
                "--thermal-max-failures must be between 1 and 60, got {}",
                self.thermal_max_failures
            );
        }
        if !self.sim_cpu_temp.is_finite() {
            bail!("--sim-cpu-temp must be a finite number");
        }

        let leds = [self.led_running, self.led_rolling, self.led_aux];
        if let Some(index) = leds.iter().find(|index| **index >= LED_COUNT) {
            bail!("LED indices must be below {LED_COUNT}, got {index}");
        }
        if leds.iter().collect::<HashSet<_>>().len() != leds.len() {
            bail!("--led-running, --led-rolling and --led-aux must be distinct");
        }
        if self.led_pins.len() != LED_COUNT {
            bail!(
                "--led-pins needs exactly {LED_COUNT} pins, got {}",
                self.led_pins.len()
            );
        }
        if self.button_pins.len() != BUTTON_COUNT {
            bail!(
                "--button-pins needs exactly {BUTTON_COUNT} pins (power,capture), got {}",
                self.button_pins.len()
            );
        }
        let pins: Vec<u32> = self
            .led_pins
            .iter()
            .chain(self.button_pins.iter())
            .copied()
            .collect();
        if pins.iter().collect::<HashSet<_>>().len() != pins.len() {
            bail!("--led-pins and --button-pins must not share a GPIO pin");
        }

        for (flag, count) in [
            ("--capture-flashes", self.capture_flashes),
            ("--rotation-flashes", self.rotation_flashes),
            ("--mode-flashes", self.mode_flashes),
            ("--dump-flashes", self.dump_flashes),
        ] {
            if count > MAX_FLASHES {
                bail!("{flag} must be at most {MAX_FLASHES}, got {count}");
            }
        }
        if !(1..=1000).contains(&self.flash_gap_ms) {
            bail!(
                "--flash-gap-ms must be between 1 and 1000, got {}",
                self.flash_gap_ms
            );
        }
        if !(1..=3600).contains(&self.report_interval_secs) {
            bail!(
                "--report-interval-secs must be between 1 and 3600, got {}",
                self.report_interval_secs
            );
        }

        sanitize_name(&self.drive_name, "--drive-name")?;
        sanitize_name(&self.drive_dump_dir, "--drive-dump-dir")?;

        self.camera_cmd = sanitize_command(&self.camera_cmd, "--camera-cmd", CAMERA_BINARIES)?;
        self.still_cmd = sanitize_command(&self.still_cmd, "--still-cmd", STILL_BINARIES)?;
        self.shutdown_cmd =
            sanitize_command(&self.shutdown_cmd, "--shutdown-cmd", SHUTDOWN_BINARIES)?;
        if let Some(cmd) = &self.thermal_cmd {
            self.thermal_cmd = Some(sanitize_command(cmd, "--thermal-cmd", THERMAL_BINARIES)?);
        }

        Ok(())
    }

    /// Snapshot the tick-domain settings the controller core runs on.
    pub fn controller_config(&self) -> ControllerConfig {
        let tick_ms = secs_to_millis(self.tick_secs).max(1);
        let tap_ms = secs_to_millis(self.tap_max_secs);
        let hold_ms = secs_to_millis(self.hold_min_secs);
        ControllerConfig {
            tick_ms,
            passive_clip_ms: self.passive_clip_secs.saturating_mul(1000),
            passive_clip_limit: self.passive_clip_limit,
            tap_max_ticks: (tap_ms / tick_ms) as u32,
            hold_min_ticks: hold_ms.div_ceil(tick_ms).max(1) as u32,
            thermal_limit_c: self.thermal_limit,
            thermal_max_failures: self.thermal_max_failures,
            chord_action: self.chord_action,
            capture_hold_action: self.capture_hold_action,
            leds: LedMap {
                running: self.led_running,
                rolling: self.led_rolling,
                aux: self.led_aux,
            },
            power_button: 0,
            capture_button: 1,
            flashes: FlashCounts {
                capture: self.capture_flashes,
                rotation: self.rotation_flashes,
                mode: self.mode_flashes,
                dump: self.dump_flashes,
            },
            flash_gap: Duration::from_millis(self.flash_gap_ms),
            report_interval_ms: self.report_interval_secs.saturating_mul(1000),
            mount_drive: self.mount_drive,
            echo_log: !self.quiet,
        }
    }

    /// Resolve the on-disk layout for media, logs, and the removable drive.
    pub fn storage_paths(&self) -> StoragePaths {
        StoragePaths::under(
            self.data_dir.clone(),
            &self.drive_mount_root,
            &self.drive_name,
            &self.drive_dump_dir,
        )
    }

    pub fn trace_logs_enabled(&self) -> bool {
        self.logs && !self.no_logs
    }
}

pub(super) fn secs_to_millis(secs: f64) -> u64 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (secs * 1000.0).round() as u64
}

/// Convert a seconds flag to milliseconds, rejecting sub-millisecond precision.
pub(super) fn whole_millis(secs: f64, flag: &str) -> Result<u64> {
    if !secs.is_finite() || secs <= 0.0 {
        bail!("{flag} must be a positive number of seconds, got {secs}");
    }
    let ms = secs * 1000.0;
    if (ms - ms.round()).abs() > 1e-6 {
        bail!("{flag} must be a whole number of milliseconds, got {secs}");
    }
    Ok(ms.round() as u64)
}

/// Names that become path components on the drive.
pub(super) fn sanitize_name(value: &str, flag: &str) -> Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        bail!("{flag} must be a plain, non-empty name");
    }
    if trimmed.len() > 64 || trimmed.chars().any(|ch| FORBIDDEN_NAME_CHARS.contains(&ch)) {
        bail!("{flag} must be <=64 characters with no path separators or shell metacharacters");
    }
    Ok(())
}

/// Allow a command line whose program is either a known binary name or an existing executable.
pub(super) fn sanitize_command(value: &str, flag: &str, allowlist: &[&str]) -> Result<String> {
    let mut words =
        shell_words::split(value).with_context(|| format!("failed to parse {flag} '{value}'"))?;
    let Some(program) = words.first_mut() else {
        bail!("{flag} cannot be empty");
    };
    *program = sanitize_binary(program, flag, allowlist)?;
    Ok(shell_words::join(&words))
}

/// Allow either a known binary name or an absolute path.
pub(super) fn sanitize_binary(value: &str, flag: &str, allowlist: &[&str]) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{flag} cannot be empty");
    }
    if let Some(allowed) = allowlist
        .iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(trimmed))
    {
        return Ok((*allowed).to_string());
    }

    let path = Path::new(trimmed);
    if path.is_absolute() || trimmed.contains(std::path::MAIN_SEPARATOR) {
        let canonical = path
            .canonicalize()
            .with_context(|| format!("failed to canonicalize {flag} '{trimmed}'"))?;
        let metadata = fs::metadata(&canonical)
            .with_context(|| format!("failed to inspect {flag} '{}'", canonical.display()))?;
        if !metadata.is_file() {
            bail!("{flag} '{}' is not a file", canonical.display());
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = metadata.permissions().mode();
            if mode & 0o111 == 0 {
                bail!(
                    "{flag} '{}' exists but is not executable (mode {:o})",
                    canonical.display(),
                    mode
                );
            }
        }
        return canonical
            .to_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("{flag} must be valid UTF-8"));
    }

    bail!("{flag} must start with one of {allowlist:?} or an existing binary path");
}
