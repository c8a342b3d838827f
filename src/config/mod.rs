//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;

use defaults::{
    default_capture_hold_action, default_chord_action, DEFAULT_CAMERA_CMD, DEFAULT_DATA_DIR,
    DEFAULT_DRIVE_DUMP_DIR, DEFAULT_DRIVE_MOUNT_ROOT, DEFAULT_DRIVE_NAME, DEFAULT_SHUTDOWN_CMD,
    DEFAULT_STILL_CMD, DEFAULT_THERMAL_ZONE,
};
pub use defaults::{
    DEFAULT_CAPTURE_FLASHES, DEFAULT_DUMP_FLASHES, DEFAULT_FLASH_GAP_MS, DEFAULT_HOLD_MIN_SECS,
    DEFAULT_MODE_FLASHES, DEFAULT_PASSIVE_CLIP_LIMIT, DEFAULT_PASSIVE_CLIP_SECS,
    DEFAULT_REPORT_INTERVAL_SECS, DEFAULT_ROTATION_FLASHES, DEFAULT_SIM_CPU_TEMP_C,
    DEFAULT_TAP_MAX_SECS, DEFAULT_THERMAL_LIMIT_C, DEFAULT_THERMAL_MAX_FAILURES,
    DEFAULT_TICK_SECS,
};

/// CLI options for the dash camera. Validated values keep downstream commands safe.
#[derive(Debug, Parser, Clone)]
#[command(about = "Dashcam controller", author, version)]
pub struct AppConfig {
    /// Control loop period (seconds)
    #[arg(long = "tick-secs", default_value_t = DEFAULT_TICK_SECS)]
    pub tick_secs: f64,

    /// Length of each passive recording clip (seconds)
    #[arg(long = "passive-clip-secs", default_value_t = DEFAULT_PASSIVE_CLIP_SECS)]
    pub passive_clip_secs: u64,

    /// Number of passive clips kept before the oldest is deleted
    #[arg(long = "passive-clip-limit", default_value_t = DEFAULT_PASSIVE_CLIP_LIMIT)]
    pub passive_clip_limit: usize,

    /// Longest press that still counts as a tap (seconds)
    #[arg(long = "tap-max-secs", default_value_t = DEFAULT_TAP_MAX_SECS)]
    pub tap_max_secs: f64,

    /// Shortest press that counts as a long hold (seconds)
    #[arg(long = "hold-min-secs", default_value_t = DEFAULT_HOLD_MIN_SECS)]
    pub hold_min_secs: f64,

    /// CPU temperature that forces a shutdown (degrees C)
    #[arg(long = "thermal-limit", default_value_t = DEFAULT_THERMAL_LIMIT_C)]
    pub thermal_limit: f32,

    /// Consecutive failed temperature reads treated as overheating
    #[arg(long = "thermal-max-failures", default_value_t = DEFAULT_THERMAL_MAX_FAILURES)]
    pub thermal_max_failures: u32,

    /// Sysfs thermal zone file (millidegrees C)
    #[arg(long = "thermal-zone", default_value = DEFAULT_THERMAL_ZONE)]
    pub thermal_zone: PathBuf,

    /// Command that prints the CPU temperature (overrides --thermal-zone)
    #[arg(long = "thermal-cmd")]
    pub thermal_cmd: Option<String>,

    /// What holding both buttons does
    #[arg(long = "chord-action", value_enum, default_value_t = default_chord_action())]
    pub chord_action: ChordAction,

    /// What holding the capture button does
    #[arg(
        long = "capture-hold-action",
        value_enum,
        default_value_t = default_capture_hold_action()
    )]
    pub capture_hold_action: CaptureHoldAction,

    /// Logical index of the "running" LED
    #[arg(long = "led-running", default_value_t = 0)]
    pub led_running: usize,

    /// Logical index of the "rolling" LED
    #[arg(long = "led-rolling", default_value_t = 1)]
    pub led_rolling: usize,

    /// Logical index of the auxiliary (drive) LED
    #[arg(long = "led-aux", default_value_t = 2)]
    pub led_aux: usize,

    /// GPIO pins backing the logical LEDs, in index order
    #[arg(long = "led-pins", value_delimiter = ',', default_values_t = [18u32, 24, 27])]
    pub led_pins: Vec<u32>,

    /// GPIO pins for the power and capture buttons, in that order
    #[arg(long = "button-pins", value_delimiter = ',', default_values_t = [16u32, 5])]
    pub button_pins: Vec<u32>,

    /// Treat a high button input as pressed (default: pressed pulls low)
    #[arg(long = "buttons-active-high", default_value_t = false)]
    pub buttons_active_high: bool,

    /// Delay between LED toggles in a flash pattern (milliseconds)
    #[arg(long = "flash-gap-ms", default_value_t = DEFAULT_FLASH_GAP_MS)]
    pub flash_gap_ms: u64,

    /// Flashes after a still capture
    #[arg(long = "capture-flashes", default_value_t = DEFAULT_CAPTURE_FLASHES)]
    pub capture_flashes: u32,

    /// Flashes after a passive clip rotation
    #[arg(long = "rotation-flashes", default_value_t = DEFAULT_ROTATION_FLASHES)]
    pub rotation_flashes: u32,

    /// Flashes on passive/active mode entry
    #[arg(long = "mode-flashes", default_value_t = DEFAULT_MODE_FLASHES)]
    pub mode_flashes: u32,

    /// Flashes after a drive dump finishes
    #[arg(long = "dump-flashes", default_value_t = DEFAULT_DUMP_FLASHES)]
    pub dump_flashes: u32,

    /// Interval between routine status lines (seconds)
    #[arg(long = "report-interval-secs", default_value_t = DEFAULT_REPORT_INTERVAL_SECS)]
    pub report_interval_secs: u64,

    /// Root directory for media and logs
    #[arg(long = "data-dir", env = "DASHCAM_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Volume label of the removable drive that receives dumps
    #[arg(long = "drive-name", default_value = DEFAULT_DRIVE_NAME)]
    pub drive_name: String,

    /// Directory where removable drives appear
    #[arg(long = "drive-mount-root", default_value = DEFAULT_DRIVE_MOUNT_ROOT)]
    pub drive_mount_root: PathBuf,

    /// Folder on the drive that receives dumped files
    #[arg(long = "drive-dump-dir", default_value = DEFAULT_DRIVE_DUMP_DIR)]
    pub drive_dump_dir: String,

    /// Mount/unmount the drive around a dump instead of relying on automount
    #[arg(long = "mount-drive", default_value_t = false)]
    pub mount_drive: bool,

    /// Video recorder command line. `{output}` is the clip path (`-o <path>` is appended
    /// when absent), `{overlay}` the annotation text file, `{frame}` a live snapshot for stills
    #[arg(long = "camera-cmd", default_value = DEFAULT_CAMERA_CMD)]
    pub camera_cmd: String,

    /// Still capture command line, used while no clip is recording. `{output}` is the
    /// image path (`-o <path>` is appended when absent)
    #[arg(long = "still-cmd", default_value = DEFAULT_STILL_CMD)]
    pub still_cmd: String,

    /// Command that powers the host off
    #[arg(long = "shutdown-cmd", default_value = DEFAULT_SHUTDOWN_CMD)]
    pub shutdown_cmd: String,

    /// Do not echo the session log to stdout
    #[arg(long = "quiet", default_value_t = false)]
    pub quiet: bool,

    /// Enable the JSON trace log
    #[arg(long = "logs", env = "DASHCAM_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable the JSON trace log (overrides --logs)
    #[arg(long = "no-logs", env = "DASHCAM_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Print environment diagnostics and exit
    #[arg(long = "check", default_value_t = false)]
    pub check: bool,

    /// Run against simulated hardware
    #[arg(long = "simulate", default_value_t = false)]
    pub simulate: bool,

    /// CPU temperature reported by the simulated sensor (degrees C)
    #[arg(long = "sim-cpu-temp", default_value_t = DEFAULT_SIM_CPU_TEMP_C)]
    pub sim_cpu_temp: f32,
}

/// What a confirmed two-button hold does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChordAction {
    /// Stop the controller and power the host off.
    Shutdown,
    /// Stop the controller, leave the host running.
    DebugExit,
}

/// What a confirmed capture-button hold does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CaptureHoldAction {
    /// Switch between passive and active recording.
    ToggleActive,
    /// Take a still, same as a tap.
    Capture,
}

impl ChordAction {
    pub fn label(self) -> &'static str {
        match self {
            ChordAction::Shutdown => "shutdown",
            ChordAction::DebugExit => "debug-exit",
        }
    }
}

impl CaptureHoldAction {
    pub fn label(self) -> &'static str {
        match self {
            CaptureHoldAction::ToggleActive => "toggle-active",
            CaptureHoldAction::Capture => "capture",
        }
    }
}

/// Logical LED indices used by the status patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedMap {
    pub running: usize,
    pub rolling: usize,
    pub aux: usize,
}

impl LedMap {
    pub fn all(&self) -> [usize; 3] {
        [self.running, self.rolling, self.aux]
    }
}

/// Number of flashes for each notification pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashCounts {
    pub capture: u32,
    pub rotation: u32,
    pub mode: u32,
    pub dump: u32,
}

/// Directory layout under `--data-dir` plus the removable drive location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub data_dir: PathBuf,
    pub passive_dir: PathBuf,
    pub active_dir: PathBuf,
    pub image_dir: PathBuf,
    pub log_dir: PathBuf,
    pub drive_name: String,
    pub drive_root: PathBuf,
    pub drive_dump_dir: PathBuf,
}

impl StoragePaths {
    pub fn under(data_dir: PathBuf, drive_mount_root: &Path, drive_name: &str, dump_dir: &str) -> Self {
        let media = data_dir.join("media");
        let drive_root = drive_mount_root.join(drive_name);
        Self {
            passive_dir: media.join("passive"),
            active_dir: media.join("active"),
            image_dir: media.join("images"),
            log_dir: data_dir.join("logs"),
            drive_dump_dir: drive_root.join(dump_dir),
            drive_name: drive_name.to_string(),
            drive_root,
            data_dir,
        }
    }

    /// Directories copied to the drive on a dump.
    pub fn dump_sources(&self) -> Vec<PathBuf> {
        vec![self.log_dir.clone(), self.data_dir.join("media")]
    }
}

/// Tick-domain settings for the controller core, derived from [`AppConfig`].
///
/// Every duration the core compares against is expressed in whole ticks or whole
/// milliseconds so second boundaries never depend on float accumulation.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub tick_ms: u64,
    pub passive_clip_ms: u64,
    pub passive_clip_limit: usize,
    pub tap_max_ticks: u32,
    pub hold_min_ticks: u32,
    pub thermal_limit_c: f32,
    pub thermal_max_failures: u32,
    pub chord_action: ChordAction,
    pub capture_hold_action: CaptureHoldAction,
    pub leds: LedMap,
    pub power_button: usize,
    pub capture_button: usize,
    pub flashes: FlashCounts,
    pub flash_gap: Duration,
    pub report_interval_ms: u64,
    pub mount_drive: bool,
    pub echo_log: bool,
}

impl ControllerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
