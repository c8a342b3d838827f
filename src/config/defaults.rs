use super::{CaptureHoldAction, ChordAction};

pub const DEFAULT_TICK_SECS: f64 = 0.25;
pub const DEFAULT_PASSIVE_CLIP_SECS: u64 = 10 * 60;
pub const DEFAULT_PASSIVE_CLIP_LIMIT: usize = 6;
pub const DEFAULT_TAP_MAX_SECS: f64 = 1.0;
pub const DEFAULT_HOLD_MIN_SECS: f64 = 2.0;
pub const DEFAULT_THERMAL_LIMIT_C: f32 = 80.0;
pub const DEFAULT_THERMAL_MAX_FAILURES: u32 = 3;
pub const DEFAULT_FLASH_GAP_MS: u64 = 75;
pub const DEFAULT_CAPTURE_FLASHES: u32 = 2;
pub const DEFAULT_ROTATION_FLASHES: u32 = 3;
pub const DEFAULT_MODE_FLASHES: u32 = 2;
pub const DEFAULT_DUMP_FLASHES: u32 = 3;
pub const DEFAULT_REPORT_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_SIM_CPU_TEMP_C: f32 = 45.0;

pub(super) const DEFAULT_DATA_DIR: &str = "/home/pi/dashcam";
pub(super) const DEFAULT_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";
pub(super) const DEFAULT_DRIVE_NAME: &str = "DASHCAM";
pub(super) const DEFAULT_DRIVE_MOUNT_ROOT: &str = "/media/pi";
pub(super) const DEFAULT_DRIVE_DUMP_DIR: &str = "dashcam";
// One ffmpeg process owns the camera: it burns in the overlay text and keeps a
// snapshot fresh for stills taken mid-recording.
pub(super) const DEFAULT_CAMERA_CMD: &str = concat!(
    "ffmpeg -hide_banner -loglevel error -y ",
    "-f v4l2 -framerate 30 -video_size 1600x900 -i /dev/video0 ",
    "-filter_complex 'hflip,vflip,",
    "drawtext=textfile={overlay}:reload=1:x=10:y=10:fontsize=24:fontcolor=white:box=1:boxcolor=black@0.5,",
    "split=2[rec][snap]' ",
    "-map '[rec]' -c:v libx264 -preset ultrafast -f h264 {output} ",
    "-map '[snap]' -r 2 -update 1 {frame}",
);
pub(super) const DEFAULT_STILL_CMD: &str = concat!(
    "ffmpeg -hide_banner -loglevel error -y ",
    "-f v4l2 -video_size 1600x900 -i /dev/video0 ",
    "-vf hflip,vflip -frames:v 1 {output}",
);
pub(super) const DEFAULT_SHUTDOWN_CMD: &str = "shutdown -h now";

pub(super) const MIN_TICK_MS: u64 = 10;
pub(super) const MAX_TICK_MS: u64 = 500;
pub(super) const MAX_PASSIVE_CLIP_SECS: u64 = 24 * 60 * 60;
pub(super) const MAX_PASSIVE_CLIP_LIMIT: usize = 1000;
pub(super) const MAX_FLASHES: u32 = 20;
pub(super) const LED_COUNT: usize = 3;
pub(super) const BUTTON_COUNT: usize = 2;

pub(super) const CAMERA_BINARIES: &[&str] = &[
    "rpicam-vid",
    "libcamera-vid",
    "raspivid",
    "ffmpeg",
];
pub(super) const STILL_BINARIES: &[&str] =
    &["rpicam-still", "libcamera-still", "raspistill", "ffmpeg"];
pub(super) const SHUTDOWN_BINARIES: &[&str] = &["shutdown", "poweroff", "systemctl", "sudo"];
pub(super) const THERMAL_BINARIES: &[&str] = &["vcgencmd"];
// Drive and directory names end up in paths and mount commands.
pub(super) const FORBIDDEN_NAME_CHARS: &[char] = &[
    '/', ';', '|', '&', '$', '`', '<', '>', '\\', '\'', '"', '\n', '\r',
];

pub const fn default_chord_action() -> ChordAction {
    ChordAction::Shutdown
}

pub const fn default_capture_hold_action() -> CaptureHoldAction {
    CaptureHoldAction::ToggleActive
}
