use crate::app::crash_log_path;
use crate::config::AppConfig;
use crate::hw::{find_program, SystemThermal, FRAME_PLACEHOLDER, OVERLAY_PLACEHOLDER};
use crate::services::Thermal;
use crate::telemetry::tracing_log_path;
use std::{env, fmt::Display, fs, path::Path};

pub struct DoctorReport {
    lines: Vec<String>,
}

impl DoctorReport {
    pub fn new(title: &str) -> Self {
        Self {
            lines: vec![title.to_string()],
        }
    }

    pub fn section(&mut self, title: &str) {
        self.lines.push(String::new());
        self.lines.push(format!("{title}:"));
    }

    pub fn push_kv(&mut self, key: &str, value: impl Display) {
        self.lines.push(format!("  {key}: {value}"));
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

/// Environment diagnostics printed by `--check`.
pub fn doctor_report(config: &AppConfig, binary_name: &str) -> DoctorReport {
    let mut report = DoctorReport::new("Dashcam Doctor");
    report.push_kv("version", env!("CARGO_PKG_VERSION"));
    report.push_kv("binary", binary_name);
    report.push_kv("os", format!("{}/{}", env::consts::OS, env::consts::ARCH));

    let mut validated = config.clone();
    let validation_result = validated.validate();
    let resolved = validation_result
        .as_ref()
        .map(|_| &validated)
        .unwrap_or(config);

    report.section("Config");
    match validation_result {
        Ok(()) => report.push_kv("validation", "ok"),
        Err(err) => report.push_kv("validation", format!("error: {err:#}")),
    }
    report.push_kv("tick", format!("{}s", resolved.tick_secs));
    report.push_kv(
        "passive_clips",
        format!(
            "{} x {}s",
            resolved.passive_clip_limit, resolved.passive_clip_secs
        ),
    );
    report.push_kv("thermal_limit", format!("{:.1}C", resolved.thermal_limit));
    report.push_kv("chord_action", resolved.chord_action.label());
    report.push_kv("capture_hold_action", resolved.capture_hold_action.label());
    report.push_kv(
        "overlay",
        if resolved.camera_cmd.contains(OVERLAY_PLACEHOLDER) {
            "drawn by recorder"
        } else {
            "unsupported (--camera-cmd has no {overlay})"
        },
    );
    report.push_kv(
        "stills_while_recording",
        if resolved.camera_cmd.contains(FRAME_PLACEHOLDER) {
            "frame snapshot"
        } else {
            "unsupported (--camera-cmd has no {frame})"
        },
    );
    report.push_kv(
        "trace_logs",
        if resolved.trace_logs_enabled() {
            "enabled"
        } else {
            "disabled"
        },
    );
    report.push_kv("trace_log", tracing_log_path().display());
    report.push_kv("crash_log", crash_log_path().display());

    let paths = resolved.storage_paths();
    report.section("Storage");
    report.push_kv("data_dir", describe_dir(&paths.data_dir));
    match count_entries(&paths.passive_dir) {
        Some(count) => report.push_kv("passive_files", count),
        None => report.push_kv("passive_files", "missing"),
    }
    report.push_kv("drive", format!("{} at {}", paths.drive_name, describe_dir(&paths.drive_root)));
    report.push_kv("mount_drive", resolved.mount_drive);

    report.section("Hardware");
    if resolved.simulate {
        report.push_kv("mode", "simulated");
        report.push_kv("cpu_temp", format!("{:.1}C", resolved.sim_cpu_temp));
        return report;
    }
    report.push_kv("mode", "device");
    for (key, cmd) in [
        ("camera_cmd", &resolved.camera_cmd),
        ("still_cmd", &resolved.still_cmd),
        ("shutdown_cmd", &resolved.shutdown_cmd),
    ] {
        report.push_kv(key, describe_command(cmd));
    }
    report.push_kv("led_pins", join_pins(&resolved.led_pins));
    report.push_kv("button_pins", join_pins(&resolved.button_pins));
    let reading = SystemThermal::from_config(
        resolved.thermal_zone.clone(),
        resolved.thermal_cmd.as_deref(),
    )
    .and_then(|mut thermal| thermal.read_cpu_temperature());
    match reading {
        Ok(temp) => report.push_kv("cpu_temp", format!("{temp:.1}C")),
        Err(err) => report.push_kv("cpu_temp", format!("error: {err:#}")),
    }

    report
}

fn describe_dir(path: &Path) -> String {
    let state = if path.is_dir() { "present" } else { "missing" };
    format!("{} ({state})", path.display())
}

fn count_entries(dir: &Path) -> Option<usize> {
    fs::read_dir(dir).ok().map(|entries| entries.flatten().count())
}

fn describe_command(cmd: &str) -> String {
    let program = shell_words::split(cmd)
        .ok()
        .and_then(|words| words.into_iter().next());
    match program {
        Some(program) => match find_program(&program) {
            Ok(path) => format!("{cmd} ({})", path.display()),
            Err(_) => format!("{cmd} (not found)"),
        },
        None => format!("{cmd} (unparseable)"),
    }
}

fn join_pins(pins: &[u32]) -> String {
    pins.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
