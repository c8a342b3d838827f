//! Per-tick diagnostic lines and LED feedback patterns.

mod leds;

pub use leds::StatusLeds;

use crate::mode::{OperatingMode, ThermalVerdict};
use crate::scheduler::TickClock;
use std::fmt::Write;

/// Snapshot of everything a status line shows.
#[derive(Debug, Clone)]
pub struct TickReport<'a> {
    pub mode: OperatingMode,
    pub ticks: u64,
    pub elapsed_secs: u64,
    pub thermal: Option<ThermalVerdict>,
    pub leds: &'a [bool],
    pub power_held: u32,
    pub capture_held: u32,
    pub notes: &'a [String],
}

/// Decides when a status line is due and renders it.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    interval_ms: u64,
}

impl StatusReporter {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
        }
    }

    /// Routine lines go out once per interval; ticks with notes always report.
    pub fn should_report(&self, clock: &TickClock, has_notes: bool) -> bool {
        has_notes || clock.on_interval(self.interval_ms)
    }

    pub fn format(&self, report: &TickReport<'_>) -> String {
        format_tick_line(report)
    }
}

pub fn format_tick_line(report: &TickReport<'_>) -> String {
    let mut line = format!(
        "[M{}] Tick: {:9.2}  |  Running Time: {:9}",
        report.mode.code(),
        report.ticks as f64,
        report.elapsed_secs
    );
    match report.thermal {
        Some(ThermalVerdict::Normal(temp)) => {
            let _ = write!(line, "  (CPU Temp: {temp:.1})");
        }
        Some(ThermalVerdict::Overheated(temp)) => {
            let _ = write!(line, "  (CPU Temp: {temp:.1}) (Too hot! Shutting down...)");
        }
        Some(ThermalVerdict::ReadFailed { consecutive }) => {
            let _ = write!(line, "  (CPU Temp: unavailable, {consecutive} in a row)");
        }
        Some(ThermalVerdict::FailSafe { consecutive }) => {
            let _ = write!(
                line,
                "  (CPU Temp: unavailable, {consecutive} in a row) (Shutting down...)"
            );
        }
        None => {}
    }
    line.push_str("  (LEDs:");
    for on in report.leds {
        line.push_str(if *on { " 1" } else { " 0" });
    }
    line.push(')');
    if report.power_held > 0 || report.capture_held > 0 {
        let _ = write!(
            line,
            "  (Held: power {} capture {})",
            report.power_held, report.capture_held
        );
    }
    for note in report.notes {
        let _ = write!(line, "  ({note})");
    }
    line
}
