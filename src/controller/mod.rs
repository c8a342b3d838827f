//! The tick-driven controller loop.
//!
//! Each tick samples the buttons, classifies them, asks the mode machine what
//! to do, runs the resulting side effects against the collaborators, reports
//! status, and watches for the removable drive. The loop ends on the first
//! terminal transition and runs a single shutdown sequence on the way out.

mod dump;

pub use dump::{dump_to_drive, DumpReport};

use crate::app::SessionLog;
use crate::config::{ControllerConfig, StoragePaths};
use crate::input::{Button, InputClassifier, RawButtons};
use crate::media::{annotation_text, media_path, MediaKind};
use crate::mode::{
    Action, ModeStateMachine, OperatingMode, TerminateCode, ThermalSample, ThermalVerdict,
    TickInput,
};
use crate::retention::RetentionPolicy;
use crate::scheduler::{DriveWatch, Pacer, TickClock};
use crate::services::{Camera, Collaborators, Gpio, Shutdown, Storage, Thermal};
use crate::status::{StatusLeds, StatusReporter, TickReport};
use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use std::fmt::Display;
use std::path::Path;
use tracing::{info, warn};

/// Counters written as a JSON line when the session ends.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    pub ticks: u64,
    pub elapsed_secs: u64,
    pub captures: u32,
    pub rotations: u32,
    pub evictions: u32,
    pub dumps: u32,
    pub errors: u32,
    pub terminate: Option<TerminateCode>,
}

/// Mutable state of one controller run.
#[derive(Debug)]
pub struct RunningSession {
    pub mode: OperatingMode,
    pub clock: TickClock,
    pub terminate: Option<TerminateCode>,
    pub drive: DriveWatch,
    /// Tick on which the current recording segment started.
    pub clip_started_tick: u64,
    pub recording: bool,
    pub stats: SessionStats,
}

impl RunningSession {
    fn new(tick_ms: u64) -> Self {
        Self {
            mode: OperatingMode::Passive,
            clock: TickClock::new(tick_ms),
            terminate: None,
            drive: DriveWatch::new(),
            clip_started_tick: 0,
            recording: false,
            stats: SessionStats::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClipStart {
    Fresh,
    Split,
}

pub struct Controller {
    config: ControllerConfig,
    paths: StoragePaths,
    camera: Box<dyn Camera>,
    gpio: Box<dyn Gpio>,
    storage: Box<dyn Storage>,
    thermal: Box<dyn Thermal>,
    shutdown: Box<dyn Shutdown>,
    log: SessionLog,
    pacer: Box<dyn Pacer>,
    input: InputClassifier,
    machine: ModeStateMachine,
    retention: RetentionPolicy,
    reporter: StatusReporter,
    leds: StatusLeds,
    session: RunningSession,
    phase: Phase,
}

impl Controller {
    pub fn new(
        config: ControllerConfig,
        paths: StoragePaths,
        collaborators: Collaborators,
        pacer: Box<dyn Pacer>,
    ) -> Self {
        let Collaborators {
            camera,
            gpio,
            storage,
            thermal,
            shutdown,
            log_store,
        } = collaborators;
        Self {
            input: InputClassifier::new(config.tap_max_ticks, config.hold_min_ticks),
            machine: ModeStateMachine::new(&config),
            retention: RetentionPolicy::new(config.passive_clip_limit),
            reporter: StatusReporter::new(config.report_interval_ms),
            leds: StatusLeds::new(config.leds, config.flash_gap),
            session: RunningSession::new(config.tick_ms),
            log: SessionLog::new(log_store, config.echo_log),
            phase: Phase::Idle,
            camera,
            gpio,
            storage,
            thermal,
            shutdown,
            pacer,
            paths,
            config,
        }
    }

    pub fn session(&self) -> &RunningSession {
        &self.session
    }

    pub fn stats(&self) -> &SessionStats {
        &self.session.stats
    }

    /// Run ticks until a terminal transition, shut down, and report why.
    pub fn run(mut self) -> Result<TerminateCode> {
        self.start();
        let code = loop {
            if let Some(code) = self.step() {
                break code;
            }
            self.pacer.wait_for_tick();
        };
        self.finish();
        if code.shuts_down_host() {
            info!(code = code.label(), "powering off host");
            self.shutdown
                .shutdown_now()
                .context("failed to power off host")?;
        }
        Ok(code)
    }

    /// Open the session: banner, startup LEDs, first passive clip.
    pub fn start(&mut self) {
        if self.phase != Phase::Idle {
            return;
        }
        self.phase = Phase::Running;
        self.log.line_forced(&format!(
            "---------- New Session: {} ----------",
            Local::now().format("%Y-%m-%d %H:%M:%S%.6f")
        ));
        info!(
            tick_ms = self.config.tick_ms,
            clip_limit = self.config.passive_clip_limit,
            "session started"
        );
        if let Err(err) = self.leds.startup(self.gpio.as_mut()) {
            self.warn("LED setup failed", err);
        }
        self.log.line("Beginning passive recording...");
        let mut notes = Vec::new();
        self.start_passive_clip(ClipStart::Fresh, &mut notes);
        for note in notes {
            self.log.line(&note);
        }
    }

    /// Run one tick. Returns the terminate code once the loop should stop.
    pub fn step(&mut self) -> Option<TerminateCode> {
        if self.phase == Phase::Idle {
            self.start();
        }
        if self.phase != Phase::Running || self.session.terminate.is_some() {
            return self.session.terminate;
        }

        self.session.clock.advance();
        self.session.stats.ticks = self.session.clock.ticks();
        self.session.stats.elapsed_secs = self.session.clock.elapsed_secs();
        let mut notes = Vec::new();

        let raw = self.read_buttons();
        let events = self.input.sample(raw);
        let on_second = self.session.clock.on_second();
        let thermal = if on_second {
            self.sample_thermal()
        } else {
            ThermalSample::NotSampled
        };
        let clip_due = self.session.mode == OperatingMode::Passive
            && self.session.clock.ms_since(self.session.clip_started_tick)
                >= self.config.passive_clip_ms;

        let decision = self.machine.decide(TickInput {
            events,
            power: self.input.state(Button::Power),
            capture: self.input.state(Button::Capture),
            thermal,
            second_boundary: on_second,
            half_second_boundary: self.session.clock.on_half_second(),
            clip_due,
        });
        match decision.thermal {
            Some(ThermalVerdict::ReadFailed { consecutive }) => {
                warn!(consecutive, "CPU temperature unavailable");
            }
            Some(ThermalVerdict::FailSafe { consecutive }) => {
                warn!(consecutive, "CPU temperature unavailable; treating as overheated");
            }
            Some(ThermalVerdict::Overheated(temp)) => {
                warn!(temp, limit = self.config.thermal_limit_c, "CPU over temperature limit");
            }
            _ => {}
        }

        for action in &decision.actions {
            self.execute(*action, &mut notes);
        }
        if on_second && self.session.recording && decision.terminate_code().is_none() {
            if let Err(err) = self.camera.annotate(&annotation_text(Local::now())) {
                self.warn("annotation failed", err);
            }
        }

        self.report(decision.thermal, &notes);

        if let Some(code) = decision.terminate_code() {
            self.session.terminate = Some(code);
            self.session.stats.terminate = Some(code);
            return Some(code);
        }
        self.watch_drive();
        None
    }

    /// Stop recording, final dump, closing banner, farewell LEDs, release hardware.
    /// Runs at most once.
    pub fn finish(&mut self) {
        if self.phase == Phase::Finished {
            return;
        }
        let started = self.phase == Phase::Running;
        self.phase = Phase::Finished;

        if self.session.recording {
            if let Err(err) = self.camera.stop_recording() {
                self.warn("stopping recording failed", err);
            }
            self.session.recording = false;
        }
        if started {
            match self.storage.drive_mounted() {
                Ok(true) => self.dump(),
                Ok(false) => {}
                Err(err) => self.warn("drive check failed", err),
            }
            self.log.line_forced(&format!(
                "--------- Session Ended: {} ---------",
                Local::now().format("%Y-%m-%d %H:%M:%S%.6f")
            ));
            match serde_json::to_string(&self.session.stats) {
                Ok(json) => self.log.line_forced(&json),
                Err(err) => warn!(error = %err, "failed to serialize session stats"),
            }
        }
        if let Err(err) = self.leds.farewell(self.gpio.as_mut(), self.pacer.as_mut()) {
            self.warn("farewell LEDs failed", err);
        }
        self.camera.release();
        self.gpio.release();
        self.storage.release();
        if let Err(err) = self.log.flush() {
            warn!(error = %err, "final session log write failed");
        }
        info!(
            ticks = self.session.stats.ticks,
            code = self.session.terminate.map(TerminateCode::label),
            "session finished"
        );
    }

    fn read_buttons(&mut self) -> RawButtons {
        RawButtons {
            power: self.read_button(self.config.power_button),
            capture: self.read_button(self.config.capture_button),
        }
    }

    // A failed read counts as "not pressed" for this tick.
    fn read_button(&mut self, index: usize) -> bool {
        match self.gpio.read_input(index) {
            Ok(down) => down,
            Err(err) => {
                self.session.stats.errors += 1;
                warn!(index, error = %err, "button read failed");
                false
            }
        }
    }

    fn sample_thermal(&mut self) -> ThermalSample {
        match self.thermal.read_cpu_temperature() {
            Ok(temp) => ThermalSample::Reading(temp),
            Err(err) => {
                self.session.stats.errors += 1;
                warn!(error = %err, "CPU temperature read failed");
                ThermalSample::Failed
            }
        }
    }

    fn execute(&mut self, action: Action, notes: &mut Vec<String>) {
        let rolling = self.config.leds.rolling;
        match action {
            Action::Capture => self.capture_still(notes),
            Action::EnterActive => {
                let path = media_path(&self.paths.active_dir, MediaKind::Video, Local::now());
                match self.camera.split_recording(&path) {
                    Ok(()) => {
                        self.session.recording = true;
                        self.session.clip_started_tick = self.session.clock.ticks();
                        self.session.mode = OperatingMode::Active;
                        notes.push(format!("Active recording: {}", display_name(&path)));
                        info!(mode = "active", "mode changed");
                        self.flash(&[rolling], self.config.flashes.mode);
                    }
                    Err(err) => {
                        // The split already closed the passive clip.
                        self.session.recording = false;
                        self.fail(notes, "Active recording failed", err);
                        self.machine.revert_mode(OperatingMode::Passive);
                        notes.push("Resuming passive recording".to_string());
                        self.start_passive_clip(ClipStart::Split, notes);
                    }
                }
            }
            Action::EnterPassive => {
                self.session.mode = OperatingMode::Passive;
                notes.push("Returning to passive recording".to_string());
                self.start_passive_clip(ClipStart::Split, notes);
                info!(mode = "passive", "mode changed");
                self.flash(&[rolling], self.config.flashes.mode);
            }
            Action::ToggleRollingLed => {
                if let Err(err) = self.leds.toggle(self.gpio.as_mut(), rolling) {
                    self.warn("rolling LED toggle failed", err);
                }
            }
            Action::RotatePassive => {
                notes.push("Starting next passive video".to_string());
                self.start_passive_clip(ClipStart::Split, notes);
                self.session.stats.rotations += 1;
                self.flash(&[rolling], self.config.flashes.rotation);
            }
            Action::Terminate(code) => {
                let note = match code {
                    TerminateCode::ThermalLimit => "Thermal limit reached, shutting down",
                    TerminateCode::PowerConfirmed => "Power hold confirmed, shutting down",
                    TerminateCode::DebugExit => "Power button held, exiting",
                };
                notes.push(note.to_string());
                info!(code = code.label(), "terminal transition");
            }
        }
    }

    fn capture_still(&mut self, notes: &mut Vec<String>) {
        let path = media_path(&self.paths.image_dir, MediaKind::Image, Local::now());
        match self.camera.capture(&path) {
            Ok(()) => {
                self.session.stats.captures += 1;
                notes.push(format!("Image captured: {}", display_name(&path)));
                let aux = self.config.leds.aux;
                self.flash(&[aux], self.config.flashes.capture);
            }
            Err(err) => self.fail(notes, "Image capture failed", err),
        }
    }

    /// Evict old clips, then start or split into a new passive clip.
    fn start_passive_clip(&mut self, start: ClipStart, notes: &mut Vec<String>) {
        self.enforce_retention(notes);
        let path = media_path(&self.paths.passive_dir, MediaKind::Video, Local::now());
        let result = match start {
            ClipStart::Fresh => self.camera.start_recording(&path),
            ClipStart::Split => self.camera.split_recording(&path),
        };
        match result {
            Ok(()) => self.session.recording = true,
            Err(err) => {
                self.session.recording = false;
                self.fail(notes, "Passive recording failed", err);
            }
        }
        // Reset the window either way so a broken recorder is retried once per clip.
        self.session.clip_started_tick = self.session.clock.ticks();
    }

    fn enforce_retention(&mut self, notes: &mut Vec<String>) {
        let mut clips = match self.storage.list_passive_clips() {
            Ok(clips) => clips,
            Err(err) => {
                self.fail(notes, "Listing passive clips failed", err);
                return;
            }
        };
        while let Some(oldest) = self.retention.rotate(&clips) {
            clips.retain(|clip| clip.path != oldest);
            match self.storage.delete_file(&oldest) {
                Ok(()) => {
                    self.session.stats.evictions += 1;
                    notes.push(format!(
                        "Removing Oldest Passive Recording: {}",
                        display_name(&oldest)
                    ));
                }
                Err(err) => {
                    let context = format!("Removing {} failed", oldest.display());
                    self.fail(notes, &context, err);
                }
            }
        }
    }

    fn watch_drive(&mut self) {
        let present = match self.storage.drive_mounted() {
            Ok(present) => present,
            Err(err) => {
                // Keep last tick's view so a flaky check cannot fake an insertion.
                self.warn("drive check failed", err);
                return;
            }
        };
        if self.session.drive.observe(present) {
            self.dump();
        }
    }

    fn dump(&mut self) {
        let name = self.paths.drive_name.clone();
        self.log.line(&format!("Drive: {name} inserted. Dumping..."));
        let aux = self.config.leds.aux;
        let rolling = self.config.leds.rolling;
        if let Err(err) = self.leds.set(self.gpio.as_mut(), aux, true) {
            self.warn("aux LED failed", err);
        }
        // The dump should carry everything logged so far.
        if let Err(err) = self.log.flush() {
            self.warn("session log write failed", err);
        }
        let report = dump_to_drive(
            self.storage.as_mut(),
            &self.paths,
            self.config.mount_drive,
            &mut self.log,
        );
        self.session.stats.dumps += 1;
        self.session.stats.errors += report.failures;
        if let Err(err) = self.leds.set(self.gpio.as_mut(), aux, false) {
            self.warn("aux LED failed", err);
        }
        if report.succeeded() {
            self.log
                .line(&format!("Dump finished: {} files copied", report.files_copied));
            self.flash(&[rolling, aux], self.config.flashes.dump);
        } else {
            self.log
                .line(&format!("Dump finished with {} failures", report.failures));
            self.flash(&[rolling], self.config.flashes.dump);
        }
        info!(
            files = report.files_copied,
            failures = report.failures,
            "drive dump finished"
        );
    }

    fn flash(&mut self, leds: &[usize], flashes: u32) {
        if let Err(err) = self
            .leds
            .flash(self.gpio.as_mut(), self.pacer.as_mut(), leds, flashes)
        {
            self.warn("LED flash failed", err);
        }
    }

    fn report(&mut self, thermal: Option<ThermalVerdict>, notes: &[String]) {
        if !self
            .reporter
            .should_report(&self.session.clock, !notes.is_empty())
        {
            return;
        }
        let leds = self.leds.snapshot(&*self.gpio);
        let line = self.reporter.format(&TickReport {
            mode: self.session.mode,
            ticks: self.session.clock.ticks(),
            elapsed_secs: self.session.clock.elapsed_secs(),
            thermal,
            leds: &leds,
            power_held: self.input.held_ticks(Button::Power),
            capture_held: self.input.held_ticks(Button::Capture),
            notes,
        });
        self.log.line(&line);
    }

    /// Recoverable failure that belongs in the tick line.
    fn fail(&mut self, notes: &mut Vec<String>, what: &str, err: anyhow::Error) {
        self.session.stats.errors += 1;
        warn!(error = %err, "{what}");
        notes.push(format!("{what}: {err:#}"));
    }

    /// Recoverable failure that only goes to the trace and session log.
    fn warn(&mut self, what: &str, err: impl Display) {
        self.session.stats.errors += 1;
        warn!(error = %err, "{what}");
        self.log.line(&format!("Warning: {what}: {err}"));
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.finish();
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
