//! Operating-mode state machine.
//!
//! Consumes one tick's classified button events, thermal sample, and clock
//! boundaries, and returns the side effects the controller should run. The
//! machine itself performs no I/O.

mod thermal;
#[cfg(test)]
mod tests;

pub use thermal::{ThermalSample, ThermalVerdict, ThermalWatchdog};

use crate::config::{CaptureHoldAction, ChordAction, ControllerConfig};
use crate::input::{Button, ButtonState, Classified, ClassifiedEvent};
use serde::Serialize;

/// Recording mode while the controller is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Passive,
    Active,
}

impl OperatingMode {
    /// Short tag used in status lines (`[M0]`, `[M1]`).
    pub fn code(self) -> u8 {
        match self {
            OperatingMode::Passive => 0,
            OperatingMode::Active => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OperatingMode::Passive => "passive",
            OperatingMode::Active => "active",
        }
    }
}

/// Why the control loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TerminateCode {
    ThermalLimit,
    PowerConfirmed,
    DebugExit,
}

impl TerminateCode {
    /// Whether this outcome powers the host off.
    pub fn shuts_down_host(self) -> bool {
        matches!(self, TerminateCode::ThermalLimit | TerminateCode::PowerConfirmed)
    }

    pub fn label(self) -> &'static str {
        match self {
            TerminateCode::ThermalLimit => "thermal_limit",
            TerminateCode::PowerConfirmed => "power_confirmed",
            TerminateCode::DebugExit => "debug_exit",
        }
    }
}

/// Full machine state, including the two terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Running(OperatingMode),
    ShuttingDown(TerminateCode),
    DebugExit,
}

impl MachineState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, MachineState::Running(_))
    }
}

/// Side effects requested for a tick, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Capture,
    EnterActive,
    EnterPassive,
    ToggleRollingLed,
    RotatePassive,
    Terminate(TerminateCode),
}

/// Everything the machine looks at on one tick.
#[derive(Debug, Clone, Copy)]
pub struct TickInput {
    pub events: Classified,
    pub power: ButtonState,
    pub capture: ButtonState,
    pub thermal: ThermalSample,
    pub second_boundary: bool,
    pub half_second_boundary: bool,
    /// The current passive clip has reached its configured length.
    pub clip_due: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub actions: Vec<Action>,
    pub thermal: Option<ThermalVerdict>,
}

impl Decision {
    fn new(thermal: Option<ThermalVerdict>) -> Self {
        Self {
            actions: Vec::new(),
            thermal,
        }
    }

    fn with(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn terminate_code(&self) -> Option<TerminateCode> {
        self.actions.iter().find_map(|action| match action {
            Action::Terminate(code) => Some(*code),
            _ => None,
        })
    }
}

pub struct ModeStateMachine {
    state: MachineState,
    watchdog: ThermalWatchdog,
    chord_action: ChordAction,
    capture_hold_action: CaptureHoldAction,
    // Set once a long hold has been acted on; cleared when that button is released.
    power_hold_consumed: bool,
    capture_hold_consumed: bool,
}

impl ModeStateMachine {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            state: MachineState::Running(OperatingMode::Passive),
            watchdog: ThermalWatchdog::new(config.thermal_limit_c, config.thermal_max_failures),
            chord_action: config.chord_action,
            capture_hold_action: config.capture_hold_action,
            power_hold_consumed: false,
            capture_hold_consumed: false,
        }
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn mode(&self) -> Option<OperatingMode> {
        match self.state {
            MachineState::Running(mode) => Some(mode),
            _ => None,
        }
    }

    /// Put the machine back in `mode` after a switch whose recording never started.
    /// Terminal states are left alone.
    pub fn revert_mode(&mut self, mode: OperatingMode) {
        if let MachineState::Running(_) = self.state {
            self.state = MachineState::Running(mode);
        }
    }

    /// Evaluate the transition table for one tick. First matching rule wins.
    pub fn decide(&mut self, input: TickInput) -> Decision {
        let thermal = self.watchdog.observe(input.thermal);
        let decision = Decision::new(thermal);
        let MachineState::Running(mode) = self.state else {
            return decision;
        };

        if !input.power.down {
            self.power_hold_consumed = false;
        }
        if !input.capture.down {
            self.capture_hold_consumed = false;
        }

        if thermal.is_some_and(|verdict| verdict.requires_shutdown()) {
            return self.terminate(decision, TerminateCode::ThermalLimit);
        }

        if input.events.is_chord() {
            self.power_hold_consumed = true;
            self.capture_hold_consumed = true;
            let code = match self.chord_action {
                ChordAction::Shutdown => TerminateCode::PowerConfirmed,
                ChordAction::DebugExit => TerminateCode::DebugExit,
            };
            return self.terminate(decision, code);
        }

        // A hold only counts alone while the other button is up; otherwise it may
        // still turn into a chord on a later tick.
        if input.events.power == ClassifiedEvent::LongHold(Button::Power)
            && !input.capture.down
            && !self.power_hold_consumed
        {
            self.power_hold_consumed = true;
            return self.terminate(decision, TerminateCode::DebugExit);
        }

        if mode == OperatingMode::Passive
            && input.events.capture == ClassifiedEvent::Tap(Button::Capture)
        {
            return self.periodic(decision.with(Action::Capture), mode, &input);
        }

        if input.events.capture == ClassifiedEvent::LongHold(Button::Capture)
            && !input.power.down
            && !self.capture_hold_consumed
        {
            self.capture_hold_consumed = true;
            match (self.capture_hold_action, mode) {
                (CaptureHoldAction::ToggleActive, OperatingMode::Passive) => {
                    self.state = MachineState::Running(OperatingMode::Active);
                    return decision.with(Action::EnterActive);
                }
                (CaptureHoldAction::ToggleActive, OperatingMode::Active) => {
                    self.state = MachineState::Running(OperatingMode::Passive);
                    return decision.with(Action::EnterPassive);
                }
                (CaptureHoldAction::Capture, OperatingMode::Passive) => {
                    return self.periodic(decision.with(Action::Capture), mode, &input);
                }
                (CaptureHoldAction::Capture, OperatingMode::Active) => {}
            }
        }

        self.periodic(decision, mode, &input)
    }

    fn terminate(&mut self, decision: Decision, code: TerminateCode) -> Decision {
        self.state = match code {
            TerminateCode::DebugExit => MachineState::DebugExit,
            other => MachineState::ShuttingDown(other),
        };
        decision.with(Action::Terminate(code))
    }

    fn periodic(&self, mut decision: Decision, mode: OperatingMode, input: &TickInput) -> Decision {
        match mode {
            OperatingMode::Passive => {
                if input.second_boundary {
                    decision.actions.push(Action::ToggleRollingLed);
                }
                if input.clip_due {
                    decision.actions.push(Action::RotatePassive);
                }
            }
            OperatingMode::Active => {
                if input.half_second_boundary {
                    decision.actions.push(Action::ToggleRollingLed);
                }
            }
        }
        decision
    }
}
