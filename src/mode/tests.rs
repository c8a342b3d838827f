use super::*;
use crate::config::AppConfig;
use crate::input::{InputClassifier, RawButtons};
use clap::Parser;

fn config(args: &[&str]) -> ControllerConfig {
    let mut argv = vec!["test-app"];
    argv.extend_from_slice(args);
    AppConfig::parse_from(argv).controller_config()
}

/// Drives a classifier and machine together the way the controller does.
struct Harness {
    input: InputClassifier,
    machine: ModeStateMachine,
}

impl Harness {
    fn new(args: &[&str]) -> Self {
        let cfg = config(args);
        Self {
            input: InputClassifier::new(cfg.tap_max_ticks, cfg.hold_min_ticks),
            machine: ModeStateMachine::new(&cfg),
        }
    }

    fn tick(&mut self, power: bool, capture: bool) -> Decision {
        self.tick_with(power, capture, ThermalSample::NotSampled)
    }

    fn tick_with(&mut self, power: bool, capture: bool, thermal: ThermalSample) -> Decision {
        let events = self.input.sample(RawButtons { power, capture });
        self.machine.decide(TickInput {
            events,
            power: self.input.state(Button::Power),
            capture: self.input.state(Button::Capture),
            thermal,
            second_boundary: false,
            half_second_boundary: false,
            clip_due: false,
        })
    }
}

fn idle_input(thermal: ThermalSample) -> TickInput {
    TickInput {
        events: Classified {
            power: ClassifiedEvent::None,
            capture: ClassifiedEvent::None,
        },
        power: ButtonState::default(),
        capture: ButtonState::default(),
        thermal,
        second_boundary: false,
        half_second_boundary: false,
        clip_due: false,
    }
}

#[test]
fn starts_in_passive() {
    let harness = Harness::new(&[]);
    assert_eq!(
        harness.machine.state(),
        MachineState::Running(OperatingMode::Passive)
    );
}

#[test]
fn capture_hold_toggles_active_once_per_hold() {
    let mut harness = Harness::new(&[]);
    let mut entered = Vec::new();
    for tick in 1..=9 {
        let decision = harness.tick(false, true);
        if decision.actions.contains(&Action::EnterActive) {
            entered.push(tick);
        }
    }
    harness.tick(false, false);
    assert_eq!(entered, vec![8]);
    assert_eq!(harness.machine.mode(), Some(OperatingMode::Active));
}

#[test]
fn reverted_switch_lets_the_next_hold_enter_active_again() {
    let mut harness = Harness::new(&[]);
    for _ in 0..8 {
        harness.tick(false, true);
    }
    harness.machine.revert_mode(OperatingMode::Passive);
    assert_eq!(harness.machine.mode(), Some(OperatingMode::Passive));
    harness.tick(false, false);
    let mut entered = false;
    for _ in 0..8 {
        entered |= harness.tick(false, true).actions.contains(&Action::EnterActive);
    }
    assert!(entered);
}

#[test]
fn revert_does_not_leave_a_terminal_state() {
    let mut machine = ModeStateMachine::new(&config(&[]));
    machine.decide(idle_input(ThermalSample::Reading(99.0)));
    machine.revert_mode(OperatingMode::Passive);
    assert_eq!(
        machine.state(),
        MachineState::ShuttingDown(TerminateCode::ThermalLimit)
    );
}

#[test]
fn second_capture_hold_returns_to_passive() {
    let mut harness = Harness::new(&[]);
    for _ in 0..8 {
        harness.tick(false, true);
    }
    harness.tick(false, false);
    let mut returned = false;
    for _ in 0..8 {
        returned |= harness
            .tick(false, true)
            .actions
            .contains(&Action::EnterPassive);
    }
    assert!(returned);
    assert_eq!(harness.machine.mode(), Some(OperatingMode::Passive));
}

#[test]
fn capture_tap_in_passive_requests_still() {
    let mut harness = Harness::new(&[]);
    harness.tick(false, true);
    harness.tick(false, true);
    let decision = harness.tick(false, false);
    assert_eq!(decision.actions, vec![Action::Capture]);
    assert_eq!(harness.machine.mode(), Some(OperatingMode::Passive));
}

#[test]
fn capture_tap_in_active_is_ignored() {
    let mut harness = Harness::new(&[]);
    for _ in 0..8 {
        harness.tick(false, true);
    }
    harness.tick(false, false);
    harness.tick(false, true);
    let decision = harness.tick(false, false);
    assert!(!decision.actions.contains(&Action::Capture));
}

#[test]
fn capture_hold_can_be_bound_to_still_capture() {
    let mut harness = Harness::new(&["--capture-hold-action", "capture"]);
    let captures = (0..12)
        .filter(|_| harness.tick(false, true).actions.contains(&Action::Capture))
        .count();
    assert_eq!(captures, 1);
    assert_eq!(harness.machine.mode(), Some(OperatingMode::Passive));
}

#[test]
fn power_hold_alone_exits_for_debugging() {
    let mut harness = Harness::new(&[]);
    let mut code = None;
    for _ in 0..8 {
        code = harness.tick(true, false).terminate_code().or(code);
    }
    assert_eq!(code, Some(TerminateCode::DebugExit));
    assert_eq!(harness.machine.state(), MachineState::DebugExit);
}

#[test]
fn chord_shuts_down_by_default() {
    let mut harness = Harness::new(&[]);
    let mut last = None;
    for _ in 0..8 {
        last = Some(harness.tick(true, true));
    }
    let decision = last.expect("ticked");
    assert_eq!(decision.terminate_code(), Some(TerminateCode::PowerConfirmed));
    assert_eq!(
        harness.machine.state(),
        MachineState::ShuttingDown(TerminateCode::PowerConfirmed)
    );
}

#[test]
fn chord_can_be_bound_to_debug_exit() {
    let mut harness = Harness::new(&["--chord-action", "debug-exit"]);
    let mut code = None;
    for _ in 0..8 {
        code = harness.tick(true, true).terminate_code().or(code);
    }
    assert_eq!(code, Some(TerminateCode::DebugExit));
}

#[test]
fn chord_wins_over_staggered_power_hold() {
    let mut harness = Harness::new(&[]);
    harness.tick(true, false);
    let mut code = None;
    for _ in 0..8 {
        code = code.or(harness.tick(true, true).terminate_code());
    }
    // Power crossed the threshold first, but capture was already down.
    assert_eq!(code, Some(TerminateCode::PowerConfirmed));
}

#[test]
fn capture_hold_waits_while_power_is_down() {
    let mut harness = Harness::new(&[]);
    harness.tick(false, true);
    // Capture reaches the hold threshold on the last tick, power is one short.
    for _ in 0..7 {
        let decision = harness.tick(true, true);
        assert!(!decision.actions.contains(&Action::EnterActive));
        assert_eq!(decision.terminate_code(), None);
    }
    assert_eq!(harness.machine.mode(), Some(OperatingMode::Passive));
}

#[test]
fn overheating_shuts_down_from_any_mode() {
    let mut harness = Harness::new(&[]);
    for _ in 0..8 {
        harness.tick(false, true);
    }
    assert_eq!(harness.machine.mode(), Some(OperatingMode::Active));
    let decision = harness.tick_with(false, false, ThermalSample::Reading(85.0));
    assert_eq!(decision.terminate_code(), Some(TerminateCode::ThermalLimit));
    assert_eq!(decision.thermal, Some(ThermalVerdict::Overheated(85.0)));
}

#[test]
fn thermal_limit_beats_chord() {
    let mut harness = Harness::new(&[]);
    for _ in 0..7 {
        harness.tick(true, true);
    }
    let decision = harness.tick_with(true, true, ThermalSample::Reading(90.0));
    assert_eq!(decision.terminate_code(), Some(TerminateCode::ThermalLimit));
}

#[test]
fn reading_at_limit_is_not_overheating() {
    let mut machine = ModeStateMachine::new(&config(&[]));
    let decision = machine.decide(idle_input(ThermalSample::Reading(80.0)));
    assert_eq!(decision.terminate_code(), None);
    assert_eq!(decision.thermal, Some(ThermalVerdict::Normal(80.0)));
}

#[test]
fn three_failed_reads_trigger_fail_safe() {
    let mut machine = ModeStateMachine::new(&config(&[]));
    let first = machine.decide(idle_input(ThermalSample::Failed));
    assert_eq!(first.thermal, Some(ThermalVerdict::ReadFailed { consecutive: 1 }));
    assert_eq!(first.terminate_code(), None);
    let second = machine.decide(idle_input(ThermalSample::NotSampled));
    assert_eq!(second.thermal, None);
    machine.decide(idle_input(ThermalSample::Failed));
    let third = machine.decide(idle_input(ThermalSample::Failed));
    assert_eq!(third.thermal, Some(ThermalVerdict::FailSafe { consecutive: 3 }));
    assert_eq!(third.terminate_code(), Some(TerminateCode::ThermalLimit));
}

#[test]
fn successful_read_resets_failure_streak() {
    let mut machine = ModeStateMachine::new(&config(&[]));
    machine.decide(idle_input(ThermalSample::Failed));
    machine.decide(idle_input(ThermalSample::Failed));
    machine.decide(idle_input(ThermalSample::Reading(50.0)));
    let first = machine.decide(idle_input(ThermalSample::Failed));
    assert_eq!(first.thermal, Some(ThermalVerdict::ReadFailed { consecutive: 1 }));
    let second = machine.decide(idle_input(ThermalSample::Failed));
    assert_eq!(second.terminate_code(), None);
}

#[test]
fn nan_reading_counts_as_failure() {
    let mut watchdog = ThermalWatchdog::new(80.0, 3);
    assert_eq!(
        watchdog.observe(ThermalSample::Reading(f32::NAN)),
        Some(ThermalVerdict::ReadFailed { consecutive: 1 })
    );
}

#[test]
fn passive_toggles_rolling_led_on_seconds_and_rotates_when_due() {
    let mut machine = ModeStateMachine::new(&config(&[]));
    let mut input = idle_input(ThermalSample::NotSampled);
    input.second_boundary = true;
    input.half_second_boundary = true;
    input.clip_due = true;
    let decision = machine.decide(input);
    assert_eq!(
        decision.actions,
        vec![Action::ToggleRollingLed, Action::RotatePassive]
    );
}

#[test]
fn active_blinks_on_half_seconds_and_never_rotates() {
    let mut harness = Harness::new(&[]);
    for _ in 0..8 {
        harness.tick(false, true);
    }
    harness.tick(false, false);
    let mut input = idle_input(ThermalSample::NotSampled);
    input.half_second_boundary = true;
    input.clip_due = true;
    let decision = harness.machine.decide(input);
    assert_eq!(decision.actions, vec![Action::ToggleRollingLed]);
}

#[test]
fn terminal_state_ignores_further_input() {
    let mut machine = ModeStateMachine::new(&config(&[]));
    machine.decide(idle_input(ThermalSample::Reading(99.0)));
    let decision = machine.decide(idle_input(ThermalSample::Reading(99.0)));
    assert!(decision.actions.is_empty());
    assert!(machine.state().is_terminal());
}

#[test]
fn terminate_codes_know_whether_host_powers_off() {
    assert!(TerminateCode::ThermalLimit.shuts_down_host());
    assert!(TerminateCode::PowerConfirmed.shuts_down_host());
    assert!(!TerminateCode::DebugExit.shuts_down_host());
}
