//! Button press classification.
//!
//! Raw per-tick button samples become hold counters, and hold counters become
//! discrete events: taps, short holds, long holds, and two-button chords.

/// Physical buttons on the dash camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Power,
    Capture,
}

impl Button {
    pub fn label(self) -> &'static str {
        match self {
            Button::Power => "power",
            Button::Capture => "capture",
        }
    }
}

/// Latest sample and consecutive-tick hold count for one button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    pub down: bool,
    pub held_ticks: u32,
}

/// What a button did this tick. Recomputed every tick, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifiedEvent {
    None,
    /// Released after at most `tap_max` ticks.
    Tap(Button),
    /// Released after more than `tap_max` but fewer than `hold_min` ticks.
    ShortHold(Button),
    /// Still down with at least `hold_min` ticks; repeats every tick while held.
    LongHold(Button),
    /// Both buttons are in a long hold on the same tick.
    Chord,
}

/// One tick's raw button readings, `true` meaning pressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawButtons {
    pub power: bool,
    pub capture: bool,
}

/// Per-button events for a tick. A chord is reported on both buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified {
    pub power: ClassifiedEvent,
    pub capture: ClassifiedEvent,
}

impl Classified {
    pub fn event(&self, button: Button) -> ClassifiedEvent {
        match button {
            Button::Power => self.power,
            Button::Capture => self.capture,
        }
    }

    pub fn is_chord(&self) -> bool {
        self.power == ClassifiedEvent::Chord && self.capture == ClassifiedEvent::Chord
    }
}

/// Turns raw samples into hold counters and events. Pure state, no I/O.
#[derive(Debug, Clone)]
pub struct InputClassifier {
    power: ButtonState,
    capture: ButtonState,
    tap_max_ticks: u32,
    hold_min_ticks: u32,
}

impl InputClassifier {
    pub fn new(tap_max_ticks: u32, hold_min_ticks: u32) -> Self {
        Self {
            power: ButtonState::default(),
            capture: ButtonState::default(),
            tap_max_ticks,
            hold_min_ticks: hold_min_ticks.max(1),
        }
    }

    /// Update both hold counters from this tick's samples and derive events.
    pub fn sample(&mut self, raw: RawButtons) -> Classified {
        let power = advance(
            Button::Power,
            &mut self.power,
            raw.power,
            self.tap_max_ticks,
            self.hold_min_ticks,
        );
        let capture = advance(
            Button::Capture,
            &mut self.capture,
            raw.capture,
            self.tap_max_ticks,
            self.hold_min_ticks,
        );

        if power == ClassifiedEvent::LongHold(Button::Power)
            && capture == ClassifiedEvent::LongHold(Button::Capture)
        {
            return Classified {
                power: ClassifiedEvent::Chord,
                capture: ClassifiedEvent::Chord,
            };
        }
        Classified { power, capture }
    }

    pub fn state(&self, button: Button) -> ButtonState {
        match button {
            Button::Power => self.power,
            Button::Capture => self.capture,
        }
    }

    pub fn held_ticks(&self, button: Button) -> u32 {
        self.state(button).held_ticks
    }
}

fn advance(
    button: Button,
    state: &mut ButtonState,
    down: bool,
    tap_max_ticks: u32,
    hold_min_ticks: u32,
) -> ClassifiedEvent {
    let previous = state.held_ticks;
    state.down = down;
    if down {
        state.held_ticks = previous.saturating_add(1);
        if state.held_ticks >= hold_min_ticks {
            return ClassifiedEvent::LongHold(button);
        }
        return ClassifiedEvent::None;
    }

    state.held_ticks = 0;
    if previous == 0 || previous >= hold_min_ticks {
        // A completed long hold was already reported while the button was down.
        ClassifiedEvent::None
    } else if previous <= tap_max_ticks {
        ClassifiedEvent::Tap(button)
    } else {
        ClassifiedEvent::ShortHold(button)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAP_MAX: u32 = 4;
    const HOLD_MIN: u32 = 8;

    fn classifier() -> InputClassifier {
        InputClassifier::new(TAP_MAX, HOLD_MIN)
    }

    fn capture(down: bool) -> RawButtons {
        RawButtons {
            power: false,
            capture: down,
        }
    }

    fn both(down: bool) -> RawButtons {
        RawButtons {
            power: down,
            capture: down,
        }
    }

    #[test]
    fn hold_counter_counts_consecutive_down_ticks() {
        let mut input = classifier();
        let mut counters = Vec::new();
        for _ in 0..9 {
            input.sample(capture(true));
            counters.push(input.held_ticks(Button::Capture));
        }
        input.sample(capture(false));
        counters.push(input.held_ticks(Button::Capture));
        assert_eq!(counters, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 0]);
    }

    #[test]
    fn counter_restarts_after_release() {
        let mut input = classifier();
        input.sample(capture(true));
        input.sample(capture(true));
        input.sample(capture(false));
        input.sample(capture(true));
        assert_eq!(input.held_ticks(Button::Capture), 1);
        assert!(input.state(Button::Capture).down);
    }

    #[test]
    fn long_hold_fires_at_threshold_and_repeats_while_held() {
        let mut input = classifier();
        let events: Vec<_> = (0..10).map(|_| input.sample(capture(true)).capture).collect();
        for (tick, event) in events.iter().enumerate() {
            let counter = tick as u32 + 1;
            if counter >= HOLD_MIN {
                assert_eq!(*event, ClassifiedEvent::LongHold(Button::Capture));
            } else {
                assert_eq!(*event, ClassifiedEvent::None);
            }
        }
    }

    #[test]
    fn release_after_long_hold_is_silent() {
        let mut input = classifier();
        for _ in 0..9 {
            input.sample(capture(true));
        }
        assert_eq!(input.sample(capture(false)).capture, ClassifiedEvent::None);
    }

    #[test]
    fn tap_fires_on_release_within_tap_window() {
        for held in 1..=TAP_MAX {
            let mut input = classifier();
            for _ in 0..held {
                assert_eq!(input.sample(capture(true)).capture, ClassifiedEvent::None);
            }
            assert_eq!(
                input.sample(capture(false)).capture,
                ClassifiedEvent::Tap(Button::Capture),
                "held for {held} ticks"
            );
        }
    }

    #[test]
    fn short_hold_fires_between_tap_and_hold_thresholds() {
        for held in (TAP_MAX + 1)..HOLD_MIN {
            let mut input = classifier();
            for _ in 0..held {
                input.sample(capture(true));
            }
            assert_eq!(
                input.sample(capture(false)).capture,
                ClassifiedEvent::ShortHold(Button::Capture)
            );
        }
    }

    #[test]
    fn idle_button_emits_nothing() {
        let mut input = classifier();
        let result = input.sample(RawButtons::default());
        assert_eq!(result.power, ClassifiedEvent::None);
        assert_eq!(result.capture, ClassifiedEvent::None);
    }

    #[test]
    fn chord_replaces_simultaneous_long_holds() {
        let mut input = classifier();
        for _ in 0..(HOLD_MIN - 1) {
            assert!(!input.sample(both(true)).is_chord());
        }
        let result = input.sample(both(true));
        assert!(result.is_chord());
        assert_eq!(result.event(Button::Power), ClassifiedEvent::Chord);
        assert_eq!(result.event(Button::Capture), ClassifiedEvent::Chord);
    }

    #[test]
    fn staggered_holds_report_single_long_hold_until_both_qualify() {
        let mut input = classifier();
        input.sample(RawButtons {
            power: true,
            capture: false,
        });
        for _ in 0..(HOLD_MIN - 1) {
            input.sample(both(true));
        }
        // Power reached the threshold one tick before capture.
        assert_eq!(input.held_ticks(Button::Power), HOLD_MIN);
        assert_eq!(input.held_ticks(Button::Capture), HOLD_MIN - 1);
        assert!(input.sample(both(true)).is_chord());
    }
}
