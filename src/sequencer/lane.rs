//! Lane advance engine
//!
//! [`advance_lane`] is the per-sample update of a single lane. It takes the
//! shared grids and the lane's mapping explicitly and returns the lane's
//! outputs and LED updates, leaving the sending to the caller.

use crate::dsp::{PulseGenerator, SchmittTrigger, TRIGGER_HIGH_THRESHOLD, TRIGGER_LOW_THRESHOLD};

use super::grid::{ButtonGrid, KnobGrid};
use super::mapping::{ColumnMapping, STEPS_PER_LANE};
use super::SeqError;

/// Gate length fired when an active step is entered (seconds)
pub const GATE_PULSE_DURATION: f32 = 1e-3;
/// Gate output level while the pulse is high (volts)
pub const GATE_HIGH_VOLTAGE: f32 = 10.0;
/// Steps per lane unless configured otherwise
pub const DEFAULT_LANE_LENGTH: usize = 8;

/// Position and length of one lane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneState {
    position: usize,
    length: usize,
}

impl LaneState {
    pub fn new(length: usize) -> Result<Self, SeqError> {
        let mut state = Self {
            position: 0,
            length: DEFAULT_LANE_LENGTH,
        };
        state.set_length(length)?;
        Ok(state)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Configured length; may be 0, see [`LaneState::cycle_length`]
    pub fn length(&self) -> usize {
        self.length
    }

    /// Length used for wrapping; a zero length behaves as a single step
    pub fn cycle_length(&self) -> usize {
        self.length.max(1)
    }

    /// Change the lane length. The position is left alone and wraps on the next advance.
    pub fn set_length(&mut self, length: usize) -> Result<(), SeqError> {
        if length > STEPS_PER_LANE {
            return Err(SeqError::LengthTooLong {
                length,
                max: STEPS_PER_LANE,
            });
        }
        self.length = length;
        Ok(())
    }

    /// Move to the next position. A reset wins over the advance.
    pub fn step(&mut self, advance: bool, reset: bool) -> usize {
        self.position = (self.position + usize::from(advance)) % self.cycle_length();
        if reset {
            self.position = 0;
        }
        self.position
    }
}

impl Default for LaneState {
    fn default() -> Self {
        Self {
            position: 0,
            length: DEFAULT_LANE_LENGTH,
        }
    }
}

/// A lane's state together with its private trigger and gate pulse
#[derive(Debug, Clone, Default)]
pub struct Lane {
    pub state: LaneState,
    pub reset_trigger: SchmittTrigger,
    pub gate_pulse: PulseGenerator,
}

impl Lane {
    pub fn new(length: usize) -> Result<Self, SeqError> {
        Ok(Self {
            state: LaneState::new(length)?,
            ..Self::default()
        })
    }
}

/// Per-sample inputs of one lane
#[derive(Debug, Clone, Copy)]
pub struct LaneInput {
    /// Shared clock edge for this sample
    pub advance: bool,
    /// Voltage at this lane's reset input
    pub reset_voltage: f32,
    /// Duration of one sample (seconds)
    pub sample_time: f32,
}

/// One LED message: button grid index and the state to display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedUpdate {
    pub button: usize,
    pub on: bool,
}

/// LED changes produced when a lane moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepLeds {
    /// Step being left, restored to its toggle state
    pub previous: LedUpdate,
    /// Step being entered, shown inverted to mark the playhead
    pub current: LedUpdate,
}

/// Result of one lane update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneStep {
    pub gate: f32,
    pub cv: f32,
    /// Set when the lane advanced or reset this sample
    pub leds: Option<StepLeds>,
}

/// Update one lane for one sample.
///
/// On error nothing is returned for this sample. The position may already
/// have moved; the caller keeps the lane's previous outputs.
pub fn advance_lane(
    lane: &mut Lane,
    mapping: &ColumnMapping,
    buttons: &ButtonGrid,
    knobs: &KnobGrid,
    input: LaneInput,
) -> Result<LaneStep, SeqError> {
    let reset = lane.reset_trigger.process(
        input.reset_voltage,
        TRIGGER_LOW_THRESHOLD,
        TRIGGER_HIGH_THRESHOLD,
    );
    let previous_button = mapping.button(lane.state.position())?;

    let position = lane.state.step(input.advance, reset);
    let current_button = mapping.button(position)?;
    let current_knob = mapping.knob(position)?;

    let mut leds = None;
    if input.advance || reset {
        let active = buttons.get(current_button)?;
        if active {
            lane.gate_pulse.trigger(GATE_PULSE_DURATION);
        }
        leds = Some(StepLeds {
            previous: LedUpdate {
                button: previous_button,
                on: buttons.get(previous_button)?,
            },
            current: LedUpdate {
                button: current_button,
                on: !active,
            },
        });
    }

    let gate = if lane.gate_pulse.process(input.sample_time) {
        GATE_HIGH_VOLTAGE
    } else {
        0.0
    };
    let cv = knobs.cv(current_knob)?;

    Ok(LaneStep { gate, cv, leds })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::mapping::LANE_MAPPINGS;
    use proptest::prelude::*;

    const DT: f32 = 1e-3;

    fn input(advance: bool, reset_voltage: f32) -> LaneInput {
        LaneInput {
            advance,
            reset_voltage,
            sample_time: DT,
        }
    }

    #[test]
    fn test_zero_length_is_one_step() {
        let mut state = LaneState::new(0).unwrap();
        assert_eq!(state.cycle_length(), 1);
        assert_eq!(state.step(true, false), 0);
        assert_eq!(state.step(true, false), 0);
    }

    #[test]
    fn test_length_above_steps_rejected() {
        assert_eq!(
            LaneState::new(9),
            Err(SeqError::LengthTooLong { length: 9, max: 8 })
        );
    }

    #[test]
    fn test_reset_overrides_advance() {
        let mut state = LaneState::new(8).unwrap();
        state.step(true, false);
        state.step(true, false);
        assert_eq!(state.step(true, true), 0);
    }

    proptest! {
        #[test]
        fn prop_position_wraps_modulo_length(length in 0usize..=8, advances in 0usize..200) {
            let mut state = LaneState::new(length).unwrap();
            for _ in 0..advances {
                state.step(true, false);
            }
            prop_assert_eq!(state.position(), advances % length.max(1));
        }
    }

    #[test]
    fn test_advance_into_active_step_fires_gate() {
        let mapping = &LANE_MAPPINGS[0];
        let mut buttons = ButtonGrid::new();
        let mut knobs = KnobGrid::new();
        buttons.set(4, true).unwrap(); // step 1 of lane 0
        knobs.set(20, 127).unwrap();

        let mut lane = Lane::new(8).unwrap();
        let step = advance_lane(&mut lane, mapping, &buttons, &knobs, input(true, 0.0)).unwrap();

        assert_eq!(lane.state.position(), 1);
        assert_eq!(step.gate, GATE_HIGH_VOLTAGE);
        assert_eq!(step.cv, 10.0);
        assert_eq!(
            step.leds,
            Some(StepLeds {
                previous: LedUpdate { button: 1, on: false },
                current: LedUpdate { button: 4, on: false },
            })
        );

        // 1 ms at 1 kHz: one sample high, then low
        let step = advance_lane(&mut lane, mapping, &buttons, &knobs, input(false, 0.0)).unwrap();
        assert_eq!(step.gate, 0.0);
        assert_eq!(step.leds, None);
    }

    #[test]
    fn test_inactive_step_shows_inverted_led_without_gate() {
        let mapping = &LANE_MAPPINGS[1];
        let mut buttons = ButtonGrid::new();
        buttons.set(2, true).unwrap(); // step 0 of lane 1, the one being left
        let knobs = KnobGrid::new();

        let mut lane = Lane::new(8).unwrap();
        let step = advance_lane(&mut lane, mapping, &buttons, &knobs, input(true, 0.0)).unwrap();

        assert_eq!(step.gate, 0.0);
        assert_eq!(
            step.leds,
            Some(StepLeds {
                previous: LedUpdate { button: 2, on: true },
                current: LedUpdate { button: 5, on: true },
            })
        );
    }

    #[test]
    fn test_reset_input_edge_returns_to_start() {
        let mapping = &LANE_MAPPINGS[0];
        let mut buttons = ButtonGrid::new();
        buttons.set(1, true).unwrap();
        let knobs = KnobGrid::new();
        let mut lane = Lane::new(8).unwrap();

        // Arm the reset trigger, then move forward twice
        advance_lane(&mut lane, mapping, &buttons, &knobs, input(true, 0.0)).unwrap();
        advance_lane(&mut lane, mapping, &buttons, &knobs, input(true, 0.0)).unwrap();
        assert_eq!(lane.state.position(), 2);

        let step = advance_lane(&mut lane, mapping, &buttons, &knobs, input(true, 5.0)).unwrap();
        assert_eq!(lane.state.position(), 0);
        assert_eq!(step.gate, GATE_HIGH_VOLTAGE);
        assert_eq!(step.leds.map(|l| l.previous.button), Some(7));
    }

    #[test]
    fn test_bad_mapping_reports_error() {
        let mapping = ColumnMapping::from_tables([1, 4, 7, 10, 13, 16, 19, 99], [16; 8]);
        let buttons = ButtonGrid::new();
        let knobs = KnobGrid::new();
        let mut lane = Lane::new(8).unwrap();

        for _ in 0..6 {
            advance_lane(&mut lane, &mapping, &buttons, &knobs, input(true, 0.0)).unwrap();
        }
        let err = advance_lane(&mut lane, &mapping, &buttons, &knobs, input(true, 0.0));
        assert!(matches!(err, Err(SeqError::IndexOutOfRange { index: 99, .. })));
    }
}
