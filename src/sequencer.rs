//! MIDI Mix step sequencer module
//!
//! [`MidiMixSeq`] is the module instance a host drives once per sample. Each
//! [`MidiMixSeq::process`] call:
//!
//! 1. drains the MIDI input queue up to the current frame, toggling buttons
//!    and storing knob values, and echoes button state to the controller;
//! 2. evaluates the shared clock input once;
//! 3. runs [`advance_lane`] for every configured lane and sends the
//!    playhead LEDs for lanes that moved.
//!
//! Faults on this path are logged and skipped; `process` never fails.

pub mod binding;
pub mod grid;
pub mod lane;
pub mod mapping;

mod feedback;
mod ingest;


use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dsp::{SchmittTrigger, TRIGGER_HIGH_THRESHOLD, TRIGGER_LOW_THRESHOLD};
use crate::midi::InputQueue;
use crate::transport::{MidiDriver, TransportError};

pub use binding::DeviceBinding;
pub use grid::{ButtonGrid, KnobGrid};
pub use lane::{advance_lane, Lane, LaneInput, LaneState, LaneStep, DEFAULT_LANE_LENGTH};
pub use mapping::{ColumnMapping, LANE_MAPPINGS, MAX_LANES, STEPS_PER_LANE};

/// Which grid an index refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridKind {
    Button,
    Knob,
}

impl fmt::Display for GridKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridKind::Button => write!(f, "button"),
            GridKind::Knob => write!(f, "knob"),
        }
    }
}

/// Sequencer faults. All of them are recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SeqError {
    #[error("{grid} index {index} out of range (grid has {len} entries)")]
    IndexOutOfRange {
        grid: GridKind,
        index: usize,
        len: usize,
    },

    #[error("step {step} out of range for a {len}-step column mapping")]
    StepOutOfRange { step: usize, len: usize },

    #[error("lane {lane} does not exist ({lanes} lanes configured)")]
    NoSuchLane { lane: usize, lanes: usize },

    #[error("lane count {0} not supported (1-3)")]
    InvalidLaneCount(usize),

    #[error("lane length {length} exceeds {max} steps")]
    LengthTooLong { length: usize, max: usize },

    #[error("note offset {0} out of range (must be -127..=127)")]
    NoteOffsetOutOfRange(i16),

    #[error("CC offset {0} out of range (must be -127..=127)")]
    CcOffsetOutOfRange(i16),
}

/// Largest note or CC offset in either direction
pub const MAX_OFFSET: i16 = 127;

/// Host-provided timing for one `process` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessArgs {
    /// Frame number of this sample
    pub frame: i64,
    pub sample_rate: f32,
    /// 1 / sample_rate
    pub sample_time: f32,
}

impl ProcessArgs {
    pub fn new(frame: i64, sample_rate: f32) -> Self {
        Self {
            frame,
            sample_rate,
            sample_time: 1.0 / sample_rate,
        }
    }
}

/// Input voltages for one sample
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Inputs {
    pub clock: f32,
    pub resets: [f32; MAX_LANES],
}

/// Output voltages after one sample
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Outputs {
    pub gates: [f32; MAX_LANES],
    pub cvs: [f32; MAX_LANES],
}

/// Module settings fixed at instantiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqSettings {
    /// Active lanes (1-3)
    pub lanes: usize,
    /// Length of each lane; entries past `lanes` are ignored
    pub lengths: [usize; MAX_LANES],
    /// Added to incoming note numbers to get the button index
    pub note_offset: i16,
    /// Subtracted from incoming CC numbers to get the knob index
    pub cc_offset: i16,
}

impl Default for SeqSettings {
    fn default() -> Self {
        Self {
            lanes: MAX_LANES,
            lengths: [DEFAULT_LANE_LENGTH; MAX_LANES],
            note_offset: 0,
            cc_offset: 0,
        }
    }
}

/// The sequencer module instance
pub struct MidiMixSeq {
    buttons: ButtonGrid,
    knobs: KnobGrid,
    lanes: [Lane; MAX_LANES],
    mappings: [ColumnMapping; MAX_LANES],
    lane_count: usize,
    clock_trigger: SchmittTrigger,
    outputs: Outputs,
    input: Arc<InputQueue>,
    binding: DeviceBinding,
    frame: i64,
    note_offset: i16,
    cc_offset: i16,
}

impl MidiMixSeq {
    pub fn new(settings: &SeqSettings) -> Result<Self, SeqError> {
        Self::with_mappings(settings, LANE_MAPPINGS)
    }

    /// Build with custom column mappings, e.g. for a controller with a different layout
    pub fn with_mappings(
        settings: &SeqSettings,
        mappings: [ColumnMapping; MAX_LANES],
    ) -> Result<Self, SeqError> {
        if settings.lanes == 0 || settings.lanes > MAX_LANES {
            return Err(SeqError::InvalidLaneCount(settings.lanes));
        }
        if !(-MAX_OFFSET..=MAX_OFFSET).contains(&settings.note_offset) {
            return Err(SeqError::NoteOffsetOutOfRange(settings.note_offset));
        }
        if !(-MAX_OFFSET..=MAX_OFFSET).contains(&settings.cc_offset) {
            return Err(SeqError::CcOffsetOutOfRange(settings.cc_offset));
        }

        let mut lanes: [Lane; MAX_LANES] = Default::default();
        for (lane, &length) in lanes.iter_mut().zip(&settings.lengths).take(settings.lanes) {
            *lane = Lane::new(length)?;
        }

        debug!(
            "Sequencer created: {} lanes, lengths {:?}",
            settings.lanes,
            &settings.lengths[..settings.lanes]
        );

        Ok(Self {
            buttons: ButtonGrid::new(),
            knobs: KnobGrid::new(),
            lanes,
            mappings,
            lane_count: settings.lanes,
            clock_trigger: SchmittTrigger::new(),
            outputs: Outputs::default(),
            input: Arc::new(InputQueue::default()),
            binding: DeviceBinding::new(),
            frame: 0,
            note_offset: settings.note_offset,
            cc_offset: settings.cc_offset,
        })
    }

    /// Run one sample
    pub fn process(&mut self, args: &ProcessArgs, inputs: &Inputs) -> &Outputs {
        self.frame = args.frame;
        self.input.set_frame(args.frame);

        self.ingest();

        let advance =
            self.clock_trigger
                .process(inputs.clock, TRIGGER_LOW_THRESHOLD, TRIGGER_HIGH_THRESHOLD);

        for index in 0..self.lane_count {
            let input = LaneInput {
                advance,
                reset_voltage: inputs.resets[index],
                sample_time: args.sample_time,
            };
            self.process_lane(index, input);
        }

        &self.outputs
    }

    fn process_lane(&mut self, index: usize, input: LaneInput) {
        let lane = &mut self.lanes[index];
        let mapping = &self.mappings[index];

        match advance_lane(lane, mapping, &self.buttons, &self.knobs, input) {
            Ok(step) => {
                self.outputs.gates[index] = step.gate;
                self.outputs.cvs[index] = step.cv;
                if let Some(leds) = step.leds {
                    self.send_led(leds.previous.button, leds.previous.on);
                    self.send_led(leds.current.button, leds.current.on);
                }
            }
            // Outputs keep their previous values
            Err(e) => warn!("Lane {}: {}", index + 1, e),
        }
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn buttons(&self) -> &ButtonGrid {
        &self.buttons
    }

    pub fn knobs(&self) -> &KnobGrid {
        &self.knobs
    }

    pub fn lane_count(&self) -> usize {
        self.lane_count
    }

    pub fn lane(&self, index: usize) -> Option<&LaneState> {
        self.lanes[..self.lane_count].get(index).map(|l| &l.state)
    }

    /// Change a lane's length (0-8; 0 plays a single step)
    pub fn set_lane_length(&mut self, index: usize, length: usize) -> Result<(), SeqError> {
        let lanes = self.lane_count;
        let lane = self.lanes[..lanes]
            .get_mut(index)
            .ok_or(SeqError::NoSuchLane { lane: index, lanes })?;
        lane.state.set_length(length)
    }

    /// Frame of the last `process` call
    pub fn frame(&self) -> i64 {
        self.frame
    }

    /// Queue the input subscription writes into
    pub fn input_queue(&self) -> &Arc<InputQueue> {
        &self.input
    }

    pub fn binding(&self) -> &DeviceBinding {
        &self.binding
    }

    /// Select a driver, releasing the previous driver's devices
    pub fn select_driver(&mut self, driver: Arc<dyn MidiDriver>) {
        self.binding.set_driver(driver);
    }

    /// Bind input device `id` to this module's queue
    pub fn subscribe_input(&mut self, id: usize) -> Result<(), TransportError> {
        let queue = Arc::clone(&self.input);
        self.binding.subscribe_input(id, queue)
    }

    pub fn unsubscribe_input(&mut self) {
        self.binding.release_input();
    }

    /// Bind output device `id` and push the whole button grid to it
    pub fn subscribe_output(&mut self, id: usize) -> Result<(), TransportError> {
        self.binding.subscribe_output(id)?;
        self.sync_buttons();
        Ok(())
    }

    pub fn unsubscribe_output(&mut self) {
        self.binding.release_output();
    }
}

impl Drop for MidiMixSeq {
    fn drop(&mut self) {
        self.binding.release_all();
        let dropped = self.input.drain();
        if dropped > 0 {
            info!("Discarded {} pending MIDI messages", dropped);
        }
    }
}

impl fmt::Debug for MidiMixSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MidiMixSeq")
            .field("lanes", &&self.lanes[..self.lane_count])
            .field("frame", &self.frame)
            .field("outputs", &self.outputs)
            .field("binding", &self.binding)
            .finish()
    }
}
