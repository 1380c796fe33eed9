//! MidiMix-Seq: a three-lane gate/CV step sequencer played from a MIDI Mix
//! style control surface.
//!
//! The 8x3 button grid toggles steps, the knob above each button sets that
//! step's CV, and the button LEDs show both the toggle state and each lane's
//! playhead. [`sequencer::MidiMixSeq`] is the per-sample module; [`host`]
//! runs it standalone.

pub mod cli;
pub mod config;
pub mod dsp;
pub mod host;
pub mod midi;
pub mod sequencer;
pub mod transport;
