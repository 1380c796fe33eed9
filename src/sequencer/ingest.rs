//! Event ingestion: controller messages into grid state
//!
//! Button presses toggle the pressed button and echo the new state back so
//! the LED follows. Knob and fader moves store their value. Everything else
//! is ignored.

use tracing::{debug, trace, warn};

use crate::midi::MidiEvent;

/// Button grid index for a device note number
pub(crate) fn note_to_button(note: u8, note_offset: i16) -> Option<usize> {
    let index = i16::from(note).checked_add(note_offset)?;
    usize::try_from(index).ok()
}

/// Knob grid index for a device CC number
pub(crate) fn cc_to_knob(cc: u8, cc_offset: i16) -> Option<usize> {
    let index = i16::from(cc).checked_sub(cc_offset)?;
    usize::try_from(index).ok()
}

impl super::MidiMixSeq {
    /// Drain every message due at the current frame, oldest first
    pub(super) fn ingest(&mut self) {
        while let Some(message) = self.input.try_pop(self.frame) {
            match message.event() {
                MidiEvent::NoteOn { note, .. } => self.toggle_button(note),
                MidiEvent::ControlChange { cc, value, .. } => self.store_knob(cc, value),
                MidiEvent::Other { status } => {
                    trace!("Ignoring MIDI status {:02X}", status);
                }
            }
        }
    }

    fn toggle_button(&mut self, note: u8) {
        let Some(index) = note_to_button(note, self.note_offset) else {
            warn!("Ignoring note {}: no button for this note", note);
            return;
        };

        match self.buttons.toggle(index) {
            Ok(on) => {
                debug!("Button {} -> {}", index, if on { "on" } else { "off" });
                self.send_led(index, on);
            }
            Err(e) => warn!("Ignoring note {}: {}", note, e),
        }
    }

    fn store_knob(&mut self, cc: u8, value: u8) {
        let Some(index) = cc_to_knob(cc, self.cc_offset) else {
            warn!("Ignoring CC {}: no knob for this CC", cc);
            return;
        };

        if let Err(e) = self.knobs.set(index, value) {
            warn!("Ignoring CC {}: {}", cc, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets() {
        assert_eq!(note_to_button(1, 0), Some(1));
        assert_eq!(note_to_button(0, -1), None);
        assert_eq!(note_to_button(2, -1), Some(1));
        assert_eq!(cc_to_knob(19, 16), Some(3));
        assert_eq!(cc_to_knob(3, 16), None);
        assert_eq!(note_to_button(1, i16::MAX), None);
        assert_eq!(cc_to_knob(1, i16::MIN), None);
    }
}
