//! LED feedback to the controller

use tracing::info;

use crate::midi::Message;

/// Device note number for a button grid index
pub(crate) fn button_to_note(button: usize, note_offset: i16) -> Option<u8> {
    let note = i16::try_from(button).ok()?.checked_sub(note_offset)?;
    u8::try_from(note).ok().filter(|n| *n <= 0x7F)
}

impl super::MidiMixSeq {
    /// Show `on` on a button's LED; skipped when no output is bound
    pub(super) fn send_led(&mut self, button: usize, on: bool) {
        if let Some(note) = button_to_note(button, self.note_offset) {
            self.binding.send(&Message::led(note, on, self.frame));
        }
    }

    /// Send every button's toggle state, in index order
    pub fn sync_buttons(&mut self) {
        if !self.binding.has_output() {
            return;
        }

        let snapshot = self.buttons.clone();
        for (index, on) in snapshot.iter() {
            self.send_led(index, on);
        }
        info!("Synced {} button LEDs", snapshot.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_to_note() {
        assert_eq!(button_to_note(0, 0), Some(0));
        assert_eq!(button_to_note(1, -1), Some(2));
        assert_eq!(button_to_note(0, 1), None);
        assert_eq!(button_to_note(127, -1), None);
        assert_eq!(button_to_note(1, i16::MIN), None);
    }
}
