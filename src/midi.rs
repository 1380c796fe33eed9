//! MIDI utilities and message types
//!
//! Provides the frame-stamped channel message used between the transport and
//! the sequencer, plus parsing, encoding and formatting helpers.

pub mod queue;

use std::fmt;

pub use queue::InputQueue;

/// Status nibble of Note On messages (the controller's button press)
pub const STATUS_NOTE_ON: u8 = 0x9;
/// Status nibble of Control Change messages (knobs and faders)
pub const STATUS_CONTROL_CHANGE: u8 = 0xB;

/// A channel-voice MIDI message stamped with the engine frame it belongs to.
///
/// System messages are never represented; the controller only sends notes
/// and control changes and the sequencer only answers with notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    /// Full status byte (type nibble and channel)
    pub status: u8,
    /// First data byte (note or CC number)
    pub data1: u8,
    /// Second data byte (velocity or CC value)
    pub data2: u8,
    /// Engine frame this message is scheduled for
    pub frame: i64,
}

/// Classified view of a [`Message`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    /// Note On: channel (0-15), note (0-127), value (0-127)
    NoteOn { channel: u8, note: u8, value: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// Any other channel message
    Other { status: u8 },
}

impl Message {
    /// Build a note message on channel 1, as used for LED feedback.
    ///
    /// `on` maps to a value of 1 and `off` to 0; the controller lights the
    /// button for any non-zero value.
    pub fn led(note: u8, on: bool, frame: i64) -> Self {
        Self {
            status: STATUS_NOTE_ON << 4,
            data1: note & 0x7F,
            data2: u8::from(on),
            frame,
        }
    }

    /// Parse a message from raw bytes.
    ///
    /// Returns `None` for empty input, running status, system messages and
    /// truncated messages.
    pub fn parse(data: &[u8], frame: i64) -> Option<Self> {
        let status = *data.first()?;

        // Running status would need per-port state; system messages are unused
        if !(0x80..0xF0).contains(&status) {
            return None;
        }

        let needed = Self::data_len(status);
        if data.len() < needed + 1 {
            return None;
        }

        Some(Self {
            status,
            data1: data.get(1).copied().unwrap_or(0) & 0x7F,
            data2: if needed == 2 { data[2] & 0x7F } else { 0 },
            frame,
        })
    }

    /// Number of data bytes that follow a channel status byte
    fn data_len(status: u8) -> usize {
        match status >> 4 {
            0xC | 0xD => 1,
            _ => 2,
        }
    }

    /// Status type nibble (0x8-0xE)
    pub fn status_nibble(&self) -> u8 {
        self.status >> 4
    }

    /// Channel (0-15)
    pub fn channel(&self) -> u8 {
        self.status & 0x0F
    }

    /// Note or CC number
    pub fn note(&self) -> u8 {
        self.data1
    }

    /// Velocity or CC value
    pub fn value(&self) -> u8 {
        self.data2
    }

    /// Classify the message.
    ///
    /// A Note On with value 0 is still a Note On here: the status nibble alone
    /// decides, which is what the controller's button handling relies on.
    pub fn event(&self) -> MidiEvent {
        match self.status_nibble() {
            STATUS_NOTE_ON => MidiEvent::NoteOn {
                channel: self.channel(),
                note: self.data1,
                value: self.data2,
            },
            STATUS_CONTROL_CHANGE => MidiEvent::ControlChange {
                channel: self.channel(),
                cc: self.data1,
                value: self.data2,
            },
            _ => MidiEvent::Other { status: self.status },
        }
    }

    /// Encode into a stack buffer; returns the buffer and the used length
    pub fn encode(&self) -> ([u8; 3], usize) {
        let len = Self::data_len(self.status) + 1;
        ([self.status, self.data1 & 0x7F, self.data2 & 0x7F], len)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.event() {
            MidiEvent::NoteOn { channel, note, value } => {
                write!(f, "NoteOn ch:{} n:{} v:{} @{}", channel + 1, note, value, self.frame)
            }
            MidiEvent::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{} @{}", channel + 1, cc, value, self.frame)
            }
            MidiEvent::Other { status } => {
                write!(f, "Status {:02X} {} {} @{}", status, self.data1, self.data2, self.frame)
            }
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_parsing() {
        let msg = Message::parse(&[0x90, 3, 127], 12).unwrap();

        assert_eq!(msg.status_nibble(), STATUS_NOTE_ON);
        assert_eq!(msg.frame, 12);
        assert_eq!(
            msg.event(),
            MidiEvent::NoteOn {
                channel: 0,
                note: 3,
                value: 127,
            }
        );
    }

    #[test]
    fn test_note_on_velocity_zero_stays_note_on() {
        let msg = Message::parse(&[0x90, 3, 0], 0).unwrap();
        assert!(matches!(msg.event(), MidiEvent::NoteOn { note: 3, value: 0, .. }));
    }

    #[test]
    fn test_control_change() {
        let msg = Message::parse(&[0xB2, 19, 100], 0).unwrap();

        assert_eq!(
            msg.event(),
            MidiEvent::ControlChange {
                channel: 2,
                cc: 19,
                value: 100,
            }
        );
    }

    #[test]
    fn test_rejects_system_and_short_messages() {
        assert!(Message::parse(&[], 0).is_none());
        assert!(Message::parse(&[0xF8], 0).is_none());
        assert!(Message::parse(&[0x40, 1, 2], 0).is_none());
        assert!(Message::parse(&[0x90, 1], 0).is_none());
    }

    #[test]
    fn test_program_change_is_two_bytes() {
        let msg = Message::parse(&[0xC0, 5], 0).unwrap();
        assert_eq!(msg.event(), MidiEvent::Other { status: 0xC0 });

        let (bytes, len) = msg.encode();
        assert_eq!(&bytes[..len], &[0xC0, 5]);
    }

    #[test]
    fn test_encode_led() {
        let (bytes, len) = Message::led(22, true, 0).encode();
        assert_eq!(&bytes[..len], &[0x90, 22, 1]);

        let (bytes, len) = Message::led(22, false, 0).encode();
        assert_eq!(&bytes[..len], &[0x90, 22, 0]);
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0x90, 0x16, 0x01]), "90 16 01");
    }
}
