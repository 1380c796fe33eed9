//! Button toggle grid and knob value grid
//!
//! Both grids are indexed by physical control number. Every accessor is
//! bounds-checked and reports a [`SeqError`] instead of panicking, so callers
//! on the audio thread can log and carry on.

use super::mapping::{BUTTON_COUNT, KNOB_COUNT};
use super::{GridKind, SeqError};

/// Full-scale CV output for a knob at 127 (volts)
pub const CV_FULL_SCALE: f32 = 10.0;

/// Toggle state of every controller button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonGrid {
    states: [bool; BUTTON_COUNT],
}

impl ButtonGrid {
    pub fn new() -> Self {
        Self {
            states: [false; BUTTON_COUNT],
        }
    }

    pub fn get(&self, index: usize) -> Result<bool, SeqError> {
        self.states
            .get(index)
            .copied()
            .ok_or(SeqError::IndexOutOfRange {
                grid: GridKind::Button,
                index,
                len: BUTTON_COUNT,
            })
    }

    pub fn set(&mut self, index: usize, on: bool) -> Result<(), SeqError> {
        let state = self.states.get_mut(index).ok_or(SeqError::IndexOutOfRange {
            grid: GridKind::Button,
            index,
            len: BUTTON_COUNT,
        })?;
        *state = on;
        Ok(())
    }

    /// Flip a button and return its new state
    pub fn toggle(&mut self, index: usize) -> Result<bool, SeqError> {
        let state = self.states.get_mut(index).ok_or(SeqError::IndexOutOfRange {
            grid: GridKind::Button,
            index,
            len: BUTTON_COUNT,
        })?;
        *state = !*state;
        Ok(*state)
    }

    /// Iterate `(index, state)` in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, bool)> + '_ {
        self.states.iter().copied().enumerate()
    }

    pub fn len(&self) -> usize {
        BUTTON_COUNT
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for ButtonGrid {
    fn default() -> Self {
        Self::new()
    }
}

/// Last received 7-bit value of every knob and fader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnobGrid {
    values: [u8; KNOB_COUNT],
}

impl KnobGrid {
    pub fn new() -> Self {
        Self {
            values: [0; KNOB_COUNT],
        }
    }

    pub fn get(&self, index: usize) -> Result<u8, SeqError> {
        self.values
            .get(index)
            .copied()
            .ok_or(SeqError::IndexOutOfRange {
                grid: GridKind::Knob,
                index,
                len: KNOB_COUNT,
            })
    }

    /// Store a value, masked to 7 bits
    pub fn set(&mut self, index: usize, value: u8) -> Result<(), SeqError> {
        let slot = self.values.get_mut(index).ok_or(SeqError::IndexOutOfRange {
            grid: GridKind::Knob,
            index,
            len: KNOB_COUNT,
        })?;
        *slot = value & 0x7F;
        Ok(())
    }

    /// Control voltage for a knob: 0-127 mapped linearly onto 0-10 V
    pub fn cv(&self, index: usize) -> Result<f32, SeqError> {
        self.get(index).map(value_to_cv)
    }

    pub fn len(&self) -> usize {
        KNOB_COUNT
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for KnobGrid {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a 7-bit MIDI value to volts
pub fn value_to_cv(value: u8) -> f32 {
    value as f32 / 127.0 * CV_FULL_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_twice_restores() {
        let mut grid = ButtonGrid::new();
        assert_eq!(grid.toggle(4), Ok(true));
        assert_eq!(grid.toggle(4), Ok(false));
        assert_eq!(grid.get(4), Ok(false));
    }

    #[test]
    fn test_button_out_of_range() {
        let mut grid = ButtonGrid::new();
        let err = grid.toggle(255).unwrap_err();
        assert_eq!(
            err,
            SeqError::IndexOutOfRange {
                grid: GridKind::Button,
                index: 255,
                len: BUTTON_COUNT,
            }
        );
        assert!(grid.iter().all(|(_, on)| !on));
    }

    #[test]
    fn test_knob_masks_to_seven_bits() {
        let mut grid = KnobGrid::new();
        grid.set(16, 0xFF).unwrap();
        assert_eq!(grid.get(16), Ok(127));
        assert!(grid.set(KNOB_COUNT, 1).is_err());
    }

    #[test]
    fn test_cv_boundaries() {
        assert_eq!(value_to_cv(0), 0.0);
        assert_eq!(value_to_cv(127), 10.0);
        assert!((value_to_cv(64) - 64.0 / 127.0 * 10.0).abs() < f32::EPSILON);
    }
}
