//! Column mapping between sequencer steps and physical controls
//!
//! The controller has eight columns. Each column carries three buttons
//! (numbered consecutively from 1, three per column) and four CCs: three
//! knobs and a fader. Lane `k` uses row `k` of every column, so step `n` of
//! lane `k` is the button and knob in column `n`, row `k`.

use super::SeqError;

/// Steps in one lane (one per controller column)
pub const STEPS_PER_LANE: usize = 8;
/// Lanes the controller layout can host (one per button row)
pub const MAX_LANES: usize = 3;
/// Entries in the button toggle grid
pub const BUTTON_COUNT: usize = 25;
/// Entries in the knob value grid
pub const KNOB_COUNT: usize = 63;

/// Note number of the first button of the first column
const BUTTON_BASE: u8 = 1;
/// Note distance between two columns
const BUTTON_COLUMN_STRIDE: u8 = 3;
/// CC number of the top knob of every column
const KNOB_COLUMN_BASE: [u8; STEPS_PER_LANE] = [16, 20, 24, 28, 46, 50, 54, 58];

/// Physical button and knob index for every step of one lane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMapping {
    buttons: [u8; STEPS_PER_LANE],
    knobs: [u8; STEPS_PER_LANE],
}

impl ColumnMapping {
    /// Derive the mapping for a button row of the controller
    pub const fn for_row(row: u8) -> Self {
        let mut buttons = [0u8; STEPS_PER_LANE];
        let mut knobs = [0u8; STEPS_PER_LANE];
        let mut column = 0;
        while column < STEPS_PER_LANE {
            buttons[column] = BUTTON_BASE + BUTTON_COLUMN_STRIDE * column as u8 + row;
            knobs[column] = KNOB_COLUMN_BASE[column] + row;
            column += 1;
        }
        Self { buttons, knobs }
    }

    /// Build a mapping from explicit tables
    pub const fn from_tables(buttons: [u8; STEPS_PER_LANE], knobs: [u8; STEPS_PER_LANE]) -> Self {
        Self { buttons, knobs }
    }

    /// Button grid index for a step
    pub fn button(&self, step: usize) -> Result<usize, SeqError> {
        self.buttons
            .get(step)
            .map(|&b| b as usize)
            .ok_or(SeqError::StepOutOfRange {
                step,
                len: STEPS_PER_LANE,
            })
    }

    /// Knob grid index for a step
    pub fn knob(&self, step: usize) -> Result<usize, SeqError> {
        self.knobs
            .get(step)
            .map(|&k| k as usize)
            .ok_or(SeqError::StepOutOfRange {
                step,
                len: STEPS_PER_LANE,
            })
    }

    pub fn buttons(&self) -> &[u8; STEPS_PER_LANE] {
        &self.buttons
    }

    pub fn knobs(&self) -> &[u8; STEPS_PER_LANE] {
        &self.knobs
    }
}

/// Mappings for every lane, built at compile time
pub const LANE_MAPPINGS: [ColumnMapping; MAX_LANES] = [
    ColumnMapping::for_row(0),
    ColumnMapping::for_row(1),
    ColumnMapping::for_row(2),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_lane_layout() {
        let mapping = &LANE_MAPPINGS[0];
        assert_eq!(mapping.buttons(), &[1, 4, 7, 10, 13, 16, 19, 22]);
        assert_eq!(mapping.knobs(), &[16, 20, 24, 28, 46, 50, 54, 58]);
    }

    #[test]
    fn test_lanes_are_column_offsets() {
        assert_eq!(LANE_MAPPINGS[1].buttons(), &[2, 5, 8, 11, 14, 17, 20, 23]);
        assert_eq!(LANE_MAPPINGS[2].buttons(), &[3, 6, 9, 12, 15, 18, 21, 24]);
        assert_eq!(LANE_MAPPINGS[2].knobs(), &[18, 22, 26, 30, 48, 52, 56, 60]);
    }

    #[test]
    fn test_all_indices_fit_the_grids() {
        for mapping in &LANE_MAPPINGS {
            assert!(mapping.buttons().iter().all(|&b| (b as usize) < BUTTON_COUNT));
            assert!(mapping.knobs().iter().all(|&k| (k as usize) < KNOB_COUNT));
        }
    }

    #[test]
    fn test_step_out_of_range() {
        assert_eq!(LANE_MAPPINGS[0].button(7), Ok(22));
        assert_eq!(
            LANE_MAPPINGS[0].button(8),
            Err(SeqError::StepOutOfRange { step: 8, len: 8 })
        );
        assert!(LANE_MAPPINGS[0].knob(99).is_err());
    }
}
