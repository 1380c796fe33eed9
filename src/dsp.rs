//! Trigger and pulse primitives shared by the sequencer lanes

/// Lower hysteresis threshold for clock and reset inputs (volts)
pub const TRIGGER_LOW_THRESHOLD: f32 = 0.1;
/// Upper hysteresis threshold for clock and reset inputs (volts)
pub const TRIGGER_HIGH_THRESHOLD: f32 = 2.0;

/// Schmitt trigger with hysteresis.
///
/// Reports a rising edge when the input reaches the high threshold after
/// having fallen to the low threshold. Starts in the high state, so a signal
/// that is already high when the module is created does not fire.
#[derive(Debug, Clone, Copy)]
pub struct SchmittTrigger {
    high: bool,
}

impl SchmittTrigger {
    pub fn new() -> Self {
        Self { high: true }
    }

    /// Process a sample; returns true on a low-to-high transition
    pub fn process(&mut self, input: f32, low_threshold: f32, high_threshold: f32) -> bool {
        if self.high {
            if input <= low_threshold {
                self.high = false;
            }
        } else if input >= high_threshold {
            self.high = true;
            return true;
        }
        false
    }
}

impl Default for SchmittTrigger {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds a signal high for a duration measured in elapsed process time
#[derive(Debug, Clone, Copy, Default)]
pub struct PulseGenerator {
    remaining: f32,
}

impl PulseGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the pulse for `duration` seconds.
    ///
    /// Extends a running pulse but never shortens it.
    pub fn trigger(&mut self, duration: f32) {
        if duration > self.remaining {
            self.remaining = duration;
        }
    }

    /// Advance by `delta_time` seconds; returns whether the pulse is high for this sample
    pub fn process(&mut self, delta_time: f32) -> bool {
        if self.remaining > 0.0 {
            self.remaining -= delta_time;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schmitt_requires_low_before_edge() {
        let mut trigger = SchmittTrigger::new();

        // Already high at power-up: no edge
        assert!(!trigger.process(5.0, TRIGGER_LOW_THRESHOLD, TRIGGER_HIGH_THRESHOLD));
        assert!(!trigger.process(0.0, TRIGGER_LOW_THRESHOLD, TRIGGER_HIGH_THRESHOLD));
        assert!(trigger.process(5.0, TRIGGER_LOW_THRESHOLD, TRIGGER_HIGH_THRESHOLD));
        // Held high: fires once
        assert!(!trigger.process(5.0, TRIGGER_LOW_THRESHOLD, TRIGGER_HIGH_THRESHOLD));
    }

    #[test]
    fn test_schmitt_hysteresis_band() {
        let mut trigger = SchmittTrigger::new();
        trigger.process(0.0, TRIGGER_LOW_THRESHOLD, TRIGGER_HIGH_THRESHOLD);
        assert!(trigger.process(2.0, TRIGGER_LOW_THRESHOLD, TRIGGER_HIGH_THRESHOLD));

        // Dipping into the band does not re-arm
        assert!(!trigger.process(1.0, TRIGGER_LOW_THRESHOLD, TRIGGER_HIGH_THRESHOLD));
        assert!(!trigger.process(2.5, TRIGGER_LOW_THRESHOLD, TRIGGER_HIGH_THRESHOLD));

        assert!(!trigger.process(0.1, TRIGGER_LOW_THRESHOLD, TRIGGER_HIGH_THRESHOLD));
        assert!(!trigger.process(1.9, TRIGGER_LOW_THRESHOLD, TRIGGER_HIGH_THRESHOLD));
        assert!(trigger.process(2.1, TRIGGER_LOW_THRESHOLD, TRIGGER_HIGH_THRESHOLD));
    }

    #[test]
    fn test_pulse_duration_in_samples() {
        let mut pulse = PulseGenerator::new();
        pulse.trigger(1e-3);

        // 1 kHz: exactly one sample high
        assert!(pulse.process(1e-3));
        assert!(!pulse.process(1e-3));
    }

    #[test]
    fn test_pulse_never_shortened() {
        let mut pulse = PulseGenerator::new();
        pulse.trigger(0.5);
        pulse.trigger(0.25);

        assert!(pulse.process(0.4));
        assert!(pulse.process(0.05));
        assert!(pulse.process(0.1));
        assert!(!pulse.process(0.1));
    }
}
