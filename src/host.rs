//! Standalone software host
//!
//! Stands in for a modular rack: renders the sequencer in blocks of samples
//! on a tokio interval, patches an internal square-wave clock into the clock
//! input, and pulses the reset inputs on request.

use anyhow::Result;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::HostConfig;
use crate::dsp::PulseGenerator;
use crate::sequencer::{Inputs, MidiMixSeq, Outputs, ProcessArgs, MAX_LANES};

/// Clock and reset pulse level (volts)
pub const PULSE_VOLTAGE: f32 = 10.0;
/// Length of a reset pulse requested from the menu (seconds)
pub const RESET_PULSE_DURATION: f32 = 1e-3;
/// Smallest CV change worth reporting (volts)
const CV_REPORT_THRESHOLD: f32 = 1e-3;

/// Square-wave clock. Each period starts with its low part.
#[derive(Debug, Clone)]
pub struct ClockSource {
    frequency: f32,
    pulse_width: f32,
    phase: f32,
}

impl ClockSource {
    pub fn new(frequency: f32, pulse_width: f32) -> Self {
        Self {
            frequency,
            pulse_width: pulse_width.clamp(0.0, 1.0),
            phase: 0.0,
        }
    }

    /// Voltage for the current sample; advances the phase by one sample
    pub fn sample(&mut self, sample_time: f32) -> f32 {
        let voltage = if self.phase >= 1.0 - self.pulse_width {
            PULSE_VOLTAGE
        } else {
            0.0
        };
        self.phase += self.frequency * sample_time;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }
        voltage
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }
}

/// Pending reset requests, one flag per lane. Shared with the menu thread.
#[derive(Debug, Default)]
pub struct ResetRequests {
    pending: [AtomicBool; MAX_LANES],
}

impl ResetRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a reset pulse on `lane`; false if there is no such lane
    pub fn request(&self, lane: usize) -> bool {
        match self.pending.get(lane) {
            Some(flag) => {
                flag.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Take the request for `lane`, clearing it
    pub fn take(&self, lane: usize) -> bool {
        self.pending
            .get(lane)
            .is_some_and(|flag| flag.swap(false, Ordering::AcqRel))
    }
}

/// Gate edges seen during one block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockReport {
    pub frames: usize,
    pub gate_rises: [usize; MAX_LANES],
}

/// Follows the outputs and logs what changed
#[derive(Debug, Clone, Default)]
pub struct OutputMonitor {
    last: Outputs,
    reported_cvs: [f32; MAX_LANES],
}

impl OutputMonitor {
    /// Record one sample; returns the lanes whose gate went high
    pub fn observe(&mut self, outputs: &Outputs) -> [bool; MAX_LANES] {
        let mut rises = [false; MAX_LANES];
        for (lane, rise) in rises.iter_mut().enumerate() {
            *rise = self.last.gates[lane] <= 0.0 && outputs.gates[lane] > 0.0;
        }
        self.last = *outputs;
        rises
    }

    /// Log CV changes since the last call
    pub fn report_cvs(&mut self, lanes: usize) {
        for lane in 0..lanes {
            let cv = self.last.cvs[lane];
            if (cv - self.reported_cvs[lane]).abs() >= CV_REPORT_THRESHOLD {
                debug!("Lane {} CV {:.3} V", lane + 1, cv);
                self.reported_cvs[lane] = cv;
            }
        }
    }
}

/// Drives a shared [`MidiMixSeq`] in real time
pub struct SoftwareHost {
    module: Arc<Mutex<MidiMixSeq>>,
    sample_rate: f32,
    block_size: usize,
    frame: i64,
    clock: ClockSource,
    resets: Arc<ResetRequests>,
    reset_pulses: [PulseGenerator; MAX_LANES],
    monitor: OutputMonitor,
}

impl SoftwareHost {
    pub fn new(module: Arc<Mutex<MidiMixSeq>>, config: &HostConfig) -> Self {
        Self {
            module,
            sample_rate: config.sample_rate as f32,
            block_size: config.block_size,
            frame: 0,
            clock: ClockSource::new(config.clock_hz, config.clock_pulse_width),
            resets: Arc::new(ResetRequests::new()),
            reset_pulses: Default::default(),
            monitor: OutputMonitor::default(),
        }
    }

    /// Handle for requesting reset pulses from another thread
    pub fn reset_requests(&self) -> Arc<ResetRequests> {
        Arc::clone(&self.resets)
    }

    pub fn frame(&self) -> i64 {
        self.frame
    }

    /// Wall-clock length of one block
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.block_size as f64 / self.sample_rate as f64)
    }

    /// Render one block of samples with the module locked once
    pub fn render_block(&mut self) -> BlockReport {
        let sample_time = 1.0 / self.sample_rate;
        let mut report = BlockReport {
            frames: self.block_size,
            ..BlockReport::default()
        };

        for (lane, pulse) in self.reset_pulses.iter_mut().enumerate() {
            if self.resets.take(lane) {
                debug!("Reset pulse on lane {}", lane + 1);
                pulse.trigger(RESET_PULSE_DURATION);
            }
        }

        let mut module = self.module.lock();
        let lanes = module.lane_count();

        for _ in 0..self.block_size {
            let mut inputs = Inputs {
                clock: self.clock.sample(sample_time),
                ..Inputs::default()
            };
            for (voltage, pulse) in inputs.resets.iter_mut().zip(&mut self.reset_pulses) {
                if pulse.process(sample_time) {
                    *voltage = PULSE_VOLTAGE;
                }
            }

            let args = ProcessArgs::new(self.frame, self.sample_rate);
            let outputs = *module.process(&args, &inputs);
            self.frame += 1;

            let rises = self.monitor.observe(&outputs);
            for (lane, rose) in rises.iter().enumerate().take(lanes) {
                if *rose {
                    report.gate_rises[lane] += 1;
                    debug!("Lane {} gate at frame {}", lane + 1, args.frame);
                }
            }
        }
        drop(module);

        self.monitor.report_cvs(lanes);
        report
    }

    /// Render blocks in real time until `shutdown` completes
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let mut ticker = interval(self.block_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "🎛️  Host running: {} Hz, {} frames per block, clock {} Hz",
            self.sample_rate,
            self.block_size,
            self.clock.frequency()
        );

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.render_block();
                }
                _ = &mut shutdown => {
                    info!("Host stopping at frame {}", self.frame);
                    break;
                }
            }
        }

        Ok(())
    }
}
