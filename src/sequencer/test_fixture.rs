// Purely for testing: a sequencer device that records what it was asked to do.

use super::playback::SequencerDevice;
use super::track::TimedEvent;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Open,
    TempoBpm(f32),
    TempoFactor(f32),
    Load(usize), // number of events
    LoopContinuous,
    Start,
    Stop,
}

#[derive(Debug)]
pub struct RecordingDevice {
    pub calls: Vec<DeviceCall>,
    pub fail_open: bool,
    pub fail_start: bool,
    pub factor: f32,
    pub running: bool,
    pub sequence: Vec<TimedEvent>,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            fail_open: false,
            fail_start: false,
            factor: 1.0,
            running: false,
            sequence: Vec::new(),
        }
    }
}

impl SequencerDevice for RecordingDevice {
    fn open(&mut self) -> Result<()> {
        self.calls.push(DeviceCall::Open);
        if self.fail_open {
            return Err(Error::Device("no sequencer available".into()));
        }
        Ok(())
    }

    fn set_tempo_bpm(&mut self, bpm: f32) {
        self.calls.push(DeviceCall::TempoBpm(bpm));
    }

    fn tempo_factor(&self) -> f32 {
        self.factor
    }

    fn set_tempo_factor(&mut self, factor: f32) {
        self.calls.push(DeviceCall::TempoFactor(factor));
        self.factor = factor;
    }

    fn load_sequence(&mut self, events: Vec<TimedEvent>) -> Result<()> {
        self.calls.push(DeviceCall::Load(events.len()));
        self.sequence = events;
        Ok(())
    }

    fn set_loop_continuous(&mut self) {
        self.calls.push(DeviceCall::LoopContinuous);
    }

    fn start(&mut self) -> Result<()> {
        self.calls.push(DeviceCall::Start);
        if self.fail_start {
            return Err(Error::Device("device busy".into()));
        }
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.calls.push(DeviceCall::Stop);
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}
