/// Start/stop/tempo control over a sequencer device
use super::playback::SequencerDevice;
use super::track::TimedEvent;
use crate::error::{Error, Result};

pub const DEFAULT_BPM: f32 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
}

pub struct PlaybackController<D: SequencerDevice> {
    device: D,
    opened: bool,
    base_bpm: f32,
    state: PlaybackState,
}

impl<D: SequencerDevice> PlaybackController<D> {
    /// Opens the device at the base tempo. A device that fails to open is
    /// kept, and every later `start` reports it.
    pub fn new(mut device: D, base_bpm: f32) -> Self {
        let opened = match device.open() {
            Ok(()) => {
                device.set_tempo_bpm(base_bpm);
                true
            }
            Err(e) => {
                tracing::error!("Failed to open sequencer: {}", e);
                false
            }
        };

        Self {
            device,
            opened,
            base_bpm,
            state: PlaybackState::Stopped,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Playing and the device's clock is still running.
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing && self.device.is_running()
    }

    pub fn tempo_factor(&self) -> f32 {
        self.device.tempo_factor()
    }

    /// Replace the loaded sequence.
    pub fn load(&mut self, events: Vec<TimedEvent>) -> Result<()> {
        if !self.opened {
            return Err(Error::Device("sequencer is not open".into()));
        }
        self.device.load_sequence(events)
    }

    /// Loop the loaded sequence from tick 0. Restarts if already playing.
    pub fn start(&mut self) -> Result<()> {
        if !self.opened {
            return Err(Error::Device("sequencer is not open".into()));
        }
        self.device.set_loop_continuous();
        self.device.set_tempo_bpm(self.base_bpm);
        self.device.start()?;
        self.state = PlaybackState::Playing;
        tracing::info!("Playback started at {:.1} BPM", self.effective_bpm());
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.opened {
            self.device.stop();
        }
        if self.state == PlaybackState::Playing {
            tracing::info!("Playback stopped");
        }
        self.state = PlaybackState::Stopped;
    }

    /// Scale the current tempo factor by `multiplier`; repeated calls compound.
    pub fn set_tempo_factor(&mut self, multiplier: f32) {
        let factor = self.device.tempo_factor() * multiplier;
        self.device.set_tempo_factor(factor);
        tracing::debug!("Tempo factor now {:.4}", self.device.tempo_factor());
    }

    pub fn effective_bpm(&self) -> f32 {
        self.base_bpm * self.device.tempo_factor()
    }
}
