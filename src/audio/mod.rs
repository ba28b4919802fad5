/// Audio output using cpal - a percussive preview voice for when no MIDI
/// port is connected
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

/// Seconds for a hit to fall to roughly 1/e of its level.
const DECAY_SECONDS: f32 = 0.08;
const LEVEL: f32 = 0.2;

#[derive(Debug, Clone, Copy, Default)]
struct Voice {
    frequency: f32,
    phase: f32,
    amplitude: f32,
}

impl Voice {
    fn strike(&mut self, frequency: f32, velocity: u8) {
        self.frequency = frequency;
        self.phase = 0.0;
        self.amplitude = velocity as f32 / 127.0;
    }

    fn next_sample(&mut self, sample_rate: f32, decay: f32) -> f32 {
        if self.amplitude < 1e-4 {
            self.amplitude = 0.0;
            return 0.0;
        }
        let sample = (self.phase * 2.0 * std::f32::consts::PI).sin() * self.amplitude * LEVEL;
        self.phase += self.frequency / sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        self.amplitude *= decay;
        sample
    }
}

pub struct AudioOutput {
    _stream: Option<cpal::Stream>,
    voice: Arc<Mutex<Voice>>,
}

impl AudioOutput {
    pub fn new() -> Result<Self> {
        let voice = Arc::new(Mutex::new(Voice::default()));
        let stream = Self::setup_audio_stream(Arc::clone(&voice))?;

        Ok(Self {
            _stream: Some(stream),
            voice,
        })
    }

    /// An output that accepts notes and plays nothing.
    pub fn silent() -> Self {
        Self {
            _stream: None,
            voice: Arc::new(Mutex::new(Voice::default())),
        }
    }

    pub fn is_active(&self) -> bool {
        self._stream.is_some()
    }

    fn setup_audio_stream(voice: Arc<Mutex<Voice>>) -> Result<cpal::Stream> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Device("no default audio output device".into()))?;
        let config = device
            .default_output_config()
            .map_err(|e| Error::Device(format!("no usable audio output config: {}", e)))?;

        if config.sample_format() != cpal::SampleFormat::F32 {
            return Err(Error::Device(format!(
                "unsupported sample format {:?}",
                config.sample_format()
            )));
        }

        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;
        let decay = (-1.0 / (DECAY_SECONDS * sample_rate)).exp();

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut voice) = voice.lock() else {
                        data.fill(0.0);
                        return;
                    };
                    for frame in data.chunks_mut(channels) {
                        let sample = voice.next_sample(sample_rate, decay);
                        frame.fill(sample);
                    }
                },
                |err| tracing::warn!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| Error::Device(format!("failed to build audio stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| Error::Device(format!("failed to start audio stream: {}", e)))?;
        Ok(stream)
    }

    pub fn trigger_note(&mut self, note: u8, velocity: u8) {
        if let Ok(mut voice) = self.voice.lock() {
            voice.strike(percussion_frequency(note), velocity);
        }
    }
}

impl Default for AudioOutput {
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| {
            tracing::warn!("Audio preview disabled: {}", e);
            Self::silent()
        })
    }
}

fn midi_note_to_frequency(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}

/// Percussion keys sit low on the keyboard; lift them two octaves so each
/// instrument gets an audible, distinct pitch.
fn percussion_frequency(note: u8) -> f32 {
    midi_note_to_frequency(note) * 4.0
}
