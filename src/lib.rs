/// BeatBox - a 16x16 drum step sequencer library
///
/// This library provides the core components of the beat box:
/// - A fixed grid of percussion instruments by sixteenth-note steps
/// - Translation of the grid into a looping MIDI track
/// - A threaded playback engine with tempo scaling
/// - MIDI output for production use, audio output for previewing
/// - Saving and loading beats

pub mod audio;
pub mod config;
pub mod error;
pub mod midi;
pub mod persistence;
pub mod sequencer;

// Re-export commonly used types
pub use audio::AudioOutput;
pub use config::Config;
pub use error::{Error, Result};
pub use midi::{midi_note_name, MidiMessage, MidiOutputDevice};
pub use sequencer::instrument::{Instrument, INSTRUMENTS};
pub use sequencer::playback::{PlaybackEngine, PlaybackEvent, SequencerDevice};
pub use sequencer::track::{build_track, TimedEvent};
pub use sequencer::transport::{PlaybackController, PlaybackState};
pub use sequencer::{Command, Grid, Sequencer};
