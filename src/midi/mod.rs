/// MIDI messages and output using midir
use midir::{MidiOutput, MidiOutputConnection};

use crate::error::{Error, Result};

const CLIENT_NAME: &str = "BeatBox MIDI Output";

/// A channel voice message. Channels are 0-based, so channel 9 is the
/// General MIDI percussion channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
}

impl MidiMessage {
    /// Wire form of the message: status byte followed by one or two data bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOn { channel, note, velocity } => {
                vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOff { channel, note, velocity } => {
                vec![0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::ControlChange { channel, controller, value } => {
                vec![0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F]
            }
            MidiMessage::ProgramChange { channel, program } => {
                vec![0xC0 | (channel & 0x0F), program & 0x7F]
            }
        }
    }
}

pub struct MidiOutputDevice {
    connection: Option<MidiOutputConnection>,
    port_name: Option<String>,
}

impl MidiOutputDevice {
    pub fn new() -> Self {
        Self {
            connection: None,
            port_name: None,
        }
    }

    pub fn available_ports() -> Vec<String> {
        match MidiOutput::new(CLIENT_NAME) {
            Ok(midi_out) => midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect(),
            Err(e) => {
                tracing::warn!("MIDI output unavailable: {}", e);
                vec![]
            }
        }
    }

    pub fn connect(&mut self, port_index: usize) -> Result<()> {
        let midi_out = MidiOutput::new(CLIENT_NAME)
            .map_err(|e| Error::Device(format!("failed to create MIDI output: {}", e)))?;

        let ports = midi_out.ports();
        let port = ports
            .get(port_index)
            .ok_or_else(|| Error::Device(format!("invalid MIDI port index {}", port_index)))?;
        let name = midi_out
            .port_name(port)
            .unwrap_or_else(|_| format!("port {}", port_index));

        let connection = midi_out
            .connect(port, "beatbox")
            .map_err(|e| Error::Device(format!("failed to connect to {}: {}", name, e)))?;

        tracing::info!("Connected MIDI output to {}", name);
        self.connection = Some(connection);
        self.port_name = Some(name);
        Ok(())
    }

    /// Connects to the first port whose name matches, returning its index.
    pub fn connect_by_name(&mut self, name: &str) -> Result<usize> {
        let index = Self::available_ports()
            .iter()
            .position(|p| p == name)
            .ok_or_else(|| Error::Device(format!("MIDI port '{}' not found", name)))?;
        self.connect(index)?;
        Ok(index)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    /// Sends a message; a no-op when no port is connected.
    pub fn send(&mut self, message: &MidiMessage) -> Result<()> {
        if let Some(ref mut conn) = self.connection {
            conn.send(&message.to_bytes())
                .map_err(|e| Error::Device(format!("failed to send {:?}: {}", message, e)))?;
        }
        Ok(())
    }
}

impl Default for MidiOutputDevice {
    fn default() -> Self {
        Self::new()
    }
}

pub fn midi_note_name(note: u8) -> String {
    let note_names = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = (note / 12) as i32 - 1;
    let note_index = (note % 12) as usize;
    format!("{}{}", note_names[note_index], octave)
}
