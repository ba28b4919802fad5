/// Fixed percussion instrument table, one entry per grid row
use super::NUM_INSTRUMENTS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instrument {
    pub name: &'static str,
    /// General MIDI percussion key
    pub note: u8,
}

const fn instrument(name: &'static str, note: u8) -> Instrument {
    Instrument { name, note }
}

pub const INSTRUMENTS: [Instrument; NUM_INSTRUMENTS] = [
    instrument("Bass Drum", 35),
    instrument("Closed Hi-Hat", 42),
    instrument("Open Hi-Hat", 46),
    instrument("Acoustic Snare", 38),
    instrument("Crash Cymbal", 49),
    instrument("Hand Clap", 39),
    instrument("High Tom", 50),
    instrument("Hi Bongo", 60),
    instrument("Maracas", 70),
    instrument("Whistle", 72),
    instrument("Low Conga", 64),
    instrument("Cowbell", 56),
    instrument("Vibraslap", 58),
    instrument("Low-mid Tom", 47),
    instrument("High Agogo", 67),
    instrument("Open Hi Conga", 63),
];
