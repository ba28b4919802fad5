/// Translation of the grid into a MIDI track
use super::instrument::Instrument;
use super::{Grid, NUM_INSTRUMENTS, NUM_STEPS};
use crate::midi::MidiMessage;

/// Ticks per quarter note; one tick is one sixteenth-note step.
pub const TICKS_PER_QUARTER: u32 = 4;

pub const PERCUSSION_CHANNEL: u8 = 9;
pub const NOTE_VELOCITY: u8 = 100;

/// Appended after every instrument row. Nothing consumes it.
const ROW_MARKER: MidiMessage = MidiMessage::ControlChange {
    channel: 1,
    controller: 127,
    value: 0,
};
const ROW_MARKER_TICK: u32 = NUM_STEPS as u32;

const PERCUSSION_PROGRAM: MidiMessage = MidiMessage::ProgramChange {
    channel: PERCUSSION_CHANNEL,
    program: 1,
};
const PROGRAM_TICK: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedEvent {
    pub tick: u32,
    pub message: MidiMessage,
}

impl TimedEvent {
    pub fn new(tick: u32, message: MidiMessage) -> Self {
        Self { tick, message }
    }
}

/// Build the event list for one pass of the loop.
///
/// Events come out in insertion order: instrument-major, a NoteOn before its
/// NoteOff, a row marker after each row, and the program change last. They
/// are not sorted by tick.
pub fn build_track(grid: &Grid, instruments: &[Instrument; NUM_INSTRUMENTS]) -> Vec<TimedEvent> {
    let mut events = Vec::new();

    for (row, instrument) in instruments.iter().enumerate() {
        for step in 0..NUM_STEPS {
            if !grid.is_set(row, step) {
                continue;
            }
            let tick = step as u32;
            events.push(TimedEvent::new(
                tick,
                MidiMessage::NoteOn {
                    channel: PERCUSSION_CHANNEL,
                    note: instrument.note,
                    velocity: NOTE_VELOCITY,
                },
            ));
            events.push(TimedEvent::new(
                tick + 1,
                MidiMessage::NoteOff {
                    channel: PERCUSSION_CHANNEL,
                    note: instrument.note,
                    velocity: NOTE_VELOCITY,
                },
            ));
        }
        events.push(TimedEvent::new(ROW_MARKER_TICK, ROW_MARKER));
    }

    events.push(TimedEvent::new(PROGRAM_TICK, PERCUSSION_PROGRAM));
    events
}
