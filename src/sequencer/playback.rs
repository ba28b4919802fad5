/// Playback engine - coordinates timing and triggers
use std::collections::HashSet;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::track::{TimedEvent, TICKS_PER_QUARTER};
use crate::error::{Error, Result};
use crate::midi::MidiMessage;

pub const MIN_TEMPO_FACTOR: f32 = 0.05;
pub const MAX_TEMPO_FACTOR: f32 = 20.0;

/// Events buffered for the UI before new ones are dropped.
pub const EVENT_CAPACITY: usize = 4096;

/// Ticks replayed in one pass when the clock falls behind; beyond this it
/// resyncs to now.
const MAX_CATCH_UP_TICKS: u32 = 4;

/// The sequencer capability the playback controller drives.
///
/// Once started, a device keeps its own time; callers only issue one-shot
/// commands.
pub trait SequencerDevice {
    fn open(&mut self) -> Result<()>;
    fn set_tempo_bpm(&mut self, bpm: f32);
    fn tempo_factor(&self) -> f32;
    fn set_tempo_factor(&mut self, factor: f32);
    fn load_sequence(&mut self, events: Vec<TimedEvent>) -> Result<()>;
    fn set_loop_continuous(&mut self);
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self);
    fn is_running(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    StepAdvanced(usize),
    Message(MidiMessage),
    Stopped,
}

/// Walks a loaded sequence one tick at a time.
///
/// The loop spans ticks `0..=length`, where `length` is the largest tick in
/// the sequence. Reaching `length` dispatches its events and, when looping,
/// wraps straight to tick 0 so the loop period is `length` ticks.
#[derive(Debug, Clone)]
pub struct LoopCursor {
    events: Vec<TimedEvent>,
    length: u32,
    tick: u32,
    looping: bool,
    finished: bool,
}

impl LoopCursor {
    pub fn new(mut events: Vec<TimedEvent>, looping: bool) -> Self {
        // stable: same-tick events keep insertion order
        events.sort_by_key(|e| e.tick);
        let length = events.last().map(|e| e.tick).unwrap_or(0);

        Self {
            events,
            length,
            tick: 0,
            looping,
            finished: false,
        }
    }

    #[cfg(test)]
    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// Move to tick 0 and return its messages.
    pub fn rewind(&mut self) -> Vec<MidiMessage> {
        self.tick = 0;
        self.finished = self.events.is_empty();
        self.due(0)
    }

    /// Advance one tick, returning the messages due. `None` once a
    /// non-looping sequence has played through.
    pub fn advance(&mut self) -> Option<Vec<MidiMessage>> {
        if self.finished || self.length == 0 {
            self.finished = true;
            return None;
        }

        self.tick += 1;
        let mut messages = self.due(self.tick);

        if self.tick >= self.length {
            if self.looping {
                self.tick = 0;
                messages.extend(self.due(0));
            } else {
                self.finished = true;
            }
        }

        Some(messages)
    }

    fn due(&self, tick: u32) -> Vec<MidiMessage> {
        let start = self.events.partition_point(|e| e.tick < tick);
        self.events[start..]
            .iter()
            .take_while(|e| e.tick == tick)
            .map(|e| e.message)
            .collect()
    }
}

struct Shared {
    sequence: Vec<TimedEvent>,
    looping: bool,
    bpm: f32,
    tempo_factor: f32,
    running: bool,
    restart: bool,
    shutdown: bool,
}

impl Shared {
    fn tick_duration(&self) -> Duration {
        let ticks_per_second = self.bpm as f64 * self.tempo_factor as f64 * TICKS_PER_QUARTER as f64 / 60.0;
        Duration::try_from_secs_f64(1.0 / ticks_per_second).unwrap_or(Duration::from_secs(1))
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Threaded sequencer: plays the loaded sequence on its own clock and
/// reports what it plays through [`PlaybackEngine::poll_events`].
pub struct PlaybackEngine {
    sender: SyncSender<PlaybackEvent>,
    receiver: Receiver<PlaybackEvent>,
    shared: Arc<Mutex<Shared>>,
    clock: Option<JoinHandle<()>>,
}

impl PlaybackEngine {
    pub fn new() -> Self {
        let (sender, receiver) = sync_channel(EVENT_CAPACITY);

        Self {
            sender,
            receiver,
            shared: Arc::new(Mutex::new(Shared {
                sequence: Vec::new(),
                looping: false,
                bpm: 120.0,
                tempo_factor: 1.0,
                running: false,
                restart: false,
                shutdown: false,
            })),
            clock: None,
        }
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.clock.is_some()
    }

    #[cfg(test)]
    pub fn bpm(&self) -> f32 {
        lock(&self.shared).bpm
    }

    pub fn poll_events(&self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SequencerDevice for PlaybackEngine {
    fn open(&mut self) -> Result<()> {
        if self.clock.is_some() {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let sender = self.sender.clone();
        let handle = thread::Builder::new()
            .name("beatbox-clock".into())
            .spawn(move || run_clock(shared, sender))
            .map_err(|e| Error::Device(format!("failed to start sequencer clock: {}", e)))?;

        self.clock = Some(handle);
        Ok(())
    }

    fn set_tempo_bpm(&mut self, bpm: f32) {
        if !(bpm.is_finite() && bpm > 0.0) {
            tracing::warn!("Ignoring invalid tempo {} BPM", bpm);
            return;
        }
        lock(&self.shared).bpm = bpm;
    }

    fn tempo_factor(&self) -> f32 {
        lock(&self.shared).tempo_factor
    }

    fn set_tempo_factor(&mut self, factor: f32) {
        if !(factor.is_finite() && factor > 0.0) {
            tracing::warn!("Ignoring invalid tempo factor {}", factor);
            return;
        }
        let clamped = factor.clamp(MIN_TEMPO_FACTOR, MAX_TEMPO_FACTOR);
        if clamped != factor {
            tracing::warn!("Tempo factor {} out of range, using {}", factor, clamped);
        }
        lock(&self.shared).tempo_factor = clamped;
    }

    fn load_sequence(&mut self, events: Vec<TimedEvent>) -> Result<()> {
        let mut shared = lock(&self.shared);
        shared.sequence = events;
        if shared.running {
            shared.restart = true;
        }
        Ok(())
    }

    fn set_loop_continuous(&mut self) {
        lock(&self.shared).looping = true;
    }

    fn start(&mut self) -> Result<()> {
        if self.clock.is_none() {
            return Err(Error::Device("sequencer is not open".into()));
        }
        let mut shared = lock(&self.shared);
        shared.running = true;
        shared.restart = true;
        Ok(())
    }

    fn stop(&mut self) {
        let mut shared = lock(&self.shared);
        shared.running = false;
        shared.restart = false;
    }

    fn is_running(&self) -> bool {
        lock(&self.shared).running
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        lock(&self.shared).shutdown = true;
        if let Some(handle) = self.clock.take() {
            let _ = handle.join();
        }
    }
}

enum Clock {
    Idle,
    Restart(LoopCursor),
    Run,
}

/// Notes started and not yet released, so stopping never leaves one hanging.
#[derive(Default)]
struct Sounding(HashSet<(u8, u8)>);

impl Sounding {
    fn track(&mut self, message: &MidiMessage) {
        match *message {
            MidiMessage::NoteOn { channel, note, .. } => {
                self.0.insert((channel, note));
            }
            MidiMessage::NoteOff { channel, note, .. } => {
                self.0.remove(&(channel, note));
            }
            _ => {}
        }
    }

    fn release(&mut self, sender: &SyncSender<PlaybackEvent>) {
        for (channel, note) in self.0.drain() {
            post(
                sender,
                PlaybackEvent::Message(MidiMessage::NoteOff {
                    channel,
                    note,
                    velocity: 0,
                }),
            );
        }
    }
}

/// Never blocks the clock: when the UI has stopped draining, events are dropped.
fn post(sender: &SyncSender<PlaybackEvent>, event: PlaybackEvent) {
    if let Err(TrySendError::Full(event)) = sender.try_send(event) {
        tracing::trace!("Event queue full, dropping {:?}", event);
    }
}

fn emit(messages: Vec<MidiMessage>, sounding: &mut Sounding, sender: &SyncSender<PlaybackEvent>) {
    for message in messages {
        sounding.track(&message);
        post(sender, PlaybackEvent::Message(message));
    }
}

fn run_clock(shared: Arc<Mutex<Shared>>, sender: SyncSender<PlaybackEvent>) {
    let mut cursor: Option<LoopCursor> = None;
    let mut sounding = Sounding::default();
    let mut last_tick = Instant::now();

    loop {
        let (tick_duration, clock) = {
            let mut guard = lock(&shared);
            if guard.shutdown {
                break;
            }
            let clock = if !guard.running {
                Clock::Idle
            } else if guard.restart {
                guard.restart = false;
                Clock::Restart(LoopCursor::new(guard.sequence.clone(), guard.looping))
            } else {
                Clock::Run
            };
            (guard.tick_duration(), clock)
        };

        match clock {
            Clock::Idle => {
                if cursor.take().is_some() {
                    sounding.release(&sender);
                    post(&sender, PlaybackEvent::Stopped);
                }
            }
            Clock::Restart(mut fresh) => {
                sounding.release(&sender);
                last_tick = Instant::now();
                post(&sender, PlaybackEvent::StepAdvanced(0));
                emit(fresh.rewind(), &mut sounding, &sender);
                cursor = Some(fresh);
            }
            Clock::Run => {}
        }

        if let Some(active) = cursor.as_mut() {
            let mut caught_up = 0;
            while last_tick.elapsed() >= tick_duration {
                if caught_up == MAX_CATCH_UP_TICKS {
                    last_tick = Instant::now();
                    break;
                }
                caught_up += 1;
                last_tick += tick_duration;
                match active.advance() {
                    Some(messages) => {
                        post(&sender, PlaybackEvent::StepAdvanced(active.tick() as usize));
                        emit(messages, &mut sounding, &sender);
                    }
                    None => {
                        lock(&shared).running = false;
                        break;
                    }
                }
            }
        }

        thread::sleep(Duration::from_millis(1));
    }

    sounding.release(&sender);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::instrument::INSTRUMENTS;
    use crate::sequencer::track::build_track;
    use crate::sequencer::Grid;

    fn note_on(note: u8) -> MidiMessage {
        MidiMessage::NoteOn { channel: 9, note, velocity: 100 }
    }

    fn note_off(note: u8) -> MidiMessage {
        MidiMessage::NoteOff { channel: 9, note, velocity: 100 }
    }

    #[test]
    fn test_cursor_sorts_by_tick_keeping_insertion_order() {
        let events = vec![
            TimedEvent::new(2, note_on(40)),
            TimedEvent::new(0, note_on(35)),
            TimedEvent::new(2, note_on(41)),
        ];
        let mut cursor = LoopCursor::new(events, false);

        assert_eq!(cursor.length(), 2);
        assert_eq!(cursor.rewind(), vec![note_on(35)]);
        assert_eq!(cursor.advance(), Some(vec![]));
        assert_eq!(cursor.advance(), Some(vec![note_on(40), note_on(41)]));
        assert_eq!(cursor.advance(), None);
    }

    #[test]
    fn test_cursor_wraps_built_track_every_sixteen_ticks() {
        let mut grid = Grid::new();
        grid.toggle(0, 0);
        let mut cursor = LoopCursor::new(build_track(&grid, &INSTRUMENTS), true);

        assert_eq!(cursor.length(), 16);
        assert_eq!(cursor.rewind(), vec![note_on(35)]);
        assert_eq!(cursor.advance(), Some(vec![note_off(35)]));

        for _ in 2..15 {
            assert_eq!(cursor.advance(), Some(vec![]));
        }
        assert_eq!(
            cursor.advance(),
            Some(vec![MidiMessage::ProgramChange { channel: 9, program: 1 }])
        );

        // loop end: sixteen row markers, then tick 0 again
        let wrapped = cursor.advance().unwrap_or_default();
        assert_eq!(wrapped.len(), 17);
        assert_eq!(wrapped[16], note_on(35));
        assert_eq!(cursor.tick(), 0);
        assert_eq!(cursor.advance(), Some(vec![note_off(35)]));
    }

    #[test]
    fn test_cursor_empty_sequence_finishes() {
        let mut cursor = LoopCursor::new(vec![], true);
        assert!(cursor.rewind().is_empty());
        assert_eq!(cursor.advance(), None);
    }

    #[test]
    fn test_start_requires_open() {
        let mut engine = PlaybackEngine::new();
        assert!(matches!(engine.start(), Err(Error::Device(_))));
        assert!(!engine.is_running());
    }

    #[test]
    fn test_invalid_tempo_factor_is_ignored() {
        let mut engine = PlaybackEngine::new();
        engine.set_tempo_factor(1.5);
        engine.set_tempo_factor(0.0);
        engine.set_tempo_factor(f32::NAN);
        assert_eq!(engine.tempo_factor(), 1.5);
    }

    #[test]
    fn test_tempo_factor_is_clamped() {
        let mut engine = PlaybackEngine::new();
        engine.set_tempo_factor(1.03f32.powi(450));
        assert_eq!(engine.tempo_factor(), MAX_TEMPO_FACTOR);
        engine.set_tempo_factor(1e-6);
        assert_eq!(engine.tempo_factor(), MIN_TEMPO_FACTOR);
    }

    fn one_hit_engine(bpm: f32, factor: f32) -> PlaybackEngine {
        let mut grid = Grid::new();
        grid.toggle(0, 0);

        let mut engine = PlaybackEngine::new();
        engine.open().unwrap();
        engine.set_tempo_bpm(bpm);
        engine.set_tempo_factor(factor);
        engine.load_sequence(build_track(&grid, &INSTRUMENTS)).unwrap();
        engine.set_loop_continuous();
        engine
    }

    #[test]
    fn test_stop_is_observed_at_extreme_tempo() {
        let mut engine = one_hit_engine(1e9, 1.03f32.powi(450));
        engine.start().unwrap();
        let playing_until = Instant::now() + Duration::from_millis(100);
        while Instant::now() < playing_until {
            engine.poll_events();
            thread::sleep(Duration::from_millis(5));
        }
        engine.stop();

        let deadline = Instant::now() + Duration::from_secs(3);
        let mut stopped = false;
        while Instant::now() < deadline && !stopped {
            stopped = engine.poll_events().contains(&PlaybackEvent::Stopped);
            thread::sleep(Duration::from_millis(5));
        }
        assert!(stopped, "clock thread kept running after stop");
    }

    #[test]
    fn test_undrained_events_are_capped() {
        let mut engine = one_hit_engine(1e9, MAX_TEMPO_FACTOR);
        engine.start().unwrap();
        thread::sleep(Duration::from_millis(300));
        engine.stop();

        assert!(engine.poll_events().len() <= EVENT_CAPACITY);
    }

    #[test]
    fn test_engine_plays_loaded_track() {
        let mut grid = Grid::new();
        grid.toggle(0, 0);

        let mut engine = PlaybackEngine::new();
        engine.open().unwrap();
        assert!(engine.is_open());
        engine.set_tempo_bpm(6000.0);
        assert_eq!(engine.bpm(), 6000.0);
        engine.load_sequence(build_track(&grid, &INSTRUMENTS)).unwrap();
        engine.set_loop_continuous();
        engine.start().unwrap();
        assert!(engine.is_running());

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        while Instant::now() < deadline && !seen.contains(&PlaybackEvent::Message(note_off(35))) {
            seen.extend(engine.poll_events());
            thread::sleep(Duration::from_millis(5));
        }
        assert!(seen.contains(&PlaybackEvent::Message(note_on(35))));
        assert!(seen.contains(&PlaybackEvent::Message(note_off(35))));

        engine.stop();
        assert!(!engine.is_running());

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut stopped = false;
        while Instant::now() < deadline && !stopped {
            stopped = engine.poll_events().contains(&PlaybackEvent::Stopped);
            thread::sleep(Duration::from_millis(5));
        }
        assert!(stopped);
    }
}
