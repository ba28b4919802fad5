/// Core sequencer logic - grid state and the commands the UI dispatches
use std::path::{Path, PathBuf};

use crate::config::PlaybackConfig;
use crate::error::{Error, Result};
use crate::persistence;

pub mod instrument;
pub mod playback;
pub mod track;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_fixture;

use instrument::{Instrument, INSTRUMENTS};
use playback::SequencerDevice;
use track::build_track;
use transport::PlaybackController;

pub const NUM_INSTRUMENTS: usize = 16;
pub const NUM_STEPS: usize = 16;
pub const CELL_COUNT: usize = NUM_INSTRUMENTS * NUM_STEPS;

/// On/off cells addressed by (instrument row, step column).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    cells: [[bool; NUM_STEPS]; NUM_INSTRUMENTS],
}

impl Grid {
    pub fn new() -> Self {
        Self {
            cells: [[false; NUM_STEPS]; NUM_INSTRUMENTS],
        }
    }

    pub fn is_set(&self, instrument: usize, step: usize) -> bool {
        self.cells
            .get(instrument)
            .and_then(|row| row.get(step))
            .copied()
            .unwrap_or(false)
    }

    pub fn set(&mut self, instrument: usize, step: usize, value: bool) {
        if let Some(row) = self.cells.get_mut(instrument) {
            if let Some(cell) = row.get_mut(step) {
                *cell = value;
            }
        }
    }

    pub fn toggle(&mut self, instrument: usize, step: usize) {
        let current = self.is_set(instrument, step);
        self.set(instrument, step, !current);
    }

    pub fn clear(&mut self) {
        for row in &mut self.cells {
            for cell in row {
                *cell = false;
            }
        }
    }

    /// Row-major copy of every cell.
    pub fn snapshot(&self) -> Vec<bool> {
        self.cells.iter().flatten().copied().collect()
    }

    /// Overwrite every cell from a row-major snapshot. The grid is left
    /// untouched unless `cells` holds exactly [`CELL_COUNT`] values.
    pub fn restore(&mut self, cells: &[bool]) -> Result<()> {
        if cells.len() != CELL_COUNT {
            return Err(Error::Format(format!(
                "expected {} cells, found {}",
                CELL_COUNT,
                cells.len()
            )));
        }
        for (row, chunk) in self.cells.iter_mut().zip(cells.chunks_exact(NUM_STEPS)) {
            row.copy_from_slice(chunk);
        }
        Ok(())
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

/// One user action, handled to completion before the next.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Toggle { instrument: usize, step: usize },
    ClearAll,
    Start,
    Stop,
    TempoUp,
    TempoDown,
    Save(PathBuf),
    Load(PathBuf),
}

/// Application state: the grid and the playback it drives.
pub struct Sequencer<D: SequencerDevice> {
    grid: Grid,
    instruments: &'static [Instrument; NUM_INSTRUMENTS],
    playback: PlaybackController<D>,
    tempo_up: f32,
    tempo_down: f32,
}

impl<D: SequencerDevice> Sequencer<D> {
    pub fn new(device: D, config: &PlaybackConfig) -> Self {
        Self {
            grid: Grid::new(),
            instruments: &INSTRUMENTS,
            playback: PlaybackController::new(device, config.base_bpm),
            tempo_up: config.tempo_up,
            tempo_down: config.tempo_down,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn instruments(&self) -> &'static [Instrument; NUM_INSTRUMENTS] {
        self.instruments
    }

    pub fn playback(&self) -> &PlaybackController<D> {
        &self.playback
    }

    pub fn device(&self) -> &D {
        self.playback.device()
    }

    pub fn toggle(&mut self, instrument: usize, step: usize) {
        self.grid.toggle(instrument, step);
    }

    pub fn is_set(&self, instrument: usize, step: usize) -> bool {
        self.grid.is_set(instrument, step)
    }

    pub fn clear_all(&mut self) {
        self.grid.clear();
    }

    /// Rebuild the track from the grid, load it and start looping.
    pub fn build_and_play(&mut self) -> Result<()> {
        let events = build_track(&self.grid, self.instruments);
        self.playback.load(events)?;
        self.playback.start()
    }

    pub fn stop(&mut self) {
        self.playback.stop();
    }

    pub fn tempo_up(&mut self) {
        self.playback.set_tempo_factor(self.tempo_up);
    }

    pub fn tempo_down(&mut self) {
        self.playback.set_tempo_factor(self.tempo_down);
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        persistence::save_beat(path, &self.grid.snapshot())
    }

    /// Replace the grid from a saved beat and restart playback with it.
    /// On failure the grid and playback are left as they were.
    pub fn load_from_path(&mut self, path: &Path) -> Result<()> {
        let cells = persistence::load_beat(path)?;
        self.grid.restore(&cells)?;
        self.playback.stop();
        self.build_and_play()
    }

    /// Run a command, logging any failure. The sequencer stays usable.
    pub fn handle(&mut self, command: Command) {
        let result = match command {
            Command::Toggle { instrument, step } => {
                self.toggle(instrument, step);
                Ok(())
            }
            Command::ClearAll => {
                self.clear_all();
                Ok(())
            }
            Command::Start => self.build_and_play(),
            Command::Stop => {
                self.stop();
                Ok(())
            }
            Command::TempoUp => {
                self.tempo_up();
                Ok(())
            }
            Command::TempoDown => {
                self.tempo_down();
                Ok(())
            }
            Command::Save(path) => self.save_to_path(&path),
            Command::Load(path) => self.load_from_path(&path),
        };

        if let Err(e) = result {
            tracing::error!("{}", e);
        }
    }
}
