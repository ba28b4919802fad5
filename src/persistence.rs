// Beats are stored as a flat JSON array of 256 booleans, instrument-major.
// Files written by the older Java BeatBox (serialized boolean[]) cannot be read.
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::sequencer::CELL_COUNT;

fn check_len(cells: &[bool]) -> Result<()> {
    if cells.len() != CELL_COUNT {
        return Err(Error::Format(format!(
            "expected {} cells, found {}",
            CELL_COUNT,
            cells.len()
        )));
    }
    Ok(())
}

pub fn save_beat(path: &Path, snapshot: &[bool]) -> Result<()> {
    check_len(snapshot)?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, snapshot)?;
    writer.flush()?;
    tracing::info!("Saved beat to {}", path.display());
    Ok(())
}

pub fn load_beat(path: &Path) -> Result<Vec<bool>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let cells: Vec<bool> = serde_json::from_reader(reader)?;
    check_len(&cells)?;
    tracing::info!("Loaded beat from {}", path.display());
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> Vec<bool> {
        (0..CELL_COUNT).map(|i| i % 3 == 0 || i % 16 == 5).collect()
    }

    #[test]
    fn test_save_and_load_beat() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beat.json");

        save_beat(&path, &pattern()).unwrap();
        assert_eq!(load_beat(&path).unwrap(), pattern());
    }

    #[test]
    fn test_file_is_flat_boolean_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beat.json");
        let mut cells = vec![false; CELL_COUNT];
        cells[0] = true;

        save_beat(&path, &cells).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[true,false,"));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value.as_array().map(|a| a.len()), Some(CELL_COUNT));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_beat(&dir.path().join("nope.json"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_load_wrong_length_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.json");
        std::fs::write(&path, serde_json::to_string(&vec![true; 255]).unwrap()).unwrap();

        assert!(matches!(load_beat(&path), Err(Error::Format(_))));
    }

    #[test]
    fn test_load_garbage_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.json");
        std::fs::write(&path, b"\xac\xed\x00\x05ur\x00\x02[Z").unwrap();

        assert!(matches!(load_beat(&path), Err(Error::Format(_))));

        std::fs::write(&path, "[1, 0, 1]").unwrap();
        assert!(matches!(load_beat(&path), Err(Error::Format(_))));
    }

    #[test]
    fn test_save_rejects_wrong_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beat.json");

        assert!(matches!(save_beat(&path, &[true; 257]), Err(Error::Format(_))));
        assert!(!path.exists());
    }
}
