use thiserror::Error;

/// Failures the sequencer core can report.
///
/// None of these are fatal: callers at the UI boundary log them and carry on.
#[derive(Debug, Error)]
pub enum Error {
    /// The playback device (clock thread, MIDI or audio output) could not be
    /// opened, configured or started.
    #[error("device error: {0}")]
    Device(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted beat or config payload has the wrong shape.
    #[error("format error: {0}")]
    Format(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Error::Io(err.into())
        } else {
            Error::Format(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
