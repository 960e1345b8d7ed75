/// Result alias that carries the custom [`BeatSyncError`] type.
pub type Result<T> = std::result::Result<T, BeatSyncError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum BeatSyncError {
    /// A tempo or volume change was placed before beat zero. The edit is not
    /// applied.
    #[error("change at beat {beat} is before beat 0")]
    NegativeBeat { beat: f64 },
    /// A ramp was given a negative width.
    #[error("change width {width} is negative")]
    NegativeWidth { width: f64 },
    #[error("tempo {tempo} BPM must be positive and finite")]
    InvalidTempo { tempo: f64 },
    #[error("swing ratio {ratio} / division {division} is out of range")]
    InvalidSwing { ratio: u8, division: f64 },
    #[error("playback speed {speed} must be finite and not negative")]
    InvalidPlaybackSpeed { speed: f64 },
    /// Free-form failure, used for poisoned locks and sound backend errors.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

impl BeatSyncError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for BeatSyncError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for BeatSyncError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
