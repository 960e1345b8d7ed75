//! Rhythm synchronisation core.
//!
//! Turns an advancing audio clock (seconds) into musical beat position and
//! drives beat-aligned events through their start/update/end lifecycle. Each
//! module owns one layer: tempo and volume maps are pure data, the timeline
//! clock derives beats from seconds, and the engine schedules events against
//! that clock.

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod tempo;
pub mod timeline;
pub mod volume;

pub use audio::{
    PlaybackRecord, RecordingBackend, RecordingHandle, SharedBackend, SoundBackend, SoundCue, SoundId,
    SoundPlayer,
};
pub use config::{AppConfig, EngineConfig, InputCalibration};
pub use engine::{Engine, EventId, PlayState};
pub use error::{BeatSyncError, Result};
pub use event::{compare_events, AudioEvent, Event, EventWindow, UpdateCompletion};
pub use tempo::{Swing, TempoChange, TempoMap, TempoSegment, DEFAULT_TEMPO};
pub use timeline::{
    Clock, ClockReport, ManualTimingSource, Position, PositionHandle, SecondsUpdate, SharedTimingSource,
    TimingSource, TimingWriter,
};
pub use volume::{VolumeChange, VolumeMap, DEFAULT_VOLUME};
