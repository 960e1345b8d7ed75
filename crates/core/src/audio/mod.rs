//! Sound playback seam and the ready-made [`SoundCue`] audio event.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use serde::Serialize;

use crate::{
    config::InputCalibration,
    event::{AudioEvent, Event},
    BeatSyncError, Result,
};

/// Identifies one playback started by a [`SoundBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SoundId(pub u64);

/// Controls for a sound that is playing.
pub trait SoundPlayer {
    fn set_gain(&mut self, gain: f32);
    fn set_rate(&mut self, rate: f32);
    fn stop(&mut self);
    fn is_playing(&self) -> bool;
}

/// The mixer side of sound playback.
pub trait SoundBackend: Send {
    /// Starts playing `asset` and returns its id.
    fn play(&mut self, asset: &str) -> Result<SoundId>;

    fn player(&mut self, id: SoundId) -> Option<&mut dyn SoundPlayer>;
}

/// Backend shared between the events that play through it.
pub type SharedBackend = Arc<Mutex<dyn SoundBackend>>;

fn lock_backend(backend: &SharedBackend) -> Result<MutexGuard<'_, dyn SoundBackend + 'static>> {
    backend
        .lock()
        .map_err(|_| BeatSyncError::msg("sound backend has been poisoned"))
}

/// Plays one asset in sync with what the player hears.
///
/// The sound starts when the calibrated audible beat enters the cue's window
/// and is stopped when it leaves. A zero-width cue is a one-shot and plays
/// through. Every cue stops its sound when the engine rewinds it. Cues flagged
/// as input feedback stay silent when the calibration disables input sounds.
pub struct SoundCue {
    beat: f64,
    width: f64,
    asset: String,
    gain: f32,
    rate: f32,
    input_feedback: bool,
    backend: SharedBackend,
    playing: Option<SoundId>,
}

impl SoundCue {
    pub fn new(beat: f64, width: f64, asset: impl Into<String>, backend: SharedBackend) -> Self {
        Self {
            beat,
            width,
            asset: asset.into(),
            gain: 1.0,
            rate: 1.0,
            input_feedback: false,
            backend,
            playing: None,
        }
    }

    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn as_input_feedback(mut self) -> Self {
        self.input_feedback = true;
        self
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn playing(&self) -> Option<SoundId> {
        self.playing
    }

    fn start_sound(&mut self) -> Result<()> {
        let mut backend = lock_backend(&self.backend)?;
        let id = backend.play(&self.asset)?;
        if let Some(player) = backend.player(id) {
            player.set_gain(self.gain);
            player.set_rate(self.rate);
        }
        self.playing = Some(id);
        Ok(())
    }

    fn stop_sound(&mut self) -> Result<()> {
        let Some(id) = self.playing.take() else {
            return Ok(());
        };
        let mut backend = lock_backend(&self.backend)?;
        if let Some(player) = backend.player(id) {
            player.stop();
        }
        Ok(())
    }
}

impl Event for SoundCue {
    fn beat(&self) -> f64 {
        self.beat
    }

    fn width(&self) -> f64 {
        self.width
    }

    fn on_start(&mut self, _at_beat: f64) {}

    fn on_update(&mut self, _at_beat: f64) {}

    fn on_end(&mut self, _at_beat: f64) {}

    fn as_audio_mut(&mut self) -> Option<&mut dyn AudioEvent> {
        Some(self)
    }
}

impl AudioEvent for SoundCue {
    fn on_audio_start(&mut self, at_beat: f64, actual_beat: f64, calibration: &InputCalibration) {
        if self.input_feedback && calibration.disable_input_sounds {
            tracing::debug!(asset = %self.asset, "input sound suppressed");
            return;
        }
        match self.start_sound() {
            Ok(()) => tracing::debug!(asset = %self.asset, at_beat, actual_beat, "sound started"),
            Err(err) => tracing::warn!(asset = %self.asset, %err, "sound failed to start"),
        }
    }

    fn on_audio_update(&mut self, _at_beat: f64, _actual_beat: f64) {}

    fn on_audio_end(&mut self, _at_beat: f64, actual_beat: f64) {
        if self.width <= 0.0 {
            return;
        }
        if let Err(err) = self.stop_sound() {
            tracing::warn!(asset = %self.asset, %err, actual_beat, "sound failed to stop");
        }
    }

    fn on_audio_reset(&mut self) {
        if let Err(err) = self.stop_sound() {
            tracing::warn!(asset = %self.asset, %err, "sound failed to stop on reset");
        }
    }
}

impl fmt::Debug for SoundCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundCue")
            .field("beat", &self.beat)
            .field("width", &self.width)
            .field("asset", &self.asset)
            .field("gain", &self.gain)
            .field("rate", &self.rate)
            .field("input_feedback", &self.input_feedback)
            .field("playing", &self.playing)
            .finish()
    }
}

/// One playback captured by a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackRecord {
    pub id: SoundId,
    pub asset: String,
    pub gain: f32,
    pub rate: f32,
    pub stopped: bool,
}

impl SoundPlayer for PlaybackRecord {
    fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    fn set_rate(&mut self, rate: f32) {
        self.rate = rate;
    }

    fn stop(&mut self) {
        self.stopped = true;
    }

    fn is_playing(&self) -> bool {
        !self.stopped
    }
}

/// Backend that records playbacks instead of mixing them, for offline
/// rendering and tests.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    records: Vec<PlaybackRecord>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[PlaybackRecord] {
        &self.records
    }
}

impl SoundBackend for RecordingBackend {
    fn play(&mut self, asset: &str) -> Result<SoundId> {
        let id = SoundId(self.records.len() as u64);
        self.records.push(PlaybackRecord {
            id,
            asset: asset.to_string(),
            gain: 1.0,
            rate: 1.0,
            stopped: false,
        });
        Ok(id)
    }

    fn player(&mut self, id: SoundId) -> Option<&mut dyn SoundPlayer> {
        self.records
            .get_mut(id.0 as usize)
            .map(|record| record as &mut dyn SoundPlayer)
    }
}

/// Shared handle to a [`RecordingBackend`] that can still be inspected after
/// cues have been handed to an engine.
#[derive(Debug, Clone, Default)]
pub struct RecordingHandle {
    inner: Arc<Mutex<RecordingBackend>>,
}

impl RecordingHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(&self) -> SharedBackend {
        self.inner.clone()
    }

    pub fn records(&self) -> Result<Vec<PlaybackRecord>> {
        let backend = self
            .inner
            .lock()
            .map_err(|_| BeatSyncError::msg("sound backend has been poisoned"))?;
        Ok(backend.records().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{engine::Engine, tempo::TempoMap};

    fn engine_with(calibration: InputCalibration) -> Engine {
        let mut engine = Engine::new(TempoMap::new(120.0).unwrap());
        engine.set_calibration(calibration);
        engine.play();
        engine
    }

    #[test]
    fn cue_plays_and_stops_with_audio_window() {
        let recording = RecordingHandle::new();
        let mut engine = engine_with(InputCalibration::default());
        let cue = SoundCue::new(2.0, 2.0, "clap.ogg", recording.backend())
            .with_gain(0.5)
            .with_rate(1.25);
        let id = engine.add_event(Box::new(cue));

        engine.seek(1.5);
        let records = recording.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].asset, "clap.ogg");
        assert_eq!(records[0].gain, 0.5);
        assert_eq!(records[0].rate, 1.25);
        assert!(records[0].is_playing());

        engine.seek(2.0);
        assert!(recording.records().unwrap()[0].stopped);
        assert!(engine.is_ready_to_delete(id));
    }

    #[test]
    fn offset_starts_sound_early() {
        let recording = RecordingHandle::new();
        let mut engine = engine_with(InputCalibration {
            audio_offset_ms: 250.0,
            disable_input_sounds: false,
        });
        engine.add_event(Box::new(SoundCue::new(4.0, 1.0, "hit.wav", recording.backend())));

        engine.seek(1.7);
        assert!(recording.records().unwrap().is_empty());
        engine.seek(1.9);
        assert_eq!(recording.records().unwrap().len(), 1);
    }

    #[test]
    fn zero_width_cue_plays_through() {
        let recording = RecordingHandle::new();
        let mut engine = engine_with(InputCalibration::default());
        let id = engine.add_event(Box::new(SoundCue::new(1.0, 0.0, "snare.wav", recording.backend())));

        engine.seek(0.5);
        let records = recording.records().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_playing());
        assert!(engine.is_ready_to_delete(id));
    }

    #[test]
    fn stop_silences_cue_before_replay() {
        let recording = RecordingHandle::new();
        let mut engine = engine_with(InputCalibration::default());
        engine.add_event(Box::new(SoundCue::new(1.0, 8.0, "pad.ogg", recording.backend())));

        engine.seek(1.0);
        engine.stop();
        assert!(recording.records().unwrap()[0].stopped);

        engine.play();
        engine.seek(1.0);
        engine.seek(10.0);
        let records = recording.records().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|record| record.stopped));
    }

    #[test]
    fn input_feedback_respects_calibration() {
        let recording = RecordingHandle::new();
        let mut engine = engine_with(InputCalibration {
            audio_offset_ms: 0.0,
            disable_input_sounds: true,
        });
        let feedback = SoundCue::new(1.0, 0.0, "tick.wav", recording.backend()).as_input_feedback();
        let music = SoundCue::new(1.0, 0.0, "music.ogg", recording.backend());
        engine.add_event(Box::new(feedback));
        engine.add_event(Box::new(music));

        engine.seek(1.0);
        let records = recording.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].asset, "music.ogg");
        assert_eq!(engine.remove_ready_to_delete(), 2);
    }
}
