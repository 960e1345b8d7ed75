//! Playback clock: seconds from a timing source, beats from the tempo map.

mod position;
mod source;

use std::fmt;

use serde::Serialize;

use crate::{tempo::TempoMap, BeatSyncError, Result};

pub use position::{Position, PositionHandle};
pub use source::{ManualTimingSource, SecondsUpdate, SharedTimingSource, TimingSource, TimingWriter};

/// Owns the tempo map and the current position.
///
/// `beat` is always `tempos.seconds_to_beats(seconds)`; it is recomputed on
/// every change of either.
#[derive(Debug)]
pub struct Clock {
    tempos: TempoMap,
    seconds: f64,
    beat: f64,
    playback_speed: f64,
    source_seconds: f64,
    position: PositionHandle,
}

impl Clock {
    /// Creates a clock at zero seconds running at normal speed.
    pub fn new(tempos: TempoMap) -> Self {
        let beat = tempos.seconds_to_beats(0.0);
        Self {
            tempos,
            seconds: 0.0,
            beat,
            playback_speed: 1.0,
            source_seconds: 0.0,
            position: PositionHandle::new(0.0, beat),
        }
    }

    /// Returns the tempo map beats are derived from.
    pub fn tempos(&self) -> &TempoMap {
        &self.tempos
    }

    /// Runs `edit` against the tempo map and re-derives the beat afterwards.
    pub fn edit_tempos<R>(&mut self, edit: impl FnOnce(&mut TempoMap) -> R) -> R {
        let result = edit(&mut self.tempos);
        self.set_seconds(self.seconds);
        result
    }

    /// Current position in seconds, never negative.
    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    /// Current beat, derived from [`Clock::seconds`].
    pub fn beat(&self) -> f64 {
        self.beat
    }

    /// Sets the position, clamped to zero, and re-derives the beat.
    pub fn set_seconds(&mut self, seconds: f64) {
        self.seconds = seconds.max(0.0);
        self.beat = self.tempos.seconds_to_beats(self.seconds);
        self.position.publish(self.seconds, self.beat);
    }

    /// Rewinds to zero seconds.
    pub fn reset(&mut self) {
        self.set_seconds(0.0);
    }

    /// Multiplier applied to every source delta.
    pub fn playback_speed(&self) -> f64 {
        self.playback_speed
    }

    /// Sets the speed multiplier. Negative or non-finite speeds are rejected.
    pub fn set_playback_speed(&mut self, speed: f64) -> Result<()> {
        if !(speed.is_finite() && speed >= 0.0) {
            return Err(BeatSyncError::InvalidPlaybackSpeed { speed });
        }
        self.playback_speed = speed;
        Ok(())
    }

    /// Last timing-source position this clock has seen.
    pub fn source_seconds(&self) -> f64 {
        self.source_seconds
    }

    /// Adopts the source's current position without advancing.
    pub fn sync_source(&mut self, source: &dyn TimingSource) {
        self.source_seconds = source.seconds();
    }

    /// Reports whether the timing source moved since the last poll.
    pub fn poll(&self, source: &dyn TimingSource) -> Option<SecondsUpdate> {
        let new = source.seconds();
        if new == self.source_seconds {
            None
        } else {
            Some(SecondsUpdate {
                old: self.source_seconds,
                new,
            })
        }
    }

    /// Advances by the update's delta scaled by the playback speed. A
    /// negative delta moves the clock backward.
    pub fn advance(&mut self, update: SecondsUpdate) -> f64 {
        let delta = update.delta() * self.playback_speed;
        self.source_seconds = update.new;
        self.set_seconds(self.seconds + delta);
        delta
    }

    /// Handle for reading the position from other threads.
    pub fn position_handle(&self) -> PositionHandle {
        self.position.clone()
    }

    /// Returns a telemetry snapshot of the clock.
    pub fn report(&self) -> ClockReport {
        ClockReport {
            source_seconds: self.source_seconds,
            beat: self.beat,
            seconds: self.seconds,
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(TempoMap::default())
    }
}

/// Diagnostic snapshot of a clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClockReport {
    pub source_seconds: f64,
    pub beat: f64,
    pub seconds: f64,
}

impl fmt::Display for ClockReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "source seconds: {:.3}", self.source_seconds)?;
        writeln!(f, "beat: {:.3}", self.beat)?;
        write!(f, "seconds: {:.3}", self.seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tempo::TempoChange;

    #[test]
    fn advance_follows_source_delta() {
        let mut clock = Clock::default();
        let mut source = ManualTimingSource::new();
        source.advance(0.5);

        let update = clock.poll(&source).expect("source moved");
        assert_eq!(update, SecondsUpdate { old: 0.0, new: 0.5 });
        clock.advance(update);

        assert_eq!(clock.seconds(), 0.5);
        assert_eq!(clock.beat(), 1.0);
        assert!(clock.poll(&source).is_none());
    }

    #[test]
    fn playback_speed_scales_delta() {
        let mut clock = Clock::default();
        clock.set_playback_speed(2.0).unwrap();
        let delta = clock.advance(SecondsUpdate { old: 1.0, new: 1.5 });
        assert_eq!(delta, 1.0);
        assert_eq!(clock.seconds(), 1.0);
        assert_eq!(clock.source_seconds(), 1.5);
        assert!(clock.set_playback_speed(-0.5).is_err());
        assert!(clock.set_playback_speed(f64::INFINITY).is_err());
    }

    #[test]
    fn seconds_are_clamped_at_zero() {
        let mut clock = Clock::default();
        clock.set_seconds(1.0);
        clock.advance(SecondsUpdate { old: 3.0, new: 1.0 });
        assert_eq!(clock.seconds(), 0.0);
        assert_eq!(clock.beat(), 0.0);
    }

    #[test]
    fn backward_delta_moves_beat_back() {
        let mut clock = Clock::default();
        clock.set_seconds(2.0);
        clock.advance(SecondsUpdate { old: 2.0, new: 1.5 });
        assert_eq!(clock.seconds(), 1.5);
        assert_eq!(clock.beat(), 3.0);
    }

    #[test]
    fn tempo_edits_rederive_beat() {
        let mut clock = Clock::default();
        clock.set_seconds(5.0);
        assert_eq!(clock.beat(), 10.0);

        clock
            .edit_tempos(|tempos| tempos.add_tempo_change(TempoChange::new(8.0, 240.0)))
            .unwrap();
        assert!((clock.beat() - 12.0).abs() < 1e-9);
        assert!((clock.position_handle().beat() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn sync_source_skips_pending_delta() {
        let mut clock = Clock::default();
        let mut source = ManualTimingSource::new();
        source.set_seconds(30.0);
        clock.sync_source(&source);
        assert!(clock.poll(&source).is_none());
        assert_eq!(clock.seconds(), 0.0);
    }

    #[test]
    fn report_uses_three_decimals() {
        let mut clock = Clock::default();
        clock.advance(SecondsUpdate { old: 0.0, new: 1.23456 });
        let text = clock.report().to_string();
        assert_eq!(text, "source seconds: 1.235\nbeat: 2.469\nseconds: 1.235");
    }
}
