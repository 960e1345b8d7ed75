//! Piecewise-constant tempo map between beats and seconds.
//!
//! The map keeps the authored [`TempoChange`]s in a sorted map and a derived
//! list of [`TempoSegment`]s that carries the start time of every segment.
//! Start beats and start seconds grow together, so the one list serves as the
//! index for both directions of conversion. The list is rebuilt from scratch
//! after every edit; edits happen at authoring time, lookups every tick.

mod swing;

use std::{cmp::Ordering, collections::BTreeMap};

use serde::{Deserialize, Serialize};

use crate::{BeatSyncError, Result};

pub use swing::Swing;

/// Tempo used by [`TempoMap::default`].
pub const DEFAULT_TEMPO: f64 = 120.0;

/// From `beat` onward the piece runs at `tempo` BPM with the given swing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoChange {
    pub beat: f64,
    pub tempo: f64,
    #[serde(default)]
    pub swing: Swing,
}

impl TempoChange {
    /// Creates a straight change to `tempo` BPM at `beat`.
    pub fn new(beat: f64, tempo: f64) -> Self {
        Self {
            beat,
            tempo,
            swing: Swing::STRAIGHT,
        }
    }

    pub fn with_swing(mut self, swing: Swing) -> Self {
        self.swing = swing;
        self
    }

    /// Rejects negative beats, non-positive tempos and malformed swing.
    pub fn validate(&self) -> Result<()> {
        if !(self.beat >= 0.0) {
            return Err(BeatSyncError::NegativeBeat { beat: self.beat });
        }
        if !(self.tempo.is_finite() && self.tempo > 0.0) {
            return Err(BeatSyncError::InvalidTempo { tempo: self.tempo });
        }
        self.swing.validate()
    }
}

/// A tempo change together with the time at which it takes effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoSegment {
    pub change: TempoChange,
    pub seconds: f64,
}

impl TempoSegment {
    pub fn beat(&self) -> f64 {
        self.change.beat
    }

    pub fn tempo(&self) -> f64 {
        self.change.tempo
    }

    fn beats_to_seconds(&self, beats: f64, ignore_swing: bool) -> f64 {
        let mut delta = beats - self.change.beat;
        if !ignore_swing {
            delta = self.change.swing.swing_to_linear(delta);
        }
        self.seconds + beats_to_seconds_at(delta, self.change.tempo)
    }

    fn seconds_to_beats(&self, seconds: f64, ignore_swing: bool) -> f64 {
        let mut delta = seconds_to_beats_at(seconds - self.seconds, self.change.tempo);
        if !ignore_swing {
            delta = self.change.swing.linear_to_swing(delta);
        }
        self.change.beat + delta
    }
}

/// Constant-tempo conversion.
pub fn beats_to_seconds_at(beats: f64, tempo: f64) -> f64 {
    beats * 60.0 / tempo
}

/// Constant-tempo conversion.
pub fn seconds_to_beats_at(seconds: f64, tempo: f64) -> f64 {
    seconds * tempo / 60.0
}

/// Totally ordered beat used as a map key. `-0.0` is folded into `0.0`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BeatKey(f64);

impl BeatKey {
    pub(crate) fn new(beat: f64) -> Self {
        Self(if beat == 0.0 { 0.0 } else { beat })
    }
}

impl PartialEq for BeatKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BeatKey {}

impl PartialOrd for BeatKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BeatKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Sorted tempo changes plus the derived segment cache used for conversion.
#[derive(Debug, Clone)]
pub struct TempoMap {
    changes: BTreeMap<BeatKey, TempoChange>,
    segments: Vec<TempoSegment>,
    revision: u64,
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::with_global(TempoChange::new(0.0, DEFAULT_TEMPO))
    }
}

impl TempoMap {
    /// Creates a map holding only the global tempo change at beat 0.
    pub fn new(starting_tempo: f64) -> Result<Self> {
        let global = TempoChange::new(0.0, starting_tempo);
        global.validate()?;
        Ok(Self::with_global(global))
    }

    fn with_global(global: TempoChange) -> Self {
        let mut changes = BTreeMap::new();
        changes.insert(BeatKey::new(0.0), global);
        let mut map = Self {
            changes,
            segments: Vec::new(),
            revision: 0,
        };
        map.recompute();
        map
    }

    /// The mandatory change at beat 0.
    pub fn global(&self) -> &TempoChange {
        &self.segments[0].change
    }

    /// Authored changes in beat order.
    pub fn changes(&self) -> impl Iterator<Item = &TempoChange> + '_ {
        self.changes.values()
    }

    /// Cached segments in beat order; the first is always the global one.
    pub fn segments(&self) -> &[TempoSegment] {
        &self.segments
    }

    /// Number of changes, including the global one.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Never true: the global change is always present.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of cache rebuilds so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Inserts a change, replacing any change at the same beat. Replacing the
    /// beat-0 change replaces the global tempo.
    pub fn add_tempo_change(&mut self, change: TempoChange) -> Result<()> {
        if let Err(err) = change.validate() {
            tracing::warn!(?change, %err, "rejected tempo change");
            return Err(err);
        }
        self.changes.insert(BeatKey::new(change.beat), change);
        self.recompute();
        Ok(())
    }

    /// Inserts every change and rebuilds the cache once. If any change is
    /// invalid nothing is applied. Duplicate beats resolve to the last one.
    pub fn add_tempo_changes<I>(&mut self, changes: I) -> Result<usize>
    where
        I: IntoIterator<Item = TempoChange>,
    {
        let changes: Vec<TempoChange> = changes.into_iter().collect();
        if let Some(err) = changes.iter().find_map(|change| change.validate().err()) {
            tracing::warn!(%err, count = changes.len(), "rejected bulk tempo edit");
            return Err(err);
        }
        let count = changes.len();
        for change in changes {
            self.changes.insert(BeatKey::new(change.beat), change);
        }
        self.recompute();
        Ok(count)
    }

    /// Removes the change at `beat`. The global change cannot be removed and
    /// yields `None`.
    pub fn remove_tempo_change(&mut self, beat: f64) -> Option<TempoChange> {
        let removed = self.take_change(beat)?;
        self.recompute();
        Some(removed)
    }

    /// Removes the changes at every beat and rebuilds the cache once.
    pub fn remove_tempo_changes<I>(&mut self, beats: I) -> Vec<TempoChange>
    where
        I: IntoIterator<Item = f64>,
    {
        let removed: Vec<TempoChange> = beats
            .into_iter()
            .filter_map(|beat| self.take_change(beat))
            .collect();
        if !removed.is_empty() {
            self.recompute();
        }
        removed
    }

    /// Drops every change except the global one.
    pub fn clear(&mut self) {
        let global = *self.global();
        self.changes.clear();
        self.changes.insert(BeatKey::new(0.0), global);
        self.recompute();
    }

    fn take_change(&mut self, beat: f64) -> Option<TempoChange> {
        let key = BeatKey::new(beat);
        if key == BeatKey::new(0.0) {
            tracing::debug!("the global tempo change can only be replaced");
            return None;
        }
        self.changes.remove(&key)
    }

    fn recompute(&mut self) {
        self.segments.clear();
        let mut previous: Option<TempoSegment> = None;
        for change in self.changes.values() {
            let seconds = match previous {
                Some(prev) => {
                    prev.seconds + beats_to_seconds_at(change.beat - prev.change.beat, prev.change.tempo)
                }
                None => 0.0,
            };
            let segment = TempoSegment {
                change: *change,
                seconds,
            };
            self.segments.push(segment);
            previous = Some(segment);
        }
        self.revision += 1;
        tracing::debug!(
            segments = self.segments.len(),
            revision = self.revision,
            "rebuilt tempo segments"
        );
    }

    /// Segment whose start beat is the greatest one not after `beat`, or the
    /// global segment.
    pub fn segment_at_beat(&self, beat: f64) -> &TempoSegment {
        let index = self.segments.partition_point(|segment| segment.beat() <= beat);
        &self.segments[index.saturating_sub(1)]
    }

    /// Segment whose start time is the greatest one not after `seconds`, or
    /// the global segment.
    pub fn segment_at_seconds(&self, seconds: f64) -> &TempoSegment {
        let index = self
            .segments
            .partition_point(|segment| segment.seconds <= seconds);
        &self.segments[index.saturating_sub(1)]
    }

    /// Returns the time at which `beats` is reached, honouring swing.
    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        self.segment_at_beat(beats).beats_to_seconds(beats, false)
    }

    /// Returns the time at which `beats` is reached on the straight timeline.
    pub fn beats_to_seconds_ignoring_swing(&self, beats: f64) -> f64 {
        self.segment_at_beat(beats).beats_to_seconds(beats, true)
    }

    /// Returns the beat position at `seconds`, honouring swing.
    pub fn seconds_to_beats(&self, seconds: f64) -> f64 {
        self.segment_at_seconds(seconds)
            .seconds_to_beats(seconds, false)
    }

    /// Returns the beat position at `seconds` on the straight timeline.
    pub fn seconds_to_beats_ignoring_swing(&self, seconds: f64) -> f64 {
        self.segment_at_seconds(seconds)
            .seconds_to_beats(seconds, true)
    }

    /// BPM in effect at `beat`.
    pub fn tempo_at_beat(&self, beat: f64) -> f64 {
        self.segment_at_beat(beat).tempo()
    }

    /// BPM in effect at `seconds`.
    pub fn tempo_at_seconds(&self, seconds: f64) -> f64 {
        self.segment_at_seconds(seconds).tempo()
    }

    /// Swing in effect at `beat`.
    pub fn swing_at_beat(&self, beat: f64) -> Swing {
        self.segment_at_beat(beat).change.swing
    }
}
