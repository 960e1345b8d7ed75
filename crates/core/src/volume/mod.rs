//! Piecewise-linear beat-indexed ramps, used for music volume.
//!
//! Each [`VolumeChange`] ramps from the value of the change before it (or the
//! baseline) to its own value over `width` beats, then holds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{tempo::BeatKey, BeatSyncError, Result};

/// Music volume before any change, in percent.
pub const DEFAULT_VOLUME: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeChange {
    pub beat: f64,
    /// Ramp length in beats; zero is a step.
    #[serde(default)]
    pub width: f64,
    pub value: f64,
}

impl VolumeChange {
    pub fn new(beat: f64, width: f64, value: f64) -> Self {
        Self { beat, width, value }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.beat >= 0.0) {
            return Err(BeatSyncError::NegativeBeat { beat: self.beat });
        }
        if !(self.width >= 0.0) {
            return Err(BeatSyncError::NegativeWidth { width: self.width });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RampSegment {
    previous: f64,
    change: VolumeChange,
}

impl RampSegment {
    fn value_at(&self, beat: f64) -> f64 {
        let change = &self.change;
        if change.width > 0.0 && beat <= change.beat + change.width {
            let progress = ((beat - change.beat) / change.width).clamp(0.0, 1.0);
            self.previous + (change.value - self.previous) * progress
        } else {
            change.value
        }
    }
}

#[derive(Debug, Clone)]
pub struct VolumeMap {
    baseline: f64,
    changes: BTreeMap<BeatKey, VolumeChange>,
    segments: Vec<RampSegment>,
}

impl Default for VolumeMap {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumeMap {
    pub fn new() -> Self {
        Self::with_baseline(DEFAULT_VOLUME)
    }

    /// Creates a map for another ramped parameter with its own resting value.
    pub fn with_baseline(baseline: f64) -> Self {
        Self {
            baseline,
            changes: BTreeMap::new(),
            segments: Vec::new(),
        }
    }

    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    pub fn changes(&self) -> impl Iterator<Item = &VolumeChange> + '_ {
        self.changes.values()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn add_change(&mut self, change: VolumeChange) -> Result<()> {
        if let Err(err) = change.validate() {
            tracing::warn!(?change, %err, "rejected volume change");
            return Err(err);
        }
        self.changes.insert(BeatKey::new(change.beat), change);
        self.recompute();
        Ok(())
    }

    /// Inserts every change and rebuilds once; nothing is applied if any
    /// change is invalid.
    pub fn add_changes<I>(&mut self, changes: I) -> Result<usize>
    where
        I: IntoIterator<Item = VolumeChange>,
    {
        let changes: Vec<VolumeChange> = changes.into_iter().collect();
        if let Some(err) = changes.iter().find_map(|change| change.validate().err()) {
            tracing::warn!(%err, count = changes.len(), "rejected bulk volume edit");
            return Err(err);
        }
        let count = changes.len();
        for change in changes {
            self.changes.insert(BeatKey::new(change.beat), change);
        }
        self.recompute();
        Ok(count)
    }

    pub fn remove_change(&mut self, beat: f64) -> Option<VolumeChange> {
        let removed = self.changes.remove(&BeatKey::new(beat))?;
        self.recompute();
        Some(removed)
    }

    pub fn remove_changes<I>(&mut self, beats: I) -> Vec<VolumeChange>
    where
        I: IntoIterator<Item = f64>,
    {
        let removed: Vec<VolumeChange> = beats
            .into_iter()
            .filter_map(|beat| self.changes.remove(&BeatKey::new(beat)))
            .collect();
        if !removed.is_empty() {
            self.recompute();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.changes.clear();
        self.recompute();
    }

    fn recompute(&mut self) {
        self.segments.clear();
        let mut previous = self.baseline;
        for change in self.changes.values() {
            self.segments.push(RampSegment {
                previous,
                change: *change,
            });
            previous = change.value;
        }
        tracing::debug!(segments = self.segments.len(), "rebuilt volume ramps");
    }

    pub fn value_at_beat(&self, beat: f64) -> f64 {
        if beat < 0.0 {
            return self.baseline;
        }
        let index = self
            .segments
            .partition_point(|segment| segment.change.beat <= beat);
        match index.checked_sub(1) {
            Some(index) => self.segments[index].value_at(beat),
            None => self.baseline,
        }
    }

    /// [`VolumeMap::value_at_beat`] as a gain factor, where 100 is unity.
    pub fn gain_at_beat(&self, beat: f64) -> f64 {
        self.value_at_beat(beat) / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_map_returns_baseline() {
        let map = VolumeMap::new();
        assert_eq!(map.value_at_beat(0.0), 100.0);
        assert_eq!(map.value_at_beat(57.0), 100.0);
        assert_eq!(map.gain_at_beat(3.0), 1.0);
    }

    #[test]
    fn ramp_endpoints() {
        let mut map = VolumeMap::new();
        map.add_change(VolumeChange::new(10.0, 4.0, 0.0)).unwrap();

        assert_eq!(map.value_at_beat(5.0), 100.0);
        assert_eq!(map.value_at_beat(10.0), 100.0);
        assert_eq!(map.value_at_beat(12.0), 50.0);
        assert_eq!(map.value_at_beat(14.0), 0.0);
        assert_eq!(map.value_at_beat(20.0), 0.0);
    }

    #[test]
    fn consecutive_ramps_chain_previous_values() {
        let mut map = VolumeMap::new();
        map.add_changes([
            VolumeChange::new(0.0, 2.0, 50.0),
            VolumeChange::new(4.0, 4.0, 150.0),
            VolumeChange::new(10.0, 0.0, 20.0),
        ])
        .unwrap();

        assert_eq!(map.value_at_beat(1.0), 75.0);
        assert_eq!(map.value_at_beat(3.0), 50.0);
        assert_eq!(map.value_at_beat(4.0), 50.0);
        assert_eq!(map.value_at_beat(6.0), 100.0);
        assert_eq!(map.value_at_beat(9.0), 150.0);
        assert_eq!(map.value_at_beat(10.0), 20.0);
    }

    #[test]
    fn step_change_applies_at_its_beat() {
        let mut map = VolumeMap::new();
        map.add_change(VolumeChange::new(8.0, 0.0, 30.0)).unwrap();
        assert_eq!(map.value_at_beat(7.999), 100.0);
        assert_eq!(map.value_at_beat(8.0), 30.0);
    }

    #[test]
    fn negative_beat_returns_baseline() {
        let mut map = VolumeMap::new();
        map.add_change(VolumeChange::new(0.0, 0.0, 10.0)).unwrap();
        assert_eq!(map.value_at_beat(-1.0), 100.0);
    }

    #[test]
    fn rejects_invalid_changes() {
        let mut map = VolumeMap::new();
        assert!(matches!(
            map.add_change(VolumeChange::new(-2.0, 1.0, 0.0)),
            Err(BeatSyncError::NegativeBeat { .. })
        ));
        assert!(matches!(
            map.add_change(VolumeChange::new(2.0, -1.0, 0.0)),
            Err(BeatSyncError::NegativeWidth { .. })
        ));
        assert!(map.is_empty());
    }

    #[test]
    fn removing_change_rechains_neighbours() {
        let mut map = VolumeMap::new();
        map.add_changes([
            VolumeChange::new(0.0, 0.0, 40.0),
            VolumeChange::new(4.0, 4.0, 80.0),
        ])
        .unwrap();
        assert_eq!(map.value_at_beat(6.0), 60.0);

        map.remove_change(0.0).unwrap();
        assert_eq!(map.value_at_beat(6.0), 90.0);
        assert_eq!(map.remove_changes([4.0, 5.0]).len(), 1);
        assert!(map.is_empty());
    }

    #[test]
    fn custom_baseline_for_other_parameters() {
        let mut pitch = VolumeMap::with_baseline(1.0);
        pitch.add_change(VolumeChange::new(2.0, 2.0, 2.0)).unwrap();
        assert_eq!(pitch.value_at_beat(0.0), 1.0);
        assert_eq!(pitch.value_at_beat(3.0), 1.5);
    }
}
