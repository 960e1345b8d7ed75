use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use beatsync_core::{
    BeatSyncError, Engine, Event, EventId, Result, SharedBackend, SoundCue, TempoChange,
    VolumeChange,
};
use serde::{Deserialize, Serialize};

/// Level content as read from a JSON chart file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Chart {
    pub tempo_changes: Vec<TempoChange>,
    pub volume_changes: Vec<VolumeChange>,
    pub cues: Vec<CueSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CueSpec {
    pub beat: f64,
    #[serde(default)]
    pub width: f64,
    pub label: String,
    /// Asset to play in sync with the audible beat.
    #[serde(default)]
    pub sound: Option<String>,
    #[serde(default)]
    pub input_feedback: bool,
}

/// Which callback fired for a logged cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Start,
    Update,
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Firing {
    pub label: String,
    pub phase: Phase,
    pub at_beat: f64,
}

pub type FiringLog = Arc<Mutex<Vec<Firing>>>;

/// Cue without sound: logs and records its callbacks.
struct LoggedCue {
    cue: CueSpec,
    log: FiringLog,
}

impl LoggedCue {
    fn record(&self, phase: Phase, at_beat: f64) {
        match self.log.lock() {
            Ok(mut log) => log.push(Firing {
                label: self.cue.label.clone(),
                phase,
                at_beat,
            }),
            Err(_) => tracing::warn!(label = %self.cue.label, "firing log has been poisoned"),
        }
    }
}

impl Event for LoggedCue {
    fn beat(&self) -> f64 {
        self.cue.beat
    }

    fn width(&self) -> f64 {
        self.cue.width
    }

    fn on_start(&mut self, at_beat: f64) {
        tracing::info!(label = %self.cue.label, at_beat, "cue start");
        self.record(Phase::Start, at_beat);
    }

    fn on_update(&mut self, at_beat: f64) {
        tracing::trace!(label = %self.cue.label, at_beat, "cue update");
        self.record(Phase::Update, at_beat);
    }

    fn on_end(&mut self, at_beat: f64) {
        tracing::info!(label = %self.cue.label, at_beat, "cue end");
        self.record(Phase::End, at_beat);
    }
}

impl Chart {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let chart = Self::from_json_str(&text)?;
        tracing::debug!(
            path = %path.display(),
            tempo_changes = chart.tempo_changes.len(),
            volume_changes = chart.volume_changes.len(),
            cues = chart.cues.len(),
            "loaded chart"
        );
        Ok(chart)
    }

    /// Beat at which the last cue ends.
    pub fn end_beat(&self) -> f64 {
        self.cues
            .iter()
            .map(|cue| cue.beat + cue.width)
            .fold(0.0, f64::max)
    }

    /// Loads the chart's maps and cues into `engine`.
    pub fn apply(
        &self,
        engine: &mut Engine,
        backend: &SharedBackend,
        log: &FiringLog,
    ) -> Result<Vec<EventId>> {
        for cue in &self.cues {
            if !(cue.beat >= 0.0) {
                return Err(BeatSyncError::NegativeBeat { beat: cue.beat });
            }
            if !(cue.width >= 0.0) {
                return Err(BeatSyncError::NegativeWidth { width: cue.width });
            }
        }
        engine
            .clock_mut()
            .edit_tempos(|tempos| tempos.add_tempo_changes(self.tempo_changes.iter().copied()))?;
        engine
            .volumes_mut()
            .add_changes(self.volume_changes.iter().copied())?;

        let events = self.cues.iter().map(|cue| -> Box<dyn Event> {
            match &cue.sound {
                Some(asset) => {
                    let sound = SoundCue::new(cue.beat, cue.width, asset.clone(), backend.clone());
                    if cue.input_feedback {
                        Box::new(sound.as_input_feedback())
                    } else {
                        Box::new(sound)
                    }
                }
                None => Box::new(LoggedCue {
                    cue: cue.clone(),
                    log: Arc::clone(log),
                }),
            }
        });
        Ok(engine.add_events(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatsync_core::RecordingHandle;

    const CHART: &str = r#"{
        "tempo_changes": [
            { "beat": 0.0, "tempo": 100.0 },
            { "beat": 8.0, "tempo": 200.0, "swing": { "ratio": 66, "division": 0.5 } }
        ],
        "volume_changes": [{ "beat": 4.0, "width": 4.0, "value": 0.0 }],
        "cues": [
            { "beat": 2.0, "width": 1.0, "label": "intro" },
            { "beat": 6.0, "label": "clap", "sound": "clap.ogg", "input_feedback": true }
        ]
    }"#;

    #[test]
    fn parses_chart_with_defaults() {
        let chart = Chart::from_json_str(CHART).unwrap();
        assert_eq!(chart.tempo_changes.len(), 2);
        assert_eq!(chart.cues[1].width, 0.0);
        assert!(chart.cues[0].sound.is_none());
        assert_eq!(chart.end_beat(), 6.0);
    }

    #[test]
    fn applies_maps_and_cues_to_engine() {
        let chart = Chart::from_json_str(CHART).unwrap();
        let mut engine = Engine::default();
        let recording = RecordingHandle::new();
        let log = FiringLog::default();

        let ids = chart.apply(&mut engine, &recording.backend(), &log).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(engine.tempos().len(), 2);
        assert_eq!(engine.tempos().global().tempo, 100.0);
        assert_eq!(engine.volumes().value_at_beat(6.0), 50.0);
        assert!(engine.audio_completion(ids[1]).is_some());
        assert!(engine.audio_completion(ids[0]).is_none());
    }

    #[test]
    fn rejects_negative_tempo_beat() {
        let chart = Chart::from_json_str(r#"{ "tempo_changes": [{ "beat": -4.0, "tempo": 90.0 }] }"#)
            .unwrap();
        let mut engine = Engine::default();
        let recording = RecordingHandle::new();
        let err = chart
            .apply(&mut engine, &recording.backend(), &FiringLog::default())
            .unwrap_err();
        assert!(matches!(err, BeatSyncError::NegativeBeat { .. }));
        assert_eq!(engine.tempos().len(), 1);
    }
}
