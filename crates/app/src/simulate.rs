use beatsync_core::{
    AppConfig, BeatSyncError, ClockReport, Engine, PlaybackRecord, RecordingHandle, Result,
    SharedTimingSource,
};
use serde::Serialize;

use crate::chart::{Chart, Firing, FiringLog};

/// Sample rate of the simulated audio device.
pub const SAMPLE_RATE: u32 = 48_000;

#[derive(Debug, Clone, Copy)]
pub struct SimulationOptions {
    pub fps: u32,
    /// Seconds to start playback from.
    pub start: f64,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            fps: 60,
            start: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub frames: u64,
    pub clock: ClockReport,
    pub volume: f64,
    pub removed_events: usize,
    pub firings: Vec<Firing>,
    pub sounds: Vec<PlaybackRecord>,
}

/// Plays `chart` from start to finish against a simulated audio device,
/// polling once per video frame.
pub fn simulate(chart: &Chart, config: &AppConfig, options: SimulationOptions) -> Result<SimulationReport> {
    if options.fps == 0 {
        return Err(BeatSyncError::msg("fps must be positive"));
    }
    let mut engine = Engine::from_config(config)?;
    if engine.clock().playback_speed() == 0.0 {
        return Err(BeatSyncError::msg("a playback speed of 0 never reaches the end of the chart"));
    }

    let recording = RecordingHandle::new();
    let log = FiringLog::default();
    chart.apply(&mut engine, &recording.backend(), &log)?;

    // Both lifecycles have to pass the last cue, the audio one runs offset.
    let end_seconds = engine.tempos().beats_to_seconds(chart.end_beat())
        + (-config.calibration.audio_offset_seconds()).max(0.0);
    let frames_per_tick = (SAMPLE_RATE / options.fps).max(1) as usize;

    let source = SharedTimingSource::new();
    let writer = source.writer();
    engine.set_playback_start(options.start);
    engine.seek(options.start);
    engine.play();
    tracing::info!(
        events = engine.event_count(),
        start = options.start,
        end_seconds,
        fps = options.fps,
        "simulating chart"
    );

    let mut frames = 0_u64;
    loop {
        writer.advance_frames(frames_per_tick, SAMPLE_RATE);
        engine.update(&source);
        frames += 1;
        if engine.seconds() > end_seconds {
            break;
        }
    }

    let removed_events = engine.remove_ready_to_delete();
    let firings = log
        .lock()
        .map_err(|_| BeatSyncError::msg("firing log has been poisoned"))?
        .clone();
    let report = SimulationReport {
        frames,
        clock: engine.report(),
        volume: engine.volume_at_current_beat(),
        removed_events,
        firings,
        sounds: recording.records()?,
    };
    tracing::info!(frames, removed_events, "simulation finished");
    Ok(report)
}
