//! Beat-synchronised event scheduler.
//!
//! The [`Engine`] owns a [`Clock`], a music [`VolumeMap`] and every registered
//! event. Each time the clock advances while playing, every event's beat-side
//! lifecycle is stepped against the new beat and, for audio-capable events,
//! the audio-side lifecycle is stepped against the calibrated audible beat.

use std::fmt;

use crate::{
    config::{AppConfig, InputCalibration},
    event::{compare_events, transition, AudioPhases, BeatPhases, Event, UpdateCompletion},
    tempo::TempoMap,
    timeline::{Clock, ClockReport, SecondsUpdate, TimingSource},
    volume::VolumeMap,
    Result,
};

/// Handle to an event registered with an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlayState {
    #[default]
    Stopped,
    Paused,
    Playing,
}

struct ScheduledEvent {
    id: EventId,
    event: Box<dyn Event>,
    completion: UpdateCompletion,
    /// `None` for events without the audio capability.
    audio_completion: Option<UpdateCompletion>,
}

impl ScheduledEvent {
    fn ready_to_delete(&self) -> bool {
        self.completion == UpdateCompletion::Completed
            && self
                .audio_completion
                .map_or(true, |audio| audio == UpdateCompletion::Completed)
    }

    /// Rewinds both lifecycles, notifying the event for each one that had
    /// started.
    fn reset(&mut self) {
        if self.completion != UpdateCompletion::Pending {
            self.event.on_reset();
        }
        self.completion = UpdateCompletion::Pending;

        let Some(audio) = self.audio_completion else {
            return;
        };
        if audio != UpdateCompletion::Pending {
            if let Some(event) = self.event.as_audio_mut() {
                event.on_audio_reset();
            }
        }
        self.audio_completion = Some(UpdateCompletion::Pending);
    }
}

pub struct Engine {
    clock: Clock,
    volumes: VolumeMap,
    calibration: InputCalibration,
    events: Vec<ScheduledEvent>,
    next_id: u64,
    play_state: PlayState,
    playback_start: f64,
}

impl Engine {
    pub fn new(tempos: TempoMap) -> Self {
        Self {
            clock: Clock::new(tempos),
            volumes: VolumeMap::new(),
            calibration: InputCalibration::default(),
            events: Vec::new(),
            next_id: 0,
            play_state: PlayState::Stopped,
            playback_start: 0.0,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let mut engine = Self::new(TempoMap::new(config.engine.starting_tempo)?);
        engine.clock.set_playback_speed(config.engine.playback_speed)?;
        engine.calibration = config.calibration;
        Ok(engine)
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    pub fn tempos(&self) -> &TempoMap {
        self.clock.tempos()
    }

    pub fn seconds(&self) -> f64 {
        self.clock.seconds()
    }

    pub fn beat(&self) -> f64 {
        self.clock.beat()
    }

    pub fn volumes(&self) -> &VolumeMap {
        &self.volumes
    }

    pub fn volumes_mut(&mut self) -> &mut VolumeMap {
        &mut self.volumes
    }

    /// Music volume percentage at the current beat.
    pub fn volume_at_current_beat(&self) -> f64 {
        self.volumes.value_at_beat(self.clock.beat())
    }

    pub fn calibration(&self) -> &InputCalibration {
        &self.calibration
    }

    pub fn set_calibration(&mut self, calibration: InputCalibration) {
        self.calibration = calibration;
    }

    /// Beat the player is hearing right now, after latency calibration.
    pub fn actual_beat(&self) -> f64 {
        let audible = self.clock.seconds() + self.calibration.audio_offset_seconds();
        self.clock.tempos().seconds_to_beats(audible)
    }

    pub fn report(&self) -> ClockReport {
        self.clock.report()
    }

    // -------------------------------
    // Transport
    // -------------------------------

    pub fn play_state(&self) -> PlayState {
        self.play_state
    }

    /// Position that [`Engine::stop`] rewinds to.
    pub fn playback_start(&self) -> f64 {
        self.playback_start
    }

    pub fn set_playback_start(&mut self, seconds: f64) {
        self.playback_start = seconds.max(0.0);
    }

    pub fn play(&mut self) {
        self.set_play_state(PlayState::Playing);
    }

    pub fn pause(&mut self) {
        self.set_play_state(PlayState::Paused);
    }

    pub fn stop(&mut self) {
        self.set_play_state(PlayState::Stopped);
    }

    pub fn set_play_state(&mut self, state: PlayState) {
        if state == self.play_state {
            return;
        }
        tracing::debug!(from = ?self.play_state, to = ?state, "play state changed");
        if state == PlayState::Stopped {
            self.clock.set_seconds(self.playback_start);
            for scheduled in &mut self.events {
                scheduled.reset();
            }
        }
        self.play_state = state;
    }

    // -------------------------------
    // Event registry
    // -------------------------------

    pub fn add_event(&mut self, mut event: Box<dyn Event>) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        let audio_completion = event
            .as_audio_mut()
            .map(|_| UpdateCompletion::Pending);
        tracing::trace!(%id, window = ?event.window(), "event added");
        self.events.push(ScheduledEvent {
            id,
            event,
            completion: UpdateCompletion::Pending,
            audio_completion,
        });
        id
    }

    pub fn add_events<I>(&mut self, events: I) -> Vec<EventId>
    where
        I: IntoIterator<Item = Box<dyn Event>>,
    {
        events.into_iter().map(|event| self.add_event(event)).collect()
    }

    /// Drops an event; its remaining callbacks never fire.
    pub fn remove_event(&mut self, id: EventId) -> Option<Box<dyn Event>> {
        let index = self.index_of(id)?;
        Some(self.events.remove(index).event)
    }

    pub fn event(&self, id: EventId) -> Option<&dyn Event> {
        self.find(id).map(|scheduled| scheduled.event.as_ref())
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn completion(&self, id: EventId) -> Option<UpdateCompletion> {
        self.find(id).map(|scheduled| scheduled.completion)
    }

    /// Audio-side state, `None` when the event is unknown or has no audio
    /// capability.
    pub fn audio_completion(&self, id: EventId) -> Option<UpdateCompletion> {
        self.find(id).and_then(|scheduled| scheduled.audio_completion)
    }

    pub fn is_ready_to_delete(&self, id: EventId) -> bool {
        self.find(id).is_some_and(ScheduledEvent::ready_to_delete)
    }

    /// Removes every event whose lifecycles have all completed. Never called
    /// implicitly.
    pub fn remove_ready_to_delete(&mut self) -> usize {
        let before = self.events.len();
        self.events.retain(|scheduled| !scheduled.ready_to_delete());
        before - self.events.len()
    }

    /// Event ids sorted by beat, then width.
    pub fn ids_in_order(&self) -> Vec<EventId> {
        let mut order: Vec<&ScheduledEvent> = self.events.iter().collect();
        order.sort_by(|a, b| compare_events(a.event.as_ref(), b.event.as_ref()));
        order.into_iter().map(|scheduled| scheduled.id).collect()
    }

    fn index_of(&self, id: EventId) -> Option<usize> {
        self.events.iter().position(|scheduled| scheduled.id == id)
    }

    fn find(&self, id: EventId) -> Option<&ScheduledEvent> {
        self.events.iter().find(|scheduled| scheduled.id == id)
    }

    // -------------------------------
    // Time advancement
    // -------------------------------

    /// Polls the timing source and advances if it moved. Returns whether the
    /// clock advanced.
    pub fn update(&mut self, source: &dyn TimingSource) -> bool {
        match self.clock.poll(source) {
            Some(update) => self.handle_seconds_update(update),
            None => false,
        }
    }

    /// Applies one `(old, new)` notification from the timing source. Outside
    /// of playback the source position is tracked but the clock holds still.
    pub fn handle_seconds_update(&mut self, update: SecondsUpdate) -> bool {
        if self.play_state != PlayState::Playing {
            self.clock.advance(SecondsUpdate {
                old: update.new,
                new: update.new,
            });
            return false;
        }
        self.clock.advance(update);
        self.evaluate();
        true
    }

    /// Jumps the clock. While playing, events are evaluated at the new
    /// position right away, so anything jumped over still completes.
    pub fn seek(&mut self, seconds: f64) {
        self.clock.set_seconds(seconds);
        if self.play_state == PlayState::Playing {
            self.evaluate();
        }
    }

    fn evaluate(&mut self) {
        let at_beat = self.clock.beat();
        let actual_beat = self.actual_beat();
        let calibration = self.calibration;

        for scheduled in &mut self.events {
            let window = scheduled.event.window();

            let before = scheduled.completion;
            scheduled.completion = transition(
                before,
                window,
                at_beat,
                &mut BeatPhases {
                    event: scheduled.event.as_mut(),
                    at_beat,
                },
            );
            if before != scheduled.completion {
                tracing::trace!(id = %scheduled.id, ?before, after = ?scheduled.completion, at_beat, "beat lifecycle");
            }

            let Some(audio_before) = scheduled.audio_completion else {
                continue;
            };
            let Some(audio) = scheduled.event.as_audio_mut() else {
                continue;
            };
            let audio_after = transition(
                audio_before,
                window,
                actual_beat,
                &mut AudioPhases {
                    event: audio,
                    at_beat,
                    actual_beat,
                    calibration: &calibration,
                },
            );
            if audio_before != audio_after {
                tracing::trace!(id = %scheduled.id, before = ?audio_before, after = ?audio_after, actual_beat, "audio lifecycle");
            }
            scheduled.audio_completion = Some(audio_after);
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(TempoMap::default())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("clock", &self.clock)
            .field("volumes", &self.volumes.len())
            .field("calibration", &self.calibration)
            .field("events", &self.events.len())
            .field("play_state", &self.play_state)
            .field("playback_start", &self.playback_start)
            .finish()
    }
}
