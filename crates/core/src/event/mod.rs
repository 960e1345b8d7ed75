//! Schedulable beat-aligned events and their lifecycle.
//!
//! Gameplay code implements [`Event`] and, for events that must line up with
//! what the player actually hears, the [`AudioEvent`] capability exposed via
//! [`Event::as_audio_mut`]. The [`Engine`](crate::Engine) owns the lifecycle
//! state of every registered event and is the only thing that advances it.

use std::cmp::Ordering;

use crate::config::InputCalibration;

/// Lifecycle of one event, tracked separately for the beat clock and for
/// audio playback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum UpdateCompletion {
    #[default]
    Pending,
    Updating,
    Completed,
}

/// Start and length of an event in beats.
///
/// Ordering: beat is primary, width is secondary. Equality follows the
/// same total order, so `-0.0` and `0.0` are distinct and NaN equals itself.
#[derive(Debug, Clone, Copy)]
pub struct EventWindow {
    pub beat: f64,
    pub width: f64,
}

impl EventWindow {
    pub fn new(beat: f64, width: f64) -> Self {
        Self { beat, width }
    }

    pub fn end(&self) -> f64 {
        self.beat + self.width
    }
}

impl PartialEq for EventWindow {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EventWindow {}

impl PartialOrd for EventWindow {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventWindow {
    fn cmp(&self, other: &Self) -> Ordering {
        self.beat
            .total_cmp(&other.beat)
            .then(self.width.total_cmp(&other.width))
    }
}

/// Beat-driven callbacks. `at_beat` is the engine's beat when the callback
/// fires, which may lie past the event's window after a large jump.
pub trait Event: Send {
    fn beat(&self) -> f64;

    fn width(&self) -> f64;

    fn on_start(&mut self, at_beat: f64);

    fn on_update(&mut self, at_beat: f64);

    fn on_end(&mut self, at_beat: f64);

    fn window(&self) -> EventWindow {
        EventWindow::new(self.beat(), self.width())
    }

    /// Audio-driven capability, if this event has one.
    fn as_audio_mut(&mut self) -> Option<&mut dyn AudioEvent> {
        None
    }

    /// Called when the engine rewinds a lifecycle that had already started.
    fn on_reset(&mut self) {}
}

/// Callbacks driven by the audible position rather than the logical beat.
///
/// `actual_beat` already includes the calibration offset.
pub trait AudioEvent {
    fn on_audio_start(&mut self, at_beat: f64, actual_beat: f64, calibration: &InputCalibration);

    fn on_audio_update(&mut self, at_beat: f64, actual_beat: f64);

    fn on_audio_end(&mut self, at_beat: f64, actual_beat: f64);

    /// Called when the engine rewinds the audio lifecycle after it started.
    fn on_audio_reset(&mut self) {}
}

/// Orders events by beat, then width.
pub fn compare_events(a: &dyn Event, b: &dyn Event) -> Ordering {
    a.window().cmp(&b.window())
}

/// One lifecycle's three callbacks, bound to a position.
pub(crate) trait Phases {
    fn start(&mut self);
    fn update(&mut self);
    fn end(&mut self);
}

pub(crate) struct BeatPhases<'a> {
    pub event: &'a mut dyn Event,
    pub at_beat: f64,
}

impl Phases for BeatPhases<'_> {
    fn start(&mut self) {
        self.event.on_start(self.at_beat);
    }

    fn update(&mut self) {
        self.event.on_update(self.at_beat);
    }

    fn end(&mut self) {
        self.event.on_end(self.at_beat);
    }
}

pub(crate) struct AudioPhases<'a> {
    pub event: &'a mut dyn AudioEvent,
    pub at_beat: f64,
    pub actual_beat: f64,
    pub calibration: &'a InputCalibration,
}

impl Phases for AudioPhases<'_> {
    fn start(&mut self) {
        self.event
            .on_audio_start(self.at_beat, self.actual_beat, self.calibration);
    }

    fn update(&mut self) {
        self.event.on_audio_update(self.at_beat, self.actual_beat);
    }

    fn end(&mut self) {
        self.event.on_audio_end(self.at_beat, self.actual_beat);
    }
}

/// Moves one lifecycle forward given the driving position.
///
/// A pending event whose whole window already lies behind `position` gets all
/// three callbacks in one step, so large jumps never skip an event.
pub(crate) fn transition(
    completion: UpdateCompletion,
    window: EventWindow,
    position: f64,
    phases: &mut dyn Phases,
) -> UpdateCompletion {
    match completion {
        UpdateCompletion::Pending if position >= window.end() => {
            phases.start();
            phases.update();
            phases.end();
            UpdateCompletion::Completed
        }
        UpdateCompletion::Pending if position > window.beat => {
            phases.start();
            phases.update();
            UpdateCompletion::Updating
        }
        UpdateCompletion::Pending => UpdateCompletion::Pending,
        UpdateCompletion::Updating if position >= window.end() => {
            phases.update();
            phases.end();
            UpdateCompletion::Completed
        }
        UpdateCompletion::Updating => {
            phases.update();
            UpdateCompletion::Updating
        }
        UpdateCompletion::Completed => UpdateCompletion::Completed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
    }

    impl Phases for Recorder {
        fn start(&mut self) {
            self.calls.push("start");
        }
        fn update(&mut self) {
            self.calls.push("update");
        }
        fn end(&mut self) {
            self.calls.push("end");
        }
    }

    #[test]
    fn pending_past_window_collapses() {
        let mut recorder = Recorder::default();
        let state = transition(
            UpdateCompletion::Pending,
            EventWindow::new(4.0, 2.0),
            10.0,
            &mut recorder,
        );
        assert_eq!(state, UpdateCompletion::Completed);
        assert_eq!(recorder.calls, ["start", "update", "end"]);
    }

    #[test]
    fn pending_stays_pending_until_start_is_passed() {
        let mut recorder = Recorder::default();
        let window = EventWindow::new(4.0, 2.0);
        let state = transition(UpdateCompletion::Pending, window, 4.0, &mut recorder);
        assert_eq!(state, UpdateCompletion::Pending);
        assert!(recorder.calls.is_empty());
    }

    #[test]
    fn zero_width_event_completes_at_its_beat() {
        let mut recorder = Recorder::default();
        let state = transition(
            UpdateCompletion::Pending,
            EventWindow::new(4.0, 0.0),
            4.0,
            &mut recorder,
        );
        assert_eq!(state, UpdateCompletion::Completed);
        assert_eq!(recorder.calls, ["start", "update", "end"]);
    }

    #[test]
    fn updating_walks_to_completion() {
        let mut recorder = Recorder::default();
        let window = EventWindow::new(4.0, 2.0);
        let mut state = UpdateCompletion::Pending;
        for position in [4.5, 5.0, 5.5, 6.0, 6.5] {
            state = transition(state, window, position, &mut recorder);
        }
        assert_eq!(state, UpdateCompletion::Completed);
        assert_eq!(
            recorder.calls,
            ["start", "update", "update", "update", "update", "end"]
        );
    }

    #[test]
    fn completed_is_terminal() {
        let mut recorder = Recorder::default();
        let state = transition(
            UpdateCompletion::Completed,
            EventWindow::new(0.0, 1.0),
            0.5,
            &mut recorder,
        );
        assert_eq!(state, UpdateCompletion::Completed);
        assert!(recorder.calls.is_empty());
    }

    #[test]
    fn windows_order_by_beat_then_width() {
        let short = EventWindow::new(2.0, 1.0);
        let long = EventWindow::new(2.0, 3.0);
        let later = EventWindow::new(2.5, 0.0);
        assert!(short < long);
        assert!(long < later);
        assert_eq!(EventWindow::new(1.0, 8.0).cmp(&EventWindow::new(3.0, 0.5)), Ordering::Less);

        let mut windows = vec![later, long, short];
        windows.sort();
        assert_eq!(windows, [short, long, later]);
    }

    #[test]
    fn window_equality_agrees_with_ordering() {
        let positive = EventWindow::new(0.0, 1.0);
        let negative = EventWindow::new(-0.0, 1.0);
        assert_ne!(positive, negative);
        assert_eq!(negative.cmp(&positive), Ordering::Less);

        let nan = EventWindow::new(f64::NAN, 1.0);
        assert_eq!(nan, nan);
        assert_eq!(nan.cmp(&nan), Ordering::Equal);
    }
}
