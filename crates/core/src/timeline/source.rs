use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Anything that reports how far audio playback has progressed.
pub trait TimingSource {
    /// Current playback position in seconds.
    fn seconds(&self) -> f64;
}

/// A change of the timing source's position, as observed by a [`Clock`].
///
/// [`Clock`]: super::Clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecondsUpdate {
    pub old: f64,
    pub new: f64,
}

impl SecondsUpdate {
    pub fn delta(&self) -> f64 {
        self.new - self.old
    }
}

/// Timing source advanced by hand. Used for offline rendering and tests.
#[derive(Debug, Default, Clone)]
pub struct ManualTimingSource {
    seconds: f64,
}

impl ManualTimingSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_seconds(&mut self, seconds: f64) {
        self.seconds = seconds;
    }

    pub fn advance(&mut self, delta: f64) {
        self.seconds += delta;
    }
}

impl TimingSource for ManualTimingSource {
    fn seconds(&self) -> f64 {
        self.seconds
    }
}

/// Timing source written by the audio callback and read by the game thread.
///
/// Seconds are stored as f64 bits (no `AtomicF64` in std), published with
/// release stores and read with acquire loads.
#[derive(Debug, Clone, Default)]
pub struct SharedTimingSource {
    seconds_bits: Arc<AtomicU64>,
}

impl SharedTimingSource {
    pub fn new() -> Self {
        Self {
            seconds_bits: Arc::new(AtomicU64::new(0.0_f64.to_bits())),
        }
    }

    /// Handle for the single writer, usually the audio callback.
    pub fn writer(&self) -> TimingWriter {
        TimingWriter {
            seconds_bits: Arc::clone(&self.seconds_bits),
        }
    }
}

impl TimingSource for SharedTimingSource {
    fn seconds(&self) -> f64 {
        f64::from_bits(self.seconds_bits.load(Ordering::Acquire))
    }
}

/// Write side of a [`SharedTimingSource`].
#[derive(Debug)]
pub struct TimingWriter {
    seconds_bits: Arc<AtomicU64>,
}

impl TimingWriter {
    pub fn set_seconds(&self, seconds: f64) {
        self.seconds_bits.store(seconds.to_bits(), Ordering::Release);
    }

    /// Advances by `frames` at `sample_rate`; called once per audio buffer.
    pub fn advance_frames(&self, frames: usize, sample_rate: u32) {
        let current = f64::from_bits(self.seconds_bits.load(Ordering::Relaxed));
        self.set_seconds(current + frames as f64 / sample_rate as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_source_accumulates() {
        let mut source = ManualTimingSource::new();
        source.advance(0.25);
        source.advance(0.5);
        assert_eq!(source.seconds(), 0.75);
        source.set_seconds(2.0);
        assert_eq!(source.seconds(), 2.0);
    }

    #[test]
    fn writer_publishes_to_reader_thread() {
        let source = SharedTimingSource::new();
        let writer = source.writer();
        let handle = std::thread::spawn(move || {
            for _ in 0..100 {
                writer.advance_frames(480, 48_000);
            }
        });
        handle.join().unwrap();
        assert!((source.seconds() - 1.0).abs() < 1e-9);
    }
}
