//! Tear-free publication of the clock position to reader threads.
//!
//! The clock is the only writer. Readers (rendering, UI) retry until they see
//! the same even sequence number before and after reading both values.

use std::{
    hint,
    sync::{
        atomic::{fence, AtomicU64, Ordering},
        Arc,
    },
};

#[derive(Debug)]
struct SharedPosition {
    sequence: AtomicU64,
    seconds_bits: AtomicU64,
    beat_bits: AtomicU64,
}

/// Read-only view of a [`Clock`](super::Clock)'s seconds and beat.
#[derive(Debug, Clone)]
pub struct PositionHandle {
    shared: Arc<SharedPosition>,
}

/// A consistent `(seconds, beat)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub seconds: f64,
    pub beat: f64,
}

impl PositionHandle {
    pub(crate) fn new(seconds: f64, beat: f64) -> Self {
        Self {
            shared: Arc::new(SharedPosition {
                sequence: AtomicU64::new(0),
                seconds_bits: AtomicU64::new(seconds.to_bits()),
                beat_bits: AtomicU64::new(beat.to_bits()),
            }),
        }
    }

    /// Must only be called by the owning clock.
    pub(crate) fn publish(&self, seconds: f64, beat: f64) {
        let shared = &self.shared;
        let sequence = shared.sequence.load(Ordering::Relaxed);
        shared.sequence.store(sequence.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        shared.seconds_bits.store(seconds.to_bits(), Ordering::Relaxed);
        shared.beat_bits.store(beat.to_bits(), Ordering::Relaxed);
        shared
            .sequence
            .store(sequence.wrapping_add(2), Ordering::Release);
    }

    pub fn load(&self) -> Position {
        let shared = &self.shared;
        loop {
            let before = shared.sequence.load(Ordering::Acquire);
            if before & 1 == 1 {
                hint::spin_loop();
                continue;
            }
            let seconds = f64::from_bits(shared.seconds_bits.load(Ordering::Relaxed));
            let beat = f64::from_bits(shared.beat_bits.load(Ordering::Relaxed));
            fence(Ordering::Acquire);
            if shared.sequence.load(Ordering::Relaxed) == before {
                return Position { seconds, beat };
            }
        }
    }

    pub fn seconds(&self) -> f64 {
        self.load().seconds
    }

    pub fn beat(&self) -> f64 {
        self.load().beat
    }
}
