//! Swing: a long-short warp of beat positions inside a tempo segment.
//!
//! A swing cycle covers two subdivisions (`2 * division` beats). The first
//! subdivision takes `ratio` percent of the cycle's real duration and the
//! second takes the rest, so the notated off-beat lands late. Both warps are
//! piecewise linear, strictly increasing, exact inverses of each other and the
//! identity on whole-cycle boundaries.

use serde::{Deserialize, Serialize};

use crate::{BeatSyncError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Swing {
    /// Percentage of the cycle taken by the first subdivision (1..=99).
    pub ratio: u8,
    /// Length of one subdivision in beats.
    pub division: f64,
}

impl Default for Swing {
    fn default() -> Self {
        Self::STRAIGHT
    }
}

impl Swing {
    pub const STRAIGHT: Swing = Swing {
        ratio: 50,
        division: 0.5,
    };
    pub const SWING_EIGHTHS: Swing = Swing {
        ratio: 66,
        division: 0.5,
    };
    pub const SWING_SIXTEENTHS: Swing = Swing {
        ratio: 66,
        division: 0.25,
    };

    pub fn new(ratio: u8, division: f64) -> Result<Self> {
        let swing = Self { ratio, division };
        swing.validate()?;
        Ok(swing)
    }

    pub fn validate(&self) -> Result<()> {
        let ratio_ok = (1..=99).contains(&self.ratio);
        let division_ok = self.division.is_finite() && self.division > 0.0;
        if ratio_ok && division_ok {
            Ok(())
        } else {
            Err(BeatSyncError::InvalidSwing {
                ratio: self.ratio,
                division: self.division,
            })
        }
    }

    pub fn is_straight(&self) -> bool {
        self.ratio == 50
    }

    fn split(&self) -> f64 {
        self.ratio as f64 / 100.0
    }

    fn cycle(&self) -> f64 {
        self.division * 2.0
    }

    /// Maps a notated beat offset to the linear (time-proportional) offset.
    pub fn swing_to_linear(&self, beats: f64) -> f64 {
        if self.is_straight() {
            return beats;
        }
        let split = self.split();
        warp_cycles(beats, self.cycle(), |phase| {
            if phase < 0.5 {
                phase / 0.5 * split
            } else {
                split + (phase - 0.5) / 0.5 * (1.0 - split)
            }
        })
    }

    /// Inverse of [`Swing::swing_to_linear`].
    pub fn linear_to_swing(&self, beats: f64) -> f64 {
        if self.is_straight() {
            return beats;
        }
        let split = self.split();
        warp_cycles(beats, self.cycle(), |phase| {
            if phase < split {
                phase / split * 0.5
            } else {
                0.5 + (phase - split) / (1.0 - split) * 0.5
            }
        })
    }
}

/// Applies `warp` to the phase within each cycle, keeping the cycle index.
fn warp_cycles(beats: f64, cycle: f64, warp: impl Fn(f64) -> f64) -> f64 {
    let position = beats / cycle;
    let index = position.floor();
    let phase = position - index;
    (index + warp(phase)) * cycle
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn straight_is_identity() {
        for beats in [0.0, 0.25, 0.5, 1.75, 13.0, -2.5] {
            assert_eq!(Swing::STRAIGHT.swing_to_linear(beats), beats);
            assert_eq!(Swing::STRAIGHT.linear_to_swing(beats), beats);
        }
    }

    #[test]
    fn off_beat_lands_late() {
        let swing = Swing::SWING_EIGHTHS;
        assert!((swing.swing_to_linear(0.5) - 0.66).abs() < 1e-12);
        assert!((swing.linear_to_swing(0.66) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn whole_cycles_are_fixed_points() {
        let swing = Swing::SWING_SIXTEENTHS;
        for n in -4..8 {
            let beats = n as f64 * 0.5;
            assert!((swing.swing_to_linear(beats) - beats).abs() < 1e-12);
        }
    }

    #[test]
    fn rejects_out_of_range_settings() {
        assert!(Swing::new(0, 0.5).is_err());
        assert!(Swing::new(100, 0.5).is_err());
        assert!(Swing::new(60, 0.0).is_err());
        assert!(Swing::new(60, f64::NAN).is_err());
        assert!(Swing::new(60, 0.25).is_ok());
    }

    proptest! {
        #[test]
        fn warp_round_trips(ratio in 1u8..=99, division in 0.05f64..4.0, beats in -64.0f64..64.0) {
            let swing = Swing::new(ratio, division).unwrap();
            let back = swing.linear_to_swing(swing.swing_to_linear(beats));
            prop_assert!((back - beats).abs() < 1e-9);
        }

        #[test]
        fn warp_is_monotonic(ratio in 1u8..=99, a in 0.0f64..32.0, step in 0.0f64..2.0) {
            let swing = Swing::new(ratio, 0.5).unwrap();
            prop_assert!(swing.swing_to_linear(a) <= swing.swing_to_linear(a + step) + 1e-12);
        }
    }
}
