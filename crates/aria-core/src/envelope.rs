//! Amplitude envelope synthesis.
//!
//! An [`EnvelopeCurve`] is planned once per note from the caller's
//! [`EnvelopeParams`](crate::score::EnvelopeParams) and the note's duration,
//! then evaluated at arbitrary times by the voice that plays the note. The
//! curve has the classic four phases (attack, decay, sustain, release) and
//! two hard guarantees:
//!
//! - the level is exactly 0 at the start of the note (no onset click), and
//! - the level is exactly 0 at and after the end of the note (no phase may
//!   extend past the note's declared duration).
//!
//! When the configured phases do not fit the note, the attack is clamped to
//! the duration and the decay and release compress proportionally into
//! whatever remains, with the sustain plateau absorbed first.

use crate::score::EnvelopeParams;

/// A planned amplitude curve for a single note.
///
/// All fields are phase lengths in seconds; they always satisfy
/// `attack + decay + sustain + release == duration` (within floating-point
/// rounding).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvelopeCurve {
    attack: f64,
    decay: f64,
    sustain: f64,
    release: f64,
    sustain_level: f64,
    duration: f64,
}

impl EnvelopeCurve {
    /// Plan the phase lengths for a note of the given duration.
    pub fn plan(params: &EnvelopeParams, duration: f64) -> Self {
        let duration = duration.max(0.0);
        let sustain_level = params.sustain.clamp(0.0, 1.0);

        let attack = params.attack.max(0.0).min(duration);
        let remaining = duration - attack;

        let decay = params.decay.max(0.0);
        let release = params.release.max(0.0);

        let (decay, release, sustain) = if decay + release <= remaining {
            (decay, release, remaining - decay - release)
        } else if decay + release > 0.0 {
            // Compress decay and release proportionally; the sustain plateau
            // disappears first.
            let scale = remaining / (decay + release);
            (decay * scale, release * scale, 0.0)
        } else {
            (0.0, 0.0, remaining)
        };

        Self {
            attack,
            decay,
            sustain,
            release,
            sustain_level,
            duration,
        }
    }

    /// The note duration this curve was planned for.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Amplitude level at time `t` seconds from the note's start.
    ///
    /// Returns exactly 0.0 for `t <= 0` and for `t >= duration`.
    pub fn level_at(&self, t: f64) -> f64 {
        if t <= 0.0 || t >= self.duration {
            return 0.0;
        }

        if t < self.attack {
            return t / self.attack;
        }

        let t = t - self.attack;
        if t < self.decay {
            return 1.0 - (1.0 - self.sustain_level) * (t / self.decay);
        }

        let t = t - self.decay;
        if t < self.sustain {
            return self.sustain_level;
        }

        // Release: linear ramp to 0, ending exactly at the note's end.
        let t = t - self.sustain;
        if self.release > 0.0 {
            self.sustain_level * (1.0 - t / self.release)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(attack: f64, decay: f64, sustain: f64, release: f64) -> EnvelopeParams {
        EnvelopeParams {
            attack,
            decay,
            sustain,
            release,
        }
    }

    #[test]
    fn test_zero_at_both_ends() {
        let curve = EnvelopeCurve::plan(&params(0.01, 0.05, 0.7, 0.02), 0.5);
        assert_eq!(curve.level_at(0.0), 0.0);
        assert_eq!(curve.level_at(0.5), 0.0);
        assert_eq!(curve.level_at(-1.0), 0.0);
        assert_eq!(curve.level_at(1.0), 0.0);
    }

    #[test]
    fn test_monotonic_attack_and_release() {
        let curve = EnvelopeCurve::plan(&params(0.01, 0.05, 0.7, 0.02), 0.5);

        let mut prev = 0.0;
        for i in 1..=100 {
            let t = 0.01 * i as f64 / 100.0;
            let level = curve.level_at(t);
            assert!(level >= prev, "attack not monotonic at t={t}");
            prev = level;
        }

        let mut prev = 1.0;
        for i in 1..=100 {
            let t = 0.48 + 0.02 * i as f64 / 100.0;
            let level = curve.level_at(t);
            assert!(level <= prev, "release not monotonic at t={t}");
            prev = level;
        }
    }

    #[test]
    fn test_phase_levels() {
        let curve = EnvelopeCurve::plan(&params(0.1, 0.1, 0.5, 0.1), 1.0);
        // Peak at the end of the attack
        assert!((curve.level_at(0.1) - 1.0).abs() < 1e-9);
        // Sustain level after the decay
        assert!((curve.level_at(0.2) - 0.5).abs() < 1e-9);
        assert!((curve.level_at(0.5) - 0.5).abs() < 1e-9);
        // Halfway through the release
        assert!((curve.level_at(0.95) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_compression_when_phases_do_not_fit() {
        // attack + decay >= duration: decay and release compress, sustain
        // plateau disappears, and the curve still ends at zero.
        let curve = EnvelopeCurve::plan(&params(0.3, 0.3, 0.7, 0.3), 0.5);
        assert!((curve.attack - 0.3).abs() < 1e-9);
        assert_eq!(curve.sustain, 0.0);
        assert!((curve.decay + curve.release - 0.2).abs() < 1e-9);
        // Proportional: decay and release were equal, so they stay equal.
        assert!((curve.decay - curve.release).abs() < 1e-9);
        assert_eq!(curve.level_at(0.5), 0.0);
        assert!(curve.level_at(0.499) >= 0.0);
    }

    #[test]
    fn test_attack_longer_than_note() {
        let curve = EnvelopeCurve::plan(&params(2.0, 0.1, 0.7, 0.1), 0.5);
        assert!((curve.attack - 0.5).abs() < 1e-9);
        assert_eq!(curve.level_at(0.5), 0.0);
        // Still ramping up just before the end.
        assert!(curve.level_at(0.49) > 0.9);
    }

    #[test]
    fn test_phases_sum_to_duration() {
        for (p, d) in [
            (params(0.01, 0.05, 0.7, 0.02), 0.5),
            (params(0.3, 0.3, 0.7, 0.3), 0.5),
            (params(0.0, 0.0, 1.0, 0.0), 0.25),
            (params(1.0, 1.0, 0.5, 1.0), 0.1),
        ] {
            let curve = EnvelopeCurve::plan(&p, d);
            let sum = curve.attack + curve.decay + curve.sustain + curve.release;
            assert!((sum - d).abs() < 1e-9, "phases sum to {sum}, expected {d}");
        }
    }

    #[test]
    fn test_zero_attack_has_no_onset_click_at_exactly_zero() {
        let curve = EnvelopeCurve::plan(&params(0.0, 0.1, 0.5, 0.1), 1.0);
        assert_eq!(curve.level_at(0.0), 0.0);
        // Immediately after onset the decay phase is already in effect.
        assert!(curve.level_at(1e-6) > 0.9);
    }
}
