//! Feedback delay network — the late reverb tail.
//!
//! Eight delay lines cross-coupled through a Hadamard matrix, with a
//! one-pole damping filter and an independent slow modulation LFO per
//! line. Mono input is injected into every line; outputs are split
//! even/odd into a decorrelated stereo pair.

use core::f32::consts::{PI, TAU};
use libm::{powf, sinf};
use lontano_core::{InterpolatedDelay, OnePole, StereoEffect, flush_denormal, lerp, mono_sum};

/// Line lengths in samples at the 44.1kHz reference rate.
/// Mutually coprime so the modes interleave instead of stacking.
const DELAY_TUNINGS_44K: [usize; 8] = [1499, 1699, 1999, 2347, 2791, 3109, 3541, 3907];

/// Reference sample rate for tuning constants.
const REFERENCE_RATE: f32 = 44100.0;

/// Delay line capacity in seconds (covers size 4.0 plus modulation).
const LINE_SECONDS: f32 = 2.0;

/// 8x8 Hadamard matrix scaled by 1/sqrt(8).
///
/// Orthonormal (`M * Mᵀ = I`): the mixing stage neither adds nor removes
/// energy, so loop stability depends only on the per-line gains.
const HADAMARD: [[f32; 8]; 8] = {
    const P: f32 = 0.35355338; // 1/sqrt(8)
    const N: f32 = -0.35355338;
    [
        [P, P, P, P, P, P, P, P],
        [P, N, P, N, P, N, P, N],
        [P, P, N, N, P, P, N, N],
        [P, N, N, P, P, N, N, P],
        [P, P, P, P, N, N, N, N],
        [P, N, P, N, N, P, N, P],
        [P, P, N, N, N, N, P, P],
        [P, N, N, P, N, P, P, N],
    ]
};

/// Eight-line FDN reverb tank.
///
/// # Parameters
///
/// - `decay`: RT60 in seconds, 0.1-30
/// - `size`: delay-length multiplier, 0.1-4
/// - `damping`: HF absorption in the feedback path, 0-1
/// - `modulation depth/rate`: slow line-length wobble that breaks up
///   metallic resonances
///
/// # Invariants
///
/// - every per-line feedback gain satisfies |g| < 1 for in-range
///   decay/size/sample-rate, so an undriven tank always rings out
#[derive(Debug, Clone)]
pub struct FdnTank {
    delays: [InterpolatedDelay; 8],
    damping_filters: [OnePole; 8],
    feedback_gains: [f32; 8],
    /// Per-line base delay in samples at the current rate (before `size`)
    base_delays: [f32; 8],
    /// Scratch for the per-sample line reads
    line_out: [f32; 8],
    mod_phases: [f32; 8],
    mod_rates: [f32; 8],
    decay_seconds: f32,
    size: f32,
    damping: f32,
    mod_depth: f32,
    mod_rate: f32,
    sample_rate: f32,
}

impl FdnTank {
    /// Create a tank at the given sample rate with default parameters
    /// (decay 2s, size 1, damping 0.5).
    pub fn new(sample_rate: f32) -> Self {
        let delays = core::array::from_fn(|_| InterpolatedDelay::from_time(sample_rate, LINE_SECONDS));
        let damping_filters = core::array::from_fn(|_| OnePole::new(sample_rate, 7000.0));
        let base_delays =
            core::array::from_fn(|i| DELAY_TUNINGS_44K[i] as f32 * sample_rate / REFERENCE_RATE);

        let mut tank = Self {
            delays,
            damping_filters,
            feedback_gains: [0.0; 8],
            base_delays,
            line_out: [0.0; 8],
            mod_phases: core::array::from_fn(|i| i as f32 * PI / 4.0),
            mod_rates: [0.0; 8],
            decay_seconds: 2.0,
            size: 1.0,
            damping: 0.5,
            mod_depth: 0.3,
            mod_rate: 0.15,
            sample_rate,
        };
        tank.update_feedback_gains();
        tank.update_damping_filters();
        tank.update_mod_rates();
        tank
    }

    /// Set the decay time (RT60) in seconds, clamped to 0.1-30.
    pub fn set_decay(&mut self, seconds: f32) {
        self.decay_seconds = seconds.clamp(0.1, 30.0);
        self.update_feedback_gains();
    }

    /// Get the current decay time in seconds.
    pub fn decay(&self) -> f32 {
        self.decay_seconds
    }

    /// Set the size multiplier, clamped to 0.1-4.
    ///
    /// Scales every line length; gains are recomputed so the configured
    /// decay time is preserved.
    pub fn set_size(&mut self, size: f32) {
        self.size = size.clamp(0.1, 4.0);
        self.update_feedback_gains();
    }

    /// Get the current size multiplier.
    pub fn size(&self) -> f32 {
        self.size
    }

    /// Set HF damping, clamped to 0-1 (0 = bright, 1 = dark).
    pub fn set_damping(&mut self, damping: f32) {
        self.damping = damping.clamp(0.0, 1.0);
        self.update_damping_filters();
    }

    /// Get the current damping.
    pub fn damping(&self) -> f32 {
        self.damping
    }

    /// Set modulation depth, clamped to 0-1 (1.0 swings each line ±5 samples).
    pub fn set_modulation_depth(&mut self, depth: f32) {
        self.mod_depth = depth.clamp(0.0, 1.0);
    }

    /// Set the modulation rate in Hz, clamped to 0-2.
    ///
    /// Lines run at staggered multiples of the base rate so no two lines
    /// wobble in phase.
    pub fn set_modulation_rate(&mut self, rate_hz: f32) {
        self.mod_rate = rate_hz.clamp(0.0, 2.0);
        self.update_mod_rates();
    }

    /// Per-line feedback gains (for stability checks and tuning tools).
    pub fn feedback_gains(&self) -> [f32; 8] {
        self.feedback_gains
    }

    /// The feedback matrix (for orthonormality checks and tuning tools).
    pub fn feedback_matrix() -> [[f32; 8]; 8] {
        HADAMARD
    }

    /// Gain that decays a loop of `delay` samples to -60 dB in
    /// `decay_seconds`, times a 0.65 headroom scale.
    fn line_gain(delay_samples: f32, sample_rate: f32, decay_seconds: f32) -> f32 {
        powf(0.001, delay_samples / (sample_rate * decay_seconds)) * 0.65
    }

    fn update_feedback_gains(&mut self) {
        for i in 0..8 {
            let delay = self.base_delays[i] * self.size;
            self.feedback_gains[i] = Self::line_gain(delay, self.sample_rate, self.decay_seconds);
        }
    }

    fn update_damping_filters(&mut self) {
        // damping 0 -> 12kHz (open), 1 -> 2kHz (dark)
        let cutoff = lerp(12000.0, 2000.0, self.damping).clamp(1500.0, 12000.0);
        for filter in &mut self.damping_filters {
            filter.set_frequency(cutoff);
        }
    }

    fn update_mod_rates(&mut self) {
        // Ladder 0.1 + 0.05*i Hz at the default rate of 0.15
        for i in 0..8 {
            self.mod_rates[i] = self.mod_rate * (2.0 + i as f32) / 3.0;
        }
    }
}

impl StereoEffect for FdnTank {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let mono = mono_sum(left, right);
        let depth_samples = self.mod_depth * 5.0;

        // Read and damp all lines before any write so the matrix sees one
        // consistent generation.
        for i in 0..8 {
            let modulation = depth_samples * sinf(self.mod_phases[i]);
            self.mod_phases[i] += TAU * self.mod_rates[i] / self.sample_rate;
            if self.mod_phases[i] >= TAU {
                self.mod_phases[i] -= TAU;
            }

            let delay_samples = (self.base_delays[i] * self.size + modulation).max(1.0);
            let raw = self.delays[i].read(delay_samples);
            self.line_out[i] = self.damping_filters[i].process(raw);
        }

        for i in 0..8 {
            let mut mixed = 0.0;
            for j in 0..8 {
                mixed += HADAMARD[i][j] * self.line_out[j];
            }
            let feedback = flush_denormal(mono + self.feedback_gains[i] * mixed);
            self.delays[i].write(feedback);
        }

        let out_l = (self.line_out[0] + self.line_out[2] + self.line_out[4] + self.line_out[6]) * 0.25;
        let out_r = (self.line_out[1] + self.line_out[3] + self.line_out[5] + self.line_out[7]) * 0.25;
        (out_l, out_r)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.delays = core::array::from_fn(|_| InterpolatedDelay::from_time(sample_rate, LINE_SECONDS));
        self.base_delays =
            core::array::from_fn(|i| DELAY_TUNINGS_44K[i] as f32 * sample_rate / REFERENCE_RATE);
        for filter in &mut self.damping_filters {
            filter.set_sample_rate(sample_rate);
        }
        self.update_feedback_gains();
        self.update_damping_filters();
    }

    fn reset(&mut self) {
        for delay in &mut self.delays {
            delay.clear();
        }
        for filter in &mut self.damping_filters {
            filter.reset();
        }
        self.line_out = [0.0; 8];
        self.mod_phases = core::array::from_fn(|i| i as f32 * PI / 4.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rms(samples: &[f32]) -> f32 {
        let sum: f32 = samples.iter().map(|s| s * s).sum();
        libm::sqrtf(sum / samples.len() as f32)
    }

    #[test]
    fn matrix_is_orthonormal() {
        let m = FdnTank::feedback_matrix();
        for i in 0..8 {
            for j in 0..8 {
                let mut dot = 0.0f32;
                for k in 0..8 {
                    dot += m[i][k] * m[j][k];
                }
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(
                    (dot - expected).abs() < 1e-6,
                    "M*Mt[{i}][{j}] = {dot}, expected {expected}"
                );
            }
        }
    }

    #[test]
    fn feedback_gains_match_closed_form() {
        for &(sr, decay, size) in &[
            (44100.0f32, 0.1f32, 0.1f32),
            (44100.0, 2.0, 1.0),
            (48000.0, 8.0, 2.5),
            (96000.0, 30.0, 4.0),
        ] {
            let mut tank = FdnTank::new(sr);
            tank.set_decay(decay);
            tank.set_size(size);

            let gains = tank.feedback_gains();
            for (i, &g) in gains.iter().enumerate() {
                let delay = DELAY_TUNINGS_44K[i] as f32 * sr / REFERENCE_RATE * size;
                let expected = powf(0.001, delay / (sr * decay)) * 0.65;
                assert!(
                    (g - expected).abs() < 1e-6,
                    "gain[{i}] = {g}, closed form {expected} (sr={sr}, decay={decay}, size={size})"
                );
                assert!(g.abs() < 1.0, "gain[{i}] = {g} must stay below unity");
            }
        }
    }

    #[test]
    fn impulse_rings_out() {
        let mut tank = FdnTank::new(48000.0);
        tank.set_decay(1.0);
        tank.set_damping(0.3);

        tank.process(1.0, 1.0);

        // Collect 4 seconds, compare RMS of successive 1s windows
        let mut windows = Vec::new();
        for _ in 0..4 {
            let mut buf = Vec::with_capacity(48000);
            for _ in 0..48000 {
                let (l, r) = tank.process(0.0, 0.0);
                assert!(l.is_finite() && r.is_finite());
                buf.push((l + r) * 0.5);
            }
            windows.push(rms(&buf));
        }

        assert!(windows[0] > 0.0, "Tank should ring at all");
        for w in windows.windows(2) {
            assert!(
                w[1] < w[0],
                "Tail RMS should decay monotonically: {:?}",
                windows
            );
        }
        // After 4x the decay time the tail is far down
        assert!(windows[3] < windows[0] * 0.05);
    }

    #[test]
    fn longer_decay_rings_longer() {
        let tail_energy = |decay: f32| {
            let mut tank = FdnTank::new(48000.0);
            tank.set_decay(decay);
            tank.process(1.0, 1.0);
            // Skip the first second, then measure
            for _ in 0..48000 {
                tank.process(0.0, 0.0);
            }
            let mut energy = 0.0f32;
            for _ in 0..48000 {
                let (l, r) = tank.process(0.0, 0.0);
                energy += l * l + r * r;
            }
            energy
        };

        assert!(tail_energy(5.0) > tail_energy(0.5) * 10.0);
    }

    #[test]
    fn reset_silences_tank() {
        let mut tank = FdnTank::new(48000.0);
        for _ in 0..10000 {
            tank.process(0.3, -0.2);
        }
        tank.reset();
        for _ in 0..10000 {
            let (l, r) = tank.process(0.0, 0.0);
            assert_eq!(l, 0.0);
            assert_eq!(r, 0.0);
        }
    }

    #[test]
    fn reset_is_idempotent() {
        let mut tank = FdnTank::new(48000.0);
        for _ in 0..5000 {
            tank.process(1.0, 1.0);
        }
        tank.reset();
        let mut first = Vec::new();
        first.push(tank.process(1.0, 0.5));
        for _ in 0..1000 {
            first.push(tank.process(0.0, 0.0));
        }

        tank.reset();
        tank.reset(); // twice should be indistinguishable from once
        let mut second = Vec::new();
        second.push(tank.process(1.0, 0.5));
        for _ in 0..1000 {
            second.push(tank.process(0.0, 0.0));
        }

        assert_eq!(first, second);
    }

    #[test]
    fn parameter_clamps() {
        let mut tank = FdnTank::new(48000.0);
        tank.set_decay(1000.0);
        assert!(tank.decay() <= 30.0);
        tank.set_decay(0.0);
        assert!(tank.decay() >= 0.1);
        tank.set_size(100.0);
        assert!(tank.size() <= 4.0);
        tank.set_damping(-2.0);
        assert!(tank.damping() >= 0.0);
    }

    #[test]
    fn damping_darkens_tail() {
        let hf_energy = |damping: f32| {
            let mut tank = FdnTank::new(48000.0);
            tank.set_decay(2.0);
            tank.set_damping(damping);
            tank.process(1.0, 1.0);
            // Let the tail develop, then measure sample-to-sample differences
            // (a cheap HF proxy)
            for _ in 0..24000 {
                tank.process(0.0, 0.0);
            }
            let mut hf = 0.0f32;
            let mut prev = 0.0f32;
            for _ in 0..24000 {
                let (l, r) = tank.process(0.0, 0.0);
                let m = (l + r) * 0.5;
                hf += (m - prev) * (m - prev);
                prev = m;
            }
            hf
        };

        assert!(
            hf_energy(0.9) < hf_energy(0.1),
            "Heavy damping should remove HF from the tail"
        );
    }
}
