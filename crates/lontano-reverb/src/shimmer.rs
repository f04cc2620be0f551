//! Pitch-shifted regeneration for the late tail.
//!
//! A delay-line pitch shifter: the read delay sweeps as a sawtooth, and
//! reading a moving tap transposes the signal (the Doppler effect on a
//! tape head). Two read heads half a window apart with a triangular
//! crossfade hide the sawtooth wrap.
//!
//! The shifter itself is 100% wet. `feedback` and `mix` are wiring
//! levels for the surrounding engine, which folds the shifted signal
//! into the late loop so each round trip transposes again.

use libm::{floorf, powf};
use lontano_core::InterpolatedDelay;

const BUFFER_SECONDS: f32 = 0.5;
const WINDOW_MS: f32 = 100.0;

/// Dual-head sweeping pitch shifter.
#[derive(Debug, Clone)]
pub struct ShimmerEffect {
    line: InterpolatedDelay,
    /// Sawtooth position in [0, 1)
    phase: f32,
    pitch_semitones: f32,
    pitch_ratio: f32,
    feedback: f32,
    mix: f32,
    enabled: bool,
    window_samples: f32,
}

impl ShimmerEffect {
    /// Create a shifter at the given sample rate, disabled, tuned one
    /// octave up.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            line: InterpolatedDelay::from_time(sample_rate, BUFFER_SECONDS),
            phase: 0.0,
            pitch_semitones: 12.0,
            pitch_ratio: 2.0,
            feedback: 0.3,
            mix: 0.1,
            enabled: false,
            window_samples: WINDOW_MS / 1000.0 * sample_rate,
        }
    }

    /// Enable or disable the shifter. The engine skips the insert
    /// entirely while disabled.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether the shifter is active.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Set the transposition in semitones, clamped to ±24.
    pub fn set_pitch_shift(&mut self, semitones: f32) {
        self.pitch_semitones = semitones.clamp(-24.0, 24.0);
        self.pitch_ratio = powf(2.0, self.pitch_semitones / 12.0);
    }

    /// Get the transposition in semitones.
    pub fn pitch_shift(&self) -> f32 {
        self.pitch_semitones
    }

    /// Set the regeneration level the engine feeds back into the tank,
    /// clamped to 0-0.95.
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.95);
    }

    /// Get the regeneration level.
    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// Set how much shifted signal the engine blends into the late
    /// output, clamped to 0-1.
    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    /// Get the blend level.
    pub fn mix(&self) -> f32 {
        self.mix
    }

    /// Shift one sample. Output is fully wet.
    pub fn process_sample(&mut self, input: f32) -> f32 {
        self.line.write(input);

        let phase2 = {
            let p = self.phase + 0.5;
            p - floorf(p)
        };
        let delay1 = self.phase * self.window_samples;
        let delay2 = phase2 * self.window_samples;
        // Triangular fades: each head is silent exactly when it wraps,
        // and the two weights always sum to 1
        let weight1 = 1.0 - (2.0 * self.phase - 1.0).abs();
        let weight2 = 1.0 - (2.0 * phase2 - 1.0).abs();

        let out = self.line.read(delay1) * weight1 + self.line.read(delay2) * weight2;

        // Delay drift of (1 - ratio) per sample transposes by ratio
        self.phase += (1.0 - self.pitch_ratio) / self.window_samples;
        self.phase -= floorf(self.phase);

        out
    }

    /// Update the sample rate, clearing audio state.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.line = InterpolatedDelay::from_time(sample_rate, BUFFER_SECONDS);
        self.window_samples = WINDOW_MS / 1000.0 * sample_rate;
        self.phase = 0.0;
    }

    /// Clear the buffer and restart the sweep.
    pub fn reset(&mut self) {
        self.line.clear();
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::TAU;

    /// Positive-going zero crossings in `samples`, a cheap frequency
    /// estimate for a lone sine.
    fn count_crossings(samples: &[f32]) -> usize {
        samples
            .windows(2)
            .filter(|w| w[0] <= 0.0 && w[1] > 0.0)
            .count()
    }

    /// Run a 220Hz sine through the shifter and count crossings over
    /// the final half second.
    fn crossings_at(semitones: f32) -> usize {
        let sample_rate = 48000.0;
        let mut shimmer = ShimmerEffect::new(sample_rate);
        shimmer.set_pitch_shift(semitones);

        let mut out = Vec::new();
        for i in 0..48000 {
            let x = libm::sinf(TAU * 220.0 * i as f32 / sample_rate);
            out.push(shimmer.process_sample(x));
        }
        count_crossings(&out[24000..])
    }

    #[test]
    fn octave_up_doubles_frequency() {
        // 220Hz doubled -> 440Hz -> ~220 crossings in half a second
        let n = crossings_at(12.0);
        assert!((200..=240).contains(&n), "Got {n} crossings, expected ~220");
    }

    #[test]
    fn octave_down_halves_frequency() {
        let n = crossings_at(-12.0);
        assert!((45..=65).contains(&n), "Got {n} crossings, expected ~55");
    }

    #[test]
    fn zero_shift_passes_frequency_through() {
        let n = crossings_at(0.0);
        assert!((95..=125).contains(&n), "Got {n} crossings, expected ~110");
    }

    #[test]
    fn zero_shift_is_a_static_delay() {
        let mut shimmer = ShimmerEffect::new(48000.0);
        shimmer.set_pitch_shift(0.0);

        // At ratio 1 the sweep is frozen at phase 0: head 1 has zero
        // weight and head 2 sits at half a window
        let expected = (0.5 * WINDOW_MS / 1000.0 * 48000.0) as usize;
        let mut out = Vec::new();
        out.push(shimmer.process_sample(1.0));
        for _ in 0..expected + 10 {
            out.push(shimmer.process_sample(0.0));
        }

        for (i, &s) in out.iter().enumerate() {
            if i == expected {
                assert!((s - 1.0).abs() < 1e-5);
            } else {
                assert!(s.abs() < 1e-5, "Unexpected output {s} at {i}");
            }
        }
    }

    #[test]
    fn output_amplitude_stays_bounded() {
        let mut shimmer = ShimmerEffect::new(48000.0);
        shimmer.set_pitch_shift(7.3);

        for i in 0..96000 {
            let x = libm::sinf(TAU * 500.0 * i as f32 / 48000.0);
            let y = shimmer.process_sample(x);
            assert!(y.is_finite());
            // Two heads with weights summing to 1 can never exceed the
            // peak of the buffered signal
            assert!(y.abs() <= 1.01, "Output {y} exceeds input peak");
        }
    }

    #[test]
    fn parameters_clamp() {
        let mut shimmer = ShimmerEffect::new(48000.0);
        shimmer.set_pitch_shift(99.0);
        assert_eq!(shimmer.pitch_shift(), 24.0);
        shimmer.set_feedback(2.0);
        assert_eq!(shimmer.feedback(), 0.95);
        shimmer.set_mix(-0.5);
        assert_eq!(shimmer.mix(), 0.0);
    }

    #[test]
    fn reset_makes_processing_repeatable() {
        let mut shimmer = ShimmerEffect::new(48000.0);
        shimmer.set_pitch_shift(5.0);

        let run = |s: &mut ShimmerEffect| {
            (0..2000)
                .map(|i| s.process_sample(libm::sinf(i as f32 * 0.01)))
                .collect::<Vec<_>>()
        };

        let first = run(&mut shimmer);
        shimmer.reset();
        let second = run(&mut shimmer);
        assert_eq!(first, second);
    }
}
