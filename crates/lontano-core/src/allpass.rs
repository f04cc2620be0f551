//! Modulated allpass filter for diffusion chains.
//!
//! A Schroeder allpass lattice over an interpolated delay line:
//!
//! ```text
//! v[n] = x[n] + feedback * d[n]
//! y[n] = -feedback * v[n] + d[n]
//! ```
//!
//! where `d[n]` is the delayed sample. The magnitude response is flat;
//! only phase is smeared, which is what makes cascades of these useful
//! for echo-density buildup without coloration.
//!
//! The read position is modulated sinusoidally by up to ±10% of the base
//! delay. Slow modulation breaks up the metallic ringing that static
//! allpass cascades develop.
//!
//! # Usage
//!
//! ```rust
//! use lontano_core::ModulatedAllpass;
//!
//! let mut ap = ModulatedAllpass::new(48000.0, 100.0, 50.0);
//! ap.set_feedback(0.5);
//! ap.set_modulation_rate(0.3);
//! ap.set_modulation_depth(0.4);
//! let out = ap.process(1.0);
//! assert!(out.is_finite());
//! ```

use crate::delay::InterpolatedDelay;
use crate::flush_denormal;
use core::f32::consts::TAU;
use libm::sinf;

/// Allpass filter with sinusoidal delay-time modulation.
///
/// # Invariants
///
/// - `feedback` is clamped to ±0.99 (lattice stays stable)
/// - effective delay never drops below 1 sample
/// - modulation excursion is at most ±10% of the base delay, so the read
///   head never crosses the write head
#[derive(Debug, Clone)]
pub struct ModulatedAllpass {
    delay: InterpolatedDelay,
    /// Base delay in samples (>= 1)
    base_delay: f32,
    feedback: f32,
    mod_depth: f32,
    /// Modulation rate in Hz (0 to 10)
    mod_rate: f32,
    /// Oscillator phase in radians, wrapped to [0, TAU)
    mod_phase: f32,
    sample_rate: f32,
    max_delay_ms: f32,
}

impl ModulatedAllpass {
    /// Create a new modulated allpass.
    ///
    /// # Arguments
    ///
    /// * `sample_rate` - Sample rate in Hz
    /// * `max_delay_ms` - Delay line capacity in milliseconds
    /// * `delay_ms` - Initial base delay in milliseconds
    pub fn new(sample_rate: f32, max_delay_ms: f32, delay_ms: f32) -> Self {
        let max_samples = (max_delay_ms / 1000.0 * sample_rate) as usize + 1;
        let mut ap = Self {
            delay: InterpolatedDelay::new(max_samples.max(2)),
            base_delay: 1.0,
            feedback: 0.5,
            mod_depth: 0.0,
            mod_rate: 0.0,
            mod_phase: 0.0,
            sample_rate,
            max_delay_ms,
        };
        ap.set_delay_ms(delay_ms);
        ap
    }

    /// Set the base delay in milliseconds.
    ///
    /// Clamped so that the delay plus the full modulation excursion stays
    /// inside the buffer.
    pub fn set_delay_ms(&mut self, delay_ms: f32) {
        let samples = delay_ms / 1000.0 * self.sample_rate;
        // Leave 10% headroom for modulation plus the interpolation tap
        let limit = (self.delay.capacity() as f32 - 2.0) / 1.1;
        self.base_delay = samples.clamp(1.0, limit.max(1.0));
    }

    /// Set the feedback coefficient, clamped to ±0.99.
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(-0.99, 0.99);
    }

    /// Set the modulation rate in Hz, clamped to 0..10.
    pub fn set_modulation_rate(&mut self, rate_hz: f32) {
        self.mod_rate = rate_hz.clamp(0.0, 10.0);
    }

    /// Set the modulation depth, clamped to 0..1.
    ///
    /// At depth 1.0 the delay swings ±10% of the base delay.
    pub fn set_modulation_depth(&mut self, depth: f32) {
        self.mod_depth = depth.clamp(0.0, 1.0);
    }

    /// Update the sample rate, rebuilding the delay line.
    ///
    /// Preserves the configured delay time in milliseconds; audio state is
    /// discarded.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        let delay_ms = self.base_delay / self.sample_rate * 1000.0;
        self.sample_rate = sample_rate;
        let max_samples = (self.max_delay_ms / 1000.0 * sample_rate) as usize + 1;
        self.delay = InterpolatedDelay::new(max_samples.max(2));
        self.set_delay_ms(delay_ms);
        self.mod_phase = 0.0;
    }

    /// Process one sample through the lattice.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let modulation = sinf(self.mod_phase) * self.mod_depth;
        let delay_samples = (self.base_delay + modulation * self.base_delay * 0.1).max(1.0);

        let delayed = self.delay.read(delay_samples);
        let v = flush_denormal(input + self.feedback * delayed);
        self.delay.write(v);

        self.mod_phase += TAU * self.mod_rate / self.sample_rate;
        if self.mod_phase >= TAU {
            self.mod_phase -= TAU;
        }

        -self.feedback * v + delayed
    }

    /// Clear audio state and restart the modulation oscillator.
    pub fn reset(&mut self) {
        self.delay.clear();
        self.mod_phase = 0.0;
    }
}
