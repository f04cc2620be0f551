//! The full reverb: every section wired into one stereo effect.
//!
//! ```text
//! in -> pre-delay -+-> early reflections ----------------+
//!                  |                                     v
//!                  +-> input diffusion -> FDN tank -> (+wet)
//!                          ^               |
//!                          |           shimmer insert
//!                          +--- x feedback -+-> x mix into late
//!                                           |
//!                late -> output diffusion --+
//!
//! wet -> width -> low cut -> high cut -> out
//! ```
//!
//! The output is fully wet. Dry blending is the caller's business.

use lontano_core::{
    Biquad, InterpolatedDelay, StereoEffect, highpass_coefficients, lowpass_coefficients, mono_sum,
};

use crate::diffusion::DiffusionSection;
use crate::early_reflections::{EarlyReflections, RoomGeometry};
use crate::fdn::FdnTank;
use crate::shimmer::ShimmerEffect;

const PRE_DELAY_SECONDS: f32 = 0.5;
const FILTER_Q: f32 = 0.707;

/// Stereo room reverb.
///
/// Sections with a neutral setting are skipped outright: pre-delay at
/// 0 ms, early reflections at level 0, the tank at late level 0,
/// diffusion at 0, width at 1, and the shimmer insert while disabled
/// all cost nothing and leave no state behind.
#[derive(Debug, Clone)]
pub struct ReverbEngine {
    pre_delay: [InterpolatedDelay; 2],
    early: EarlyReflections,
    input_diffusion: DiffusionSection,
    output_diffusion: DiffusionSection,
    tank: FdnTank,
    shimmer: ShimmerEffect,
    /// Last shimmer output, re-injected into the tank input
    shimmer_return: f32,
    low_cut: [Biquad; 2],
    high_cut: [Biquad; 2],
    pre_delay_ms: f32,
    diffusion: f32,
    width: f32,
    early_level: f32,
    late_level: f32,
    high_cut_hz: f32,
    low_cut_hz: f32,
    sample_rate: f32,
}

impl ReverbEngine {
    /// Build a reverb at the given sample rate with moderate-room
    /// defaults (2s decay, 30% early, 70% late, 8kHz high cut).
    pub fn new(sample_rate: f32) -> Self {
        let mut engine = Self {
            pre_delay: core::array::from_fn(|_| {
                InterpolatedDelay::from_time(sample_rate, PRE_DELAY_SECONDS)
            }),
            early: EarlyReflections::new(sample_rate),
            input_diffusion: DiffusionSection::new(sample_rate),
            output_diffusion: DiffusionSection::new(sample_rate),
            tank: FdnTank::new(sample_rate),
            shimmer: ShimmerEffect::new(sample_rate),
            shimmer_return: 0.0,
            low_cut: [Biquad::new(), Biquad::new()],
            high_cut: [Biquad::new(), Biquad::new()],
            pre_delay_ms: 0.0,
            diffusion: 0.5,
            width: 1.0,
            early_level: 0.3,
            late_level: 0.7,
            high_cut_hz: 8000.0,
            low_cut_hz: 80.0,
            sample_rate,
        };
        engine.input_diffusion.set_diffusion(engine.diffusion);
        engine.update_low_cut();
        engine.update_high_cut();
        engine
    }

    /// Set pre-delay in milliseconds, clamped to 0-500. At 0 the line
    /// is bypassed entirely.
    pub fn set_pre_delay(&mut self, pre_delay_ms: f32) {
        self.pre_delay_ms = pre_delay_ms.clamp(0.0, 500.0);
    }

    /// Get the pre-delay in milliseconds.
    pub fn pre_delay(&self) -> f32 {
        self.pre_delay_ms
    }

    /// Set the tail decay time (RT60) in seconds, clamped to 0.1-30.
    pub fn set_decay(&mut self, seconds: f32) {
        self.tank.set_decay(seconds);
    }

    /// Get the decay time in seconds.
    pub fn decay(&self) -> f32 {
        self.tank.decay()
    }

    /// Set the tank size multiplier, clamped to 0.1-4.
    pub fn set_size(&mut self, size: f32) {
        self.tank.set_size(size);
    }

    /// Get the size multiplier.
    pub fn size(&self) -> f32 {
        self.tank.size()
    }

    /// Set input diffusion, clamped to 0-1. The output diffuser keeps
    /// its fixed tuning; at 0 both are bypassed.
    pub fn set_diffusion(&mut self, diffusion: f32) {
        self.diffusion = diffusion.clamp(0.0, 1.0);
        self.input_diffusion.set_diffusion(self.diffusion);
    }

    /// Get the diffusion amount.
    pub fn diffusion(&self) -> f32 {
        self.diffusion
    }

    /// Set tail HF damping, clamped to 0-1.
    pub fn set_damping(&mut self, damping: f32) {
        self.tank.set_damping(damping);
    }

    /// Get the damping.
    pub fn damping(&self) -> f32 {
        self.tank.damping()
    }

    /// Set stereo width of the wet signal, clamped to 0-2 (0 = mono,
    /// 1 = as rendered, 2 = exaggerated).
    pub fn set_width(&mut self, width: f32) {
        self.width = width.clamp(0.0, 2.0);
    }

    /// Get the stereo width.
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Set tank modulation depth, clamped to 0-1.
    pub fn set_modulation_depth(&mut self, depth: f32) {
        self.tank.set_modulation_depth(depth);
    }

    /// Set tank modulation rate in Hz. The tank caps this at 2Hz.
    pub fn set_modulation_rate(&mut self, rate_hz: f32) {
        self.tank.set_modulation_rate(rate_hz.clamp(0.0, 10.0));
    }

    /// Set early reflection level, clamped to 0-1.
    pub fn set_early_level(&mut self, level: f32) {
        self.early_level = level.clamp(0.0, 1.0);
        self.early.set_level(self.early_level);
    }

    /// Get the early reflection level.
    pub fn early_level(&self) -> f32 {
        self.early_level
    }

    /// Set late tail level, clamped to 0-1.
    pub fn set_late_level(&mut self, level: f32) {
        self.late_level = level.clamp(0.0, 1.0);
    }

    /// Get the late tail level.
    pub fn late_level(&self) -> f32 {
        self.late_level
    }

    /// Set early reflection crossfeed, clamped to 0-1.
    pub fn set_early_crossfeed(&mut self, crossfeed: f32) {
        self.early.set_crossfeed(crossfeed);
    }

    /// Set the wet high-cut frequency in Hz, clamped to 20-20000.
    /// Coefficients update immediately.
    pub fn set_high_cut(&mut self, frequency_hz: f32) {
        self.high_cut_hz = frequency_hz.clamp(20.0, 20000.0);
        self.update_high_cut();
    }

    /// Get the high-cut frequency in Hz.
    pub fn high_cut(&self) -> f32 {
        self.high_cut_hz
    }

    /// Set the wet low-cut frequency in Hz, clamped to 20-20000.
    /// Coefficients update immediately.
    pub fn set_low_cut(&mut self, frequency_hz: f32) {
        self.low_cut_hz = frequency_hz.clamp(20.0, 20000.0);
        self.update_low_cut();
    }

    /// Get the low-cut frequency in Hz.
    pub fn low_cut(&self) -> f32 {
        self.low_cut_hz
    }

    /// Enable or disable the shimmer insert.
    pub fn set_shimmer_enabled(&mut self, enabled: bool) {
        self.shimmer.set_enabled(enabled);
        if !enabled {
            self.shimmer_return = 0.0;
        }
    }

    /// Set shimmer transposition in semitones, clamped to ±24.
    pub fn set_shimmer_pitch(&mut self, semitones: f32) {
        self.shimmer.set_pitch_shift(semitones);
    }

    /// Set shimmer regeneration into the tank, clamped to 0-0.95.
    ///
    /// The tank's own loop gain never exceeds 0.65, so the combined
    /// loop stays below unity even at maximum.
    pub fn set_shimmer_feedback(&mut self, feedback: f32) {
        self.shimmer.set_feedback(feedback);
    }

    /// Set how much shimmer is blended into the late tail, clamped to
    /// 0-1.
    pub fn set_shimmer_mix(&mut self, mix: f32) {
        self.shimmer.set_mix(mix);
    }

    /// Rebuild the early reflection pattern for a room and source
    /// position.
    pub fn configure_room(&mut self, geometry: RoomGeometry) {
        self.early.configure_geometry(geometry);
    }

    /// The geometry the early pattern was built from.
    pub fn room(&self) -> RoomGeometry {
        self.early.geometry()
    }

    fn update_high_cut(&mut self) {
        let (b0, b1, b2, a0, a1, a2) =
            lowpass_coefficients(self.high_cut_hz, FILTER_Q, self.sample_rate);
        for filter in &mut self.high_cut {
            filter.set_coefficients(b0, b1, b2, a0, a1, a2);
        }
    }

    fn update_low_cut(&mut self) {
        let (b0, b1, b2, a0, a1, a2) =
            highpass_coefficients(self.low_cut_hz, FILTER_Q, self.sample_rate);
        for filter in &mut self.low_cut {
            filter.set_coefficients(b0, b1, b2, a0, a1, a2);
        }
    }
}

impl StereoEffect for ReverbEngine {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let (mut in_l, mut in_r) = (left, right);

        if self.pre_delay_ms > 0.0 {
            let delay_samples = self.pre_delay_ms / 1000.0 * self.sample_rate;
            self.pre_delay[0].write(left);
            self.pre_delay[1].write(right);
            in_l = self.pre_delay[0].read(delay_samples);
            in_r = self.pre_delay[1].read(delay_samples);
        }

        let (early_l, early_r) = if self.early_level > 0.0 {
            self.early.process(in_l, in_r)
        } else {
            (0.0, 0.0)
        };

        let (mut diff_l, mut diff_r) = (in_l, in_r);
        if self.diffusion > 0.0 {
            (diff_l, diff_r) = self.input_diffusion.process(in_l, in_r);
        }

        let (mut late_l, mut late_r) = (0.0, 0.0);
        if self.late_level > 0.0 {
            let shimmer_feed = self.shimmer_return * self.shimmer.feedback();
            (late_l, late_r) = self
                .tank
                .process(diff_l + shimmer_feed, diff_r + shimmer_feed);
            late_l *= self.late_level;
            late_r *= self.late_level;
        }

        if self.shimmer.is_enabled() {
            let shifted = self.shimmer.process_sample(mono_sum(late_l, late_r));
            late_l += shifted * self.shimmer.mix();
            late_r += shifted * self.shimmer.mix();
            self.shimmer_return = shifted;
        }

        if self.diffusion > 0.0 {
            (late_l, late_r) = self.output_diffusion.process(late_l, late_r);
        }

        let mut wet_l = early_l + late_l;
        let mut wet_r = early_r + late_r;

        if self.width != 1.0 {
            let mid = 0.5 * (wet_l + wet_r);
            let side = 0.5 * (wet_l - wet_r) * self.width;
            // Keep loudness stable as width grows
            let norm = 1.0
                / libm::sqrtf((self.width * self.width + 1.0) * 0.5).max(1.0);
            wet_l = (mid + side) * norm;
            wet_r = (mid - side) * norm;
        }

        wet_l = self.low_cut[0].process(wet_l);
        wet_r = self.low_cut[1].process(wet_r);
        wet_l = self.high_cut[0].process(wet_l);
        wet_r = self.high_cut[1].process(wet_r);

        (wet_l, wet_r)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.pre_delay = core::array::from_fn(|_| {
            InterpolatedDelay::from_time(sample_rate, PRE_DELAY_SECONDS)
        });
        self.early.set_sample_rate(sample_rate);
        self.input_diffusion.set_sample_rate(sample_rate);
        self.output_diffusion.set_sample_rate(sample_rate);
        self.tank.set_sample_rate(sample_rate);
        self.shimmer.set_sample_rate(sample_rate);
        self.update_low_cut();
        self.update_high_cut();
    }

    fn reset(&mut self) {
        for line in &mut self.pre_delay {
            line.clear();
        }
        self.early.reset();
        self.input_diffusion.reset();
        self.output_diffusion.reset();
        self.tank.reset();
        self.shimmer.reset();
        self.shimmer_return = 0.0;
        for filter in self.low_cut.iter_mut().chain(self.high_cut.iter_mut()) {
            filter.clear();
        }
    }
}
