//! Stereo diffusion stage.
//!
//! Four modulated allpasses in series per channel. Allpass cascades are
//! spectrally flat, so this builds echo density without coloring the
//! signal. Left and right chains use different delay ladders and
//! slightly detuned modulation rates, which decorrelates the channels.

use lontano_core::{ModulatedAllpass, StereoEffect};

const REFERENCE_RATE: f32 = 44100.0;

/// Per-stage base delays in samples at the reference rate.
const LEFT_BASE_44K: [f32; 4] = [50.0, 75.0, 100.0, 125.0];
const RIGHT_BASE_44K: [f32; 4] = [62.0, 87.0, 112.0, 137.0];

/// Per-stage delay-line capacities in samples at the reference rate.
const LEFT_MAX_44K: [f32; 4] = [100.0, 150.0, 200.0, 250.0];
const RIGHT_MAX_44K: [f32; 4] = [125.0, 175.0, 225.0, 275.0];

fn reference_ms(samples_44k: f32) -> f32 {
    samples_44k / REFERENCE_RATE * 1000.0
}

/// Cascaded allpass diffuser, one chain per channel.
#[derive(Debug, Clone)]
pub struct DiffusionSection {
    left: [ModulatedAllpass; 4],
    right: [ModulatedAllpass; 4],
    diffusion: f32,
}

impl DiffusionSection {
    /// Create a diffuser at the given sample rate with diffusion 1.0.
    pub fn new(sample_rate: f32) -> Self {
        let build = |max_44k: &[f32; 4], base_44k: &[f32; 4]| {
            core::array::from_fn(|i| {
                let mut ap = ModulatedAllpass::new(
                    sample_rate,
                    reference_ms(max_44k[i]),
                    reference_ms(base_44k[i]),
                );
                ap.set_feedback(0.5);
                ap
            })
        };
        Self {
            left: build(&LEFT_MAX_44K, &LEFT_BASE_44K),
            right: build(&RIGHT_MAX_44K, &RIGHT_BASE_44K),
            diffusion: 1.0,
        }
    }

    /// Set diffusion amount, clamped to 0-1.
    ///
    /// Maps to allpass feedback 0-0.5. At 0 the chains degenerate to
    /// plain delays.
    pub fn set_diffusion(&mut self, diffusion: f32) {
        self.diffusion = diffusion.clamp(0.0, 1.0);
        let feedback = self.diffusion * 0.5;
        for ap in self.left.iter_mut().chain(self.right.iter_mut()) {
            ap.set_feedback(feedback);
        }
    }

    /// Get the current diffusion amount.
    pub fn diffusion(&self) -> f32 {
        self.diffusion
    }

    /// Set the base modulation rate in Hz, clamped to 0-2.
    ///
    /// Stage `i` runs at `rate * (i + 1)`; the right chain is detuned
    /// by a further 1.1x.
    pub fn set_modulation_rate(&mut self, rate_hz: f32) {
        let rate = rate_hz.clamp(0.0, 2.0);
        for (i, ap) in self.left.iter_mut().enumerate() {
            ap.set_modulation_rate(rate * (i + 1) as f32);
        }
        for (i, ap) in self.right.iter_mut().enumerate() {
            ap.set_modulation_rate(rate * (i + 1) as f32 * 1.1);
        }
    }

    /// Set modulation depth for every stage, clamped to 0-1.
    pub fn set_modulation_depth(&mut self, depth: f32) {
        for ap in self.left.iter_mut().chain(self.right.iter_mut()) {
            ap.set_modulation_depth(depth);
        }
    }
}

impl StereoEffect for DiffusionSection {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let mut l = left;
        let mut r = right;
        for i in 0..4 {
            l = self.left[i].process(l);
            r = self.right[i].process(r);
        }
        (l, r)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        for ap in self.left.iter_mut().chain(self.right.iter_mut()) {
            ap.set_sample_rate(sample_rate);
        }
    }

    fn reset(&mut self) {
        for ap in self.left.iter_mut().chain(self.right.iter_mut()) {
            ap.reset();
        }
    }
}
