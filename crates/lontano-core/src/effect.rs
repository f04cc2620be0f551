//! Stereo effect trait.
//!
//! Spatial processing is inherently two-channel: per-ear gains, delays and
//! filters differ by design, so the unit of processing is a left/right pair.
//! [`StereoEffect`] is the common surface for every engine in the workspace
//! (diffusion, reverb, the full spatializer).
//!
//! # Example
//!
//! ```rust
//! use lontano_core::StereoEffect;
//!
//! /// Swaps the channels.
//! struct Swap;
//!
//! impl StereoEffect for Swap {
//!     fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
//!         (right, left)
//!     }
//!     fn set_sample_rate(&mut self, _sample_rate: f32) {}
//!     fn reset(&mut self) {}
//! }
//!
//! let mut fx = Swap;
//! assert_eq!(fx.process(1.0, -1.0), (-1.0, 1.0));
//! ```

/// A stereo in, stereo out audio processor.
///
/// Implementations must be allocation-free in [`process`](Self::process)
/// and [`process_block`](Self::process_block); allocation belongs in
/// construction and [`set_sample_rate`](Self::set_sample_rate).
pub trait StereoEffect {
    /// Process a single left/right sample pair.
    fn process(&mut self, left: f32, right: f32) -> (f32, f32);

    /// Process a block of samples in place.
    ///
    /// The default implementation calls [`process`](Self::process) per
    /// sample. Override when a block-level implementation can hoist work
    /// out of the loop.
    ///
    /// Both slices must be the same length; the shorter length is used if
    /// they differ.
    fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(left.len(), right.len());
        let n = left.len().min(right.len());
        for i in 0..n {
            let (l, r) = self.process(left[i], right[i]);
            left[i] = l;
            right[i] = r;
        }
    }

    /// Update the sample rate.
    ///
    /// Called outside the audio path; implementations may reallocate.
    fn set_sample_rate(&mut self, sample_rate: f32);

    /// Reset all internal state (delay lines, filters, oscillators) without
    /// changing parameters.
    fn reset(&mut self);

    /// Processing latency in samples introduced by this effect.
    ///
    /// Zero for most effects.
    fn latency_samples(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Attenuate {
        gain: f32,
    }

    impl StereoEffect for Attenuate {
        fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
            (left * self.gain, right * self.gain)
        }
        fn set_sample_rate(&mut self, _sample_rate: f32) {}
        fn reset(&mut self) {}
    }

    #[test]
    fn block_default_matches_per_sample() {
        let mut a = Attenuate { gain: 0.5 };
        let mut b = Attenuate { gain: 0.5 };

        let mut left = [1.0f32, 0.5, -0.25, 0.0];
        let mut right = [0.0f32, -1.0, 0.75, 0.1];
        let mut left2 = left;
        let mut right2 = right;

        a.process_block(&mut left, &mut right);
        for i in 0..left2.len() {
            let (l, r) = b.process(left2[i], right2[i]);
            left2[i] = l;
            right2[i] = r;
        }

        assert_eq!(left, left2);
        assert_eq!(right, right2);
    }

    #[test]
    fn default_latency_is_zero() {
        let a = Attenuate { gain: 1.0 };
        assert_eq!(a.latency_samples(), 0);
    }
}
