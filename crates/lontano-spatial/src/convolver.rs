//! Binaural rendering: short FIR convolution plus loudspeaker-style crossfeed.
//!
//! [`BinauralRenderer`] convolves each channel with the matching ear response
//! from the [`HrirDatabase`](crate::hrir::HrirDatabase) and then feeds a
//! delayed, attenuated copy of each ear into the other one. The crossfeed
//! delay lines persist across blocks, so the first few samples of a block see
//! the tail of the previous one instead of silence.
//!
//! Direction changes reload the FIR taps in place, keeping the convolution
//! history. Reloads below half a degree on both axes are skipped.

use lontano_core::InterpolatedDelay;

use crate::hrir::{HRIR_TAPS, HrirDatabase, HrirPair};

/// Direction changes smaller than this (degrees, both axes) skip the reload.
const RELOAD_THRESHOLD_DEG: f32 = 0.5;

/// Level of the delayed opposite-ear feed.
const CROSSFEED_GAIN: f32 = 0.15;

/// Crossfeed path delay in seconds, roughly ear-to-ear around the head.
const CROSSFEED_DELAY_SECONDS: f32 = 0.0003;

/// Fraction of the crossfeed gain re-added without delay to keep the
/// center image stable.
const DIRECT_REBLEND: f32 = 0.3;

/// Time-domain FIR filter over a circular history buffer.
///
/// Tap updates keep the input history, so swapping impulse responses
/// mid-stream does not click.
#[derive(Debug, Clone)]
pub struct Fir {
    taps: Vec<f32>,
    state: Vec<f32>,
    pos: usize,
}

impl Fir {
    /// Create a FIR of `len` taps, initially passing silence.
    pub fn new(len: usize) -> Self {
        assert!(len > 0, "FIR length must be > 0");
        Self {
            taps: vec![0.0; len],
            state: vec![0.0; len],
            pos: 0,
        }
    }

    /// Replace the tap set. `taps` must have the constructed length.
    pub fn set_taps(&mut self, taps: &[f32]) {
        debug_assert_eq!(taps.len(), self.taps.len());
        for (dst, src) in self.taps.iter_mut().zip(taps) {
            *dst = *src;
        }
    }

    /// Filter one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let len = self.state.len();
        self.state[self.pos] = input;

        let mut acc = 0.0;
        let mut idx = self.pos;
        for &tap in &self.taps {
            acc += tap * self.state[idx];
            idx = if idx == 0 { len - 1 } else { idx - 1 };
        }

        self.pos = (self.pos + 1) % len;
        acc
    }

    /// Zero the input history, keeping the taps.
    pub fn reset(&mut self) {
        self.state.fill(0.0);
        self.pos = 0;
    }
}

/// Per-ear HRIR convolution with interaural crossfeed.
#[derive(Debug, Clone)]
pub struct BinauralRenderer {
    database: HrirDatabase,
    left_ear: Fir,
    right_ear: Fir,
    crossfeed_left: InterpolatedDelay,
    crossfeed_right: InterpolatedDelay,
    crossfeed_samples: f32,
    last_azimuth: f32,
    last_elevation: f32,
}

impl BinauralRenderer {
    /// Create a renderer at `sample_rate`, loaded with the frontal response.
    pub fn new(sample_rate: f32) -> Self {
        let database = HrirDatabase::new(sample_rate);
        let mut renderer = Self {
            database,
            left_ear: Fir::new(HRIR_TAPS),
            right_ear: Fir::new(HRIR_TAPS),
            crossfeed_left: InterpolatedDelay::from_time(sample_rate, CROSSFEED_DELAY_SECONDS),
            crossfeed_right: InterpolatedDelay::from_time(sample_rate, CROSSFEED_DELAY_SECONDS),
            crossfeed_samples: (sample_rate * CROSSFEED_DELAY_SECONDS).floor(),
            last_azimuth: 0.0,
            last_elevation: 0.0,
        };
        renderer.load(0.0, 0.0);
        renderer
    }

    /// Rebuild delay lines and reload the current direction for a new rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.database.set_sample_rate(sample_rate);
        self.crossfeed_left = InterpolatedDelay::from_time(sample_rate, CROSSFEED_DELAY_SECONDS);
        self.crossfeed_right = InterpolatedDelay::from_time(sample_rate, CROSSFEED_DELAY_SECONDS);
        self.crossfeed_samples = (sample_rate * CROSSFEED_DELAY_SECONDS).floor();
        self.load(self.last_azimuth, self.last_elevation);
    }

    /// Point the renderer at a direction.
    ///
    /// Sub-threshold moves on both axes are ignored, so a slowly drifting
    /// source does not trigger a reload every block.
    pub fn set_direction(&mut self, azimuth_deg: f32, elevation_deg: f32) {
        if (azimuth_deg - self.last_azimuth).abs() < RELOAD_THRESHOLD_DEG
            && (elevation_deg - self.last_elevation).abs() < RELOAD_THRESHOLD_DEG
        {
            return;
        }
        self.load(azimuth_deg, elevation_deg);
    }

    fn load(&mut self, azimuth_deg: f32, elevation_deg: f32) {
        let HrirPair { left, right } = self.database.query(azimuth_deg, elevation_deg);
        self.left_ear.set_taps(&left);
        self.right_ear.set_taps(&right);
        self.last_azimuth = azimuth_deg;
        self.last_elevation = elevation_deg;
    }

    /// Render one frame.
    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let conv_l = self.left_ear.process(left);
        let conv_r = self.right_ear.process(right);

        self.crossfeed_left.write(conv_l);
        self.crossfeed_right.write(conv_r);
        let delayed_l = self.crossfeed_left.read(self.crossfeed_samples);
        let delayed_r = self.crossfeed_right.read(self.crossfeed_samples);

        // The updates are deliberately sequential: the direct reblend into
        // each ear sees the other ear's already-crossfed sample.
        let mut out_l = conv_l - delayed_r * CROSSFEED_GAIN;
        let mut out_r = conv_r - delayed_l * CROSSFEED_GAIN;
        out_l += out_r * (CROSSFEED_GAIN * DIRECT_REBLEND);
        out_r += out_l * (CROSSFEED_GAIN * DIRECT_REBLEND);
        (out_l, out_r)
    }

    /// Clear convolution history and crossfeed lines, keeping the direction.
    pub fn reset(&mut self) {
        self.left_ear.reset();
        self.right_ear.reset();
        self.crossfeed_left.clear();
        self.crossfeed_right.clear();
    }
}
