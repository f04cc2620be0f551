//! Delay line implementation for time-based processing.
//!
//! Provides a circular buffer-based delay line with interpolation support.
//! Delay lines carry most of the spatial engine: propagation delay, per-ear
//! ITD micro-delays, early reflection taps, diffusion allpasses, and the
//! late reverb network all read from one.
//!
//! # Use Cases
//!
//! | Stage | Delay Range | Modulation |
//! |-------|-------------|------------|
//! | ITD ear delay | 0-2ms | No (ramped) |
//! | Diffusion allpass | 50-300ms | Yes (sinusoidal) |
//! | Propagation delay | 3-300ms | No (ramped) |
//! | Reverb pre-delay | 0-500ms | No |
//! | Early reflection taps | 1-1000ms | No |
//! | Late reverb lines | 30-360ms | Yes (sinusoidal) |
//!
//! # Interpolation
//!
//! For modulated or ramped delay times, use [`InterpolatedDelay::read`] with
//! fractional delays to avoid zipper noise and aliasing.

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std as alloc;

use alloc::vec;
use alloc::vec::Vec;

/// Interpolation method for fractional delay
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    /// No interpolation (truncate to nearest sample)
    None,
    /// Linear interpolation between two samples
    #[default]
    Linear,
    /// Cubic interpolation (4-point, smoother)
    Cubic,
}

/// Interpolated delay line using a circular buffer (heap-allocated).
///
/// Supports fractional delay times through interpolation, allowing smooth
/// modulation of delay time without artifacts.
///
/// # Memory
///
/// The buffer is heap-allocated during construction but never reallocates.
/// No allocations occur during audio processing.
///
/// # Example
///
/// ```rust
/// use lontano_core::InterpolatedDelay;
///
/// // 2ms max ear delay at 44.1kHz
/// let max_delay_samples = (0.002 * 44100.0) as usize + 1;
/// let mut delay = InterpolatedDelay::new(max_delay_samples);
///
/// // Read with 10.5 sample delay (fractional)
/// let output = delay.read(10.5);
/// delay.write(1.0);
/// ```
#[derive(Debug, Clone)]
pub struct InterpolatedDelay {
    /// Circular buffer storage
    buffer: Vec<f32>,
    /// Write position in buffer
    write_pos: usize,
    /// Interpolation method for fractional delay reads
    interpolation: Interpolation,
}

impl InterpolatedDelay {
    /// Creates a new delay line with the given maximum delay in samples.
    ///
    /// # Arguments
    ///
    /// * `max_delay_samples` - Maximum delay capacity in samples
    ///
    /// # Panics
    ///
    /// Panics if `max_delay_samples` is 0.
    pub fn new(max_delay_samples: usize) -> Self {
        assert!(max_delay_samples > 0, "Delay size must be > 0");

        Self {
            buffer: vec![0.0; max_delay_samples],
            write_pos: 0,
            interpolation: Interpolation::Linear,
        }
    }

    /// Creates a delay line from sample rate and max delay time in seconds.
    pub fn from_time(sample_rate: f32, max_seconds: f32) -> Self {
        let max_samples = (sample_rate * max_seconds) as usize + 1;
        Self::new(max_samples)
    }

    /// Sets the interpolation method for fractional delay reads.
    ///
    /// - [`Interpolation::None`]: Truncate to nearest sample (lowest CPU)
    /// - [`Interpolation::Linear`]: Interpolate between 2 samples (default)
    /// - [`Interpolation::Cubic`]: 4-point cubic interpolation (best quality,
    ///   for heavily modulated reads)
    pub fn set_interpolation(&mut self, interp: Interpolation) {
        self.interpolation = interp;
    }

    /// Reads a delayed sample with the configured interpolation method.
    ///
    /// # Arguments
    ///
    /// * `delay_samples` - Delay time in samples (can be fractional)
    ///
    /// Delays beyond the capacity are clamped to the longest representable
    /// delay rather than wrapping into fresher samples.
    #[inline]
    pub fn read(&self, delay_samples: f32) -> f32 {
        debug_assert!(delay_samples >= 0.0);

        let len = self.buffer.len();
        let delay_clamped = delay_samples.min((len - 1) as f32);

        let delay_int = delay_clamped as usize;
        let frac = delay_clamped - delay_int as f32;

        // read_pos = (write_pos + len - delay_int - 1) % len
        // This points to the sample `delay_int` samples before the last written.
        let read_pos = (self.write_pos + len - delay_int - 1) % len;

        match self.interpolation {
            Interpolation::None => self.buffer[read_pos],

            Interpolation::Linear => {
                let next_pos = (read_pos + len - 1) % len;
                let a = self.buffer[read_pos];
                let b = self.buffer[next_pos];
                a + (b - a) * frac
            }

            Interpolation::Cubic => {
                // 4-point cubic Lagrange interpolation
                let p0 = (read_pos + 1) % len;
                let p1 = read_pos;
                let p2 = (read_pos + len - 1) % len;
                let p3 = (read_pos + len - 2) % len;

                let y0 = self.buffer[p0];
                let y1 = self.buffer[p1];
                let y2 = self.buffer[p2];
                let y3 = self.buffer[p3];

                let t = frac;
                let t2 = t * t;
                let t3 = t2 * t;

                let a0 = y3 - y2 - y0 + y1;
                let a1 = y0 - y1 - a0;
                let a2 = y2 - y0;

                a0 * t3 + a1 * t2 + a2 * t + y1
            }
        }
    }

    /// Writes a sample to the delay line and advances the write position.
    ///
    /// # Arguments
    ///
    /// * `sample` - The sample to write
    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    /// Combined read and write operation.
    #[inline]
    pub fn read_write(&mut self, sample: f32, delay_samples: f32) -> f32 {
        let output = self.read(delay_samples);
        self.write(sample);
        output
    }

    /// Clears the delay line (sets all samples to 0).
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    /// Returns the maximum delay capacity in samples.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}
